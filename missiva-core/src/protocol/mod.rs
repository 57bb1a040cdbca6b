pub mod ws;
pub mod http;

// Re-export comodi
pub use ws::{channel_name, Authenticate, WsMessage, NEW_MESSAGE_EVENT};
pub use http::{
    ApiReply, HistoryQuery, ListMessagesResponse, ListUsersResponse, SendMessageRequest,
    SendMessageResponse, UserResponse,
};
