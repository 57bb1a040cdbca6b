//! missiva-core: tipi condivisi tra client e server (modelli, DTO HTTP, messaggi WS, errori).
//! Niente I/O.

pub mod models;
pub mod protocol;
pub mod error;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::{ChatError, Error};
pub use models::{message::DeliveryEvent, message::Message, user::User};
pub use protocol::ws::{channel_name, Authenticate, WsMessage, NEW_MESSAGE_EVENT};
pub use protocol::http::{
    ApiReply, HistoryQuery, ListMessagesResponse, ListUsersResponse, SendMessageRequest,
    SendMessageResponse, UserResponse,
};
pub use utils::{new_client_msg_id, new_message_id, now_timestamp, now_utc};
