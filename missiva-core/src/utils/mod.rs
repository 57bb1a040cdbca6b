pub mod ids;
pub mod media;
pub mod time;

pub use self::ids::{new_client_msg_id, new_message_id, new_token};
pub use self::time::{format_timestamp, now_timestamp, now_utc, parse_timestamp};
