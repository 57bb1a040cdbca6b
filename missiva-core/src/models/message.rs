use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Messaggio diretto persistito dal server e notificato via WS.
///
/// Una volta creato non viene mai modificato.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// UUIDv7: ordinabile per istante di creazione.
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Vero se il messaggio appartiene alla conversazione tra `a` e `b`.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// Vero se `user_id` è mittente o destinatario.
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// Chiave d'ordinamento totale: `createdAt`, poi `id`.
    pub fn order_key(&self) -> (OffsetDateTime, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// Evento effimero pubblicato sul canale del destinatario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
    pub message: Message,
}

impl From<Message> for DeliveryEvent {
    fn from(message: Message) -> Self {
        Self { message }
    }
}
