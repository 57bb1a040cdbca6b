/* Come viaggiano i dati sul web socket.
    WsMessage è l'envelope { type, payload }:
    Authenticate -> primo frame del client se il token non è nella query
    AuthOk -> il server conferma l'identità
    NewMessage -> evento di consegna sul canale del destinatario
    Error -> errori fuori banda
*/
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    models::{DeliveryEvent, User},
};

/// Nome dell'evento di consegna sul wire.
pub const NEW_MESSAGE_EVENT: &str = "new-message";

/// Nome del canale logico di un destinatario: `user-<recipientId>`.
pub fn channel_name(recipient_id: &str) -> String {
    format!("user-{recipient_id}")
}

/// Messaggio WS con envelope { type, payload }.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Client → Server: autenticazione del socket.
    #[serde(rename = "authenticate")]
    Authenticate(Authenticate),
    /// Server → Client: socket autenticato, da qui in poi arrivano eventi.
    #[serde(rename = "authOk")]
    AuthOk(User),
    /// Server → Client: nuovo messaggio per il proprietario del canale.
    #[serde(rename = "new-message")]
    NewMessage(DeliveryEvent),
    /// Server → Client: errore fuori banda.
    #[serde(rename = "error")]
    Error(Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticate {
    pub token: String,
}
