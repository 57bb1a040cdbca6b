use uuid::Uuid;

/// Genera un nuovo clientMsgId unico (UUIDv4) come stringa.
pub fn new_client_msg_id() -> String {
    Uuid::new_v4().to_string()
}

/// Id di un messaggio persistito: UUIDv7, quindi ordinabile per istante di creazione
/// anche come stringa.
pub fn new_message_id() -> String {
    Uuid::now_v7().to_string()
}

/// Token opaco per le sessioni utente.
pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}
