use serde::{Deserialize, Serialize};

/// Errore condiviso per HTTP e WS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    /// Codice messaggio
    pub code: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }
}

/// Codici usati nel campo `code`.
pub mod codes {
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const VALIDATION: &str = "validation_error";
    pub const TRANSPORT: &str = "transport_error";
    pub const STORE: &str = "store_error";
    pub const NOT_FOUND: &str = "not_found";
    pub const AUTH_REQUIRED: &str = "auth_required";
}

/// Tassonomia degli errori della messaggistica.
///
/// `Unauthorized` e `Validation` tornano al chiamante e non vanno ritentati
/// automaticamente; `Transport` nasce solo dal fan-out e il pipeline di invio
/// lo logga senza propagarlo; `Store` interrompe la singola richiesta.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("push delivery failed: {0}")]
    Transport(String),

    #[error("message store failure: {0}")]
    Store(String),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => codes::UNAUTHORIZED,
            Self::Validation(_) => codes::VALIDATION,
            Self::Transport(_) => codes::TRANSPORT,
            Self::Store(_) => codes::STORE,
        }
    }
}

impl From<&ChatError> for Error {
    fn from(err: &ChatError) -> Self {
        Error::new(err.code(), err.to_string())
    }
}

impl From<ChatError> for Error {
    fn from(err: ChatError) -> Self {
        Error::from(&err)
    }
}

/// Ricostruisce l'errore di dominio da quello sul wire (lato client).
impl From<Error> for ChatError {
    fn from(err: Error) -> Self {
        match err.code.as_str() {
            codes::UNAUTHORIZED | codes::AUTH_REQUIRED => Self::Unauthorized,
            codes::VALIDATION => Self::Validation(err.message),
            codes::TRANSPORT => Self::Transport(err.message),
            _ => Self::Store(err.message),
        }
    }
}
