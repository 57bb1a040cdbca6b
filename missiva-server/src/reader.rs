//! Conversation Reader: storico ordinato tra due partecipanti.

use missiva_core::{ChatError, Message};
use std::sync::Arc;

use crate::store::{Cursor, MessageStore};

/// Dimensione massima di una finestra di storico.
pub const MAX_PAGE: u32 = 200;

/// Finestra di storico: i `limit` messaggi precedenti a `before` (o i più recenti).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub before: Option<Cursor>,
    pub limit: u32,
}

#[derive(Clone)]
pub struct ConversationReader {
    store: Arc<dyn MessageStore>,
}

impl ConversationReader {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Storico completo tra `current_user_id` e `other_user_id`.
    ///
    /// Simmetrico: `load(a, b)` e `load(b, a)` restituiscono la stessa sequenza.
    pub async fn load(
        &self,
        current_user_id: &str,
        other_user_id: &str,
    ) -> Result<Vec<Message>, ChatError> {
        if current_user_id.is_empty() {
            return Err(ChatError::Unauthorized);
        }
        self.store.list_between(current_user_id, other_user_id).await
    }

    /// Come [`load`](Self::load) ma limitato a una finestra, sempre in ordine crescente.
    pub async fn load_window(
        &self,
        current_user_id: &str,
        other_user_id: &str,
        window: Window,
    ) -> Result<Vec<Message>, ChatError> {
        if current_user_id.is_empty() {
            return Err(ChatError::Unauthorized);
        }
        let limit = window.limit.clamp(1, MAX_PAGE);
        self.store
            .list_between_window(current_user_id, other_user_id, window.before.as_ref(), limit)
            .await
    }
}
