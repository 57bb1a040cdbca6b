//! ClientViewState: la vista ordinata e deduplicata di una conversazione aperta.

use missiva_core::Message;
use time::OffsetDateTime;

/// Da dove arriva una voce della vista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Storico caricato, o copia restituita dall'invio.
    Persisted,
    /// Segnaposto locale, senza id del server.
    Optimistic,
    /// Evento ricevuto sul canale live.
    Pushed,
}

/// Voce della vista: stessa forma per storico, eco ottimistica ed eventi push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEntry {
    pub origin: Origin,
    /// Id del server; `None` solo per le voci ottimistiche.
    pub id: Option<String>,
    /// Id locale dell'invio; presente solo per le voci ottimistiche.
    pub client_msg_id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub attachment: Option<String>,
    pub created_at: OffsetDateTime,
}

impl ViewEntry {
    pub fn persisted(message: Message) -> Self {
        Self::from_message(Origin::Persisted, message)
    }

    pub fn pushed(message: Message) -> Self {
        Self::from_message(Origin::Pushed, message)
    }

    pub fn optimistic(
        client_msg_id: String,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            origin: Origin::Optimistic,
            id: None,
            client_msg_id: Some(client_msg_id),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            attachment: attachment.map(str::to_string),
            created_at,
        }
    }

    fn from_message(origin: Origin, m: Message) -> Self {
        Self {
            origin,
            id: Some(m.id),
            client_msg_id: None,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            content: m.content,
            attachment: m.attachment,
            created_at: m.created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.origin == Origin::Optimistic
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientViewState {
    entries: Vec<ViewEntry>,
}

impl ClientViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id.as_deref() == Some(id))
    }

    /// Sostituisce il contenuto con lo storico caricato.
    pub fn seed(&mut self, history: Vec<Message>) {
        self.entries.clear();
        for message in history {
            self.insert(ViewEntry::persisted(message));
        }
    }

    /// Inserisce in ordine di `created_at`; a parità di timestamp vale l'ordine
    /// di arrivo. Una voce con id già presente viene scartata.
    pub fn insert(&mut self, entry: ViewEntry) -> bool {
        if let Some(id) = entry.id.as_deref() {
            if self.contains_id(id) {
                return false;
            }
        }
        let at = self
            .entries
            .partition_point(|e| e.created_at <= entry.created_at);
        self.entries.insert(at, entry);
        true
    }

    /// Sostituisce il segnaposto `client_msg_id` con la copia confermata dal server.
    ///
    /// Se quell'id è già nella vista (per esempio arrivato via push) il
    /// segnaposto sparisce e resta la voce esistente. Restituisce `true` se la
    /// copia confermata è stata inserita.
    pub fn confirm(&mut self, client_msg_id: &str, message: Message) -> bool {
        self.discard(client_msg_id);
        self.insert(ViewEntry::persisted(message))
    }

    /// Rimuove il segnaposto di un invio fallito.
    pub fn discard(&mut self, client_msg_id: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.client_msg_id.as_deref() != Some(client_msg_id));
        self.entries.len() != before
    }
}
