use async_trait::async_trait;
use missiva_core::{ChatError, DeliveryEvent, Message};
use tokio::sync::mpsc::UnboundedReceiver;

/// Feed live degli eventi per l'utente della sessione.
#[derive(Debug)]
pub struct PushFeed {
    id: u64,
    events: UnboundedReceiver<DeliveryEvent>,
}

impl PushFeed {
    pub fn new(id: u64, events: UnboundedReceiver<DeliveryEvent>) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<DeliveryEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<DeliveryEvent> {
        self.events.try_recv().ok()
    }
}

/// Quello che la sessione client usa del server: storico, invio, canale live.
///
/// L'identità del chiamante è sempre esplicita.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn load(&self, current_user_id: &str, peer_id: &str) -> Result<Vec<Message>, ChatError>;

    async fn send(
        &self,
        current_user_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError>;

    /// Apre il feed del canale `user-<user_id>`.
    async fn subscribe(&self, user_id: &str) -> Result<PushFeed, ChatError>;

    async fn unsubscribe(&self, feed: PushFeed);
}
