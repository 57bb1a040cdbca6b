//! Delivery Channel Router: fan-out best-effort indirizzato per identità del destinatario.
//!
//! Un canale logico per utente (`user-<id>`), non per conversazione. Gli eventi
//! pubblicati quando nessuno è in ascolto vanno persi: il destinatario vedrà il
//! messaggio al prossimo caricamento dello storico.

use async_trait::async_trait;
use dashmap::DashMap;
use missiva_core::{channel_name, ChatError, DeliveryEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// Identifica una singola sottoscrizione, da restituire a `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub recipient_id: String,
    pub id: u64,
}

/// Feed live degli eventi per un'identità.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    events: UnboundedReceiver<DeliveryEvent>,
}

impl Subscription {
    pub fn new(handle: SubscriptionHandle, events: UnboundedReceiver<DeliveryEvent>) -> Self {
        Self { handle, events }
    }

    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Attende il prossimo evento; `None` quando la sottoscrizione è stata chiusa.
    pub async fn recv(&mut self) -> Option<DeliveryEvent> {
        self.events.recv().await
    }

    /// Evento già in coda, senza attendere.
    pub fn try_recv(&mut self) -> Option<DeliveryEvent> {
        self.events.try_recv().ok()
    }

    pub fn into_parts(self) -> (SubscriptionHandle, UnboundedReceiver<DeliveryEvent>) {
        (self.handle, self.events)
    }
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Fire-and-forget: nessuna conferma di consegna, nessun retry.
    async fn publish(&self, recipient_id: &str, event: DeliveryEvent) -> Result<(), ChatError>;

    async fn subscribe(&self, recipient_id: &str) -> Result<Subscription, ChatError>;

    async fn unsubscribe(&self, handle: &SubscriptionHandle);
}

/// Router in-process: user_id -> sender delle sessioni collegate.
#[derive(Default)]
pub struct ChannelRouter {
    subscribers: DashMap<String, Vec<(u64, UnboundedSender<DeliveryEvent>)>>,
    next_id: AtomicU64,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numero di sottoscrizioni vive per un destinatario.
    pub fn subscriber_count(&self, recipient_id: &str) -> usize {
        self.subscribers
            .get(recipient_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DeliveryChannel for ChannelRouter {
    async fn publish(&self, recipient_id: &str, event: DeliveryEvent) -> Result<(), ChatError> {
        let delivered = match self.subscribers.get_mut(recipient_id) {
            Some(mut subs) => {
                // un receiver droppato equivale a un unsubscribe
                subs.retain(|(_, tx)| tx.send(event.clone()).is_ok());
                subs.len()
            }
            None => 0,
        };
        if delivered == 0 {
            self.subscribers.remove_if(recipient_id, |_, subs| subs.is_empty());
            debug!(
                channel = %channel_name(recipient_id),
                message_id = %event.message.id,
                "no live subscriber, event dropped"
            );
        } else {
            debug!(
                channel = %channel_name(recipient_id),
                message_id = %event.message.id,
                delivered,
                "event published"
            );
        }
        Ok(())
    }

    async fn subscribe(&self, recipient_id: &str) -> Result<Subscription, ChatError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(recipient_id.to_string())
            .or_default()
            .push((id, tx));
        info!(channel = %channel_name(recipient_id), id, "subscribed");
        Ok(Subscription::new(
            SubscriptionHandle {
                recipient_id: recipient_id.to_string(),
                id,
            },
            rx,
        ))
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if let Some(mut subs) = self.subscribers.get_mut(&handle.recipient_id) {
            subs.retain(|(id, _)| *id != handle.id);
        }
        self.subscribers
            .remove_if(&handle.recipient_id, |_, subs| subs.is_empty());
        info!(channel = %channel_name(&handle.recipient_id), id = handle.id, "unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missiva_core::Message;

    fn event(id: &str, receiver: &str) -> DeliveryEvent {
        DeliveryEvent::from(Message {
            id: id.to_string(),
            sender_id: "alice".to_string(),
            receiver_id: receiver.to_string(),
            content: "hi".to_string(),
            attachment: None,
            created_at: missiva_core::now_utc(),
        })
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let router = ChannelRouter::new();
        router.publish("bob", event("m1", "bob")).await.unwrap();

        // sottoscrivendo dopo non arriva nulla: niente coda
        let mut sub = router.subscribe("bob").await.unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn every_subscription_of_the_recipient_receives() {
        let router = ChannelRouter::new();
        let mut a = router.subscribe("bob").await.unwrap();
        let mut b = router.subscribe("bob").await.unwrap();
        let mut other = router.subscribe("carol").await.unwrap();

        router.publish("bob", event("m1", "bob")).await.unwrap();

        assert_eq!(a.recv().await.unwrap().message.id, "m1");
        assert_eq!(b.recv().await.unwrap().message.id, "m1");
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let router = ChannelRouter::new();
        let sub = router.subscribe("bob").await.unwrap();
        let handle = sub.handle().clone();
        let (_, mut rx) = sub.into_parts();

        router.unsubscribe(&handle).await;
        assert_eq!(router.subscriber_count("bob"), 0);

        router.publish("bob", event("m1", "bob")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let router = ChannelRouter::new();
        drop(router.subscribe("bob").await.unwrap());
        assert_eq!(router.subscriber_count("bob"), 1);

        router.publish("bob", event("m1", "bob")).await.unwrap();
        assert_eq!(router.subscriber_count("bob"), 0);
    }
}
