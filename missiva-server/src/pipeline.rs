//! Send Pipeline: valida, persiste, poi prova la consegna live.

use missiva_core::{channel_name, ChatError, DeliveryEvent, Message};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{router::DeliveryChannel, store::MessageStore};

#[derive(Clone)]
pub struct SendPipeline {
    store: Arc<dyn MessageStore>,
    channels: Arc<dyn DeliveryChannel>,
}

impl SendPipeline {
    pub fn new(store: Arc<dyn MessageStore>, channels: Arc<dyn DeliveryChannel>) -> Self {
        Self { store, channels }
    }

    /// Invia un messaggio da `current_user_id` a `receiver_id`.
    ///
    /// La scrittura durevole è l'unico esito che conta: un errore di publish
    /// viene loggato e ignorato, il messaggio resta salvato e l'invio riesce.
    pub async fn send(
        &self,
        current_user_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError> {
        if current_user_id.is_empty() {
            return Err(ChatError::Unauthorized);
        }
        let attachment = attachment.filter(|url| !url.is_empty());
        if content.is_empty() && attachment.is_none() {
            return Err(ChatError::validation("empty content"));
        }
        if receiver_id.is_empty() {
            return Err(ChatError::validation("missing receiver"));
        }

        let message = self
            .store
            .create(current_user_id, receiver_id, content, attachment)
            .await?;
        info!(
            message_id = %message.id,
            sender = %message.sender_id,
            receiver = %message.receiver_id,
            "message stored"
        );

        if let Err(e) = self
            .channels
            .publish(receiver_id, DeliveryEvent::from(message.clone()))
            .await
        {
            warn!(
                channel = %channel_name(receiver_id),
                message_id = %message.id,
                error = %e,
                "push delivery failed, message kept"
            );
        }

        Ok(message)
    }
}
