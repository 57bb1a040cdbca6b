#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use missiva_client::{ChatBackend, PushFeed};
use missiva_core::{ChatError, DeliveryEvent, Message, User};
use missiva_server::{
    connect_pool, run_migrations, sqlite_url_for_path, AppState, ChannelRouter, DeliveryChannel,
    Subscription, SubscriptionHandle,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Database su file temporaneo con migrazioni applicate. Il `TempDir` va tenuto vivo.
pub async fn setup_state_with(channels: Arc<dyn DeliveryChannel>) -> Result<(TempDir, AppState)> {
    let td = TempDir::new()?;
    let url = sqlite_url_for_path(&td.path().join("missiva.db"))?;
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;
    Ok((td, AppState::with_channels(pool, channels)))
}

pub async fn setup_state() -> Result<(TempDir, AppState)> {
    setup_state_with(Arc::new(ChannelRouter::new())).await
}

/// Crea un utente e restituisce (utente, token).
pub async fn add_user(state: &AppState, username: &str) -> Result<(User, String)> {
    state.users.create_user(username, username, None).await
}

/// Trasporto che fallisce ogni publish ma accetta le sottoscrizioni.
#[derive(Default)]
pub struct BrokenTransport {
    inner: ChannelRouter,
}

#[async_trait]
impl DeliveryChannel for BrokenTransport {
    async fn publish(&self, _recipient_id: &str, _event: DeliveryEvent) -> Result<(), ChatError> {
        Err(ChatError::transport("push service unreachable"))
    }

    async fn subscribe(&self, recipient_id: &str) -> Result<Subscription, ChatError> {
        self.inner.subscribe(recipient_id).await
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.inner.unsubscribe(handle).await
    }
}

/// Backend client in-process: chiama direttamente reader, pipeline e router del server.
pub struct LocalBackend {
    state: AppState,
    handles: Mutex<HashMap<u64, SubscriptionHandle>>,
}

impl LocalBackend {
    pub fn new(state: AppState) -> Arc<Self> {
        Arc::new(Self {
            state,
            handles: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    async fn load(&self, current_user_id: &str, peer_id: &str) -> Result<Vec<Message>, ChatError> {
        self.state.reader.load(current_user_id, peer_id).await
    }

    async fn send(
        &self,
        current_user_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError> {
        self.state
            .pipeline
            .send(current_user_id, receiver_id, content, attachment)
            .await
    }

    async fn subscribe(&self, user_id: &str) -> Result<PushFeed, ChatError> {
        let (handle, events) = self.state.channels.subscribe(user_id).await?.into_parts();
        let id = handle.id;
        self.handles.lock().unwrap().insert(id, handle);
        Ok(PushFeed::new(id, events))
    }

    async fn unsubscribe(&self, feed: PushFeed) {
        let handle = self.handles.lock().unwrap().remove(&feed.id());
        if let Some(handle) = handle {
            self.state.channels.unsubscribe(&handle).await;
        }
    }
}
