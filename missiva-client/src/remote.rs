//! Backend remoto: HTTP per storico e invio, WebSocket per il canale live.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use missiva_core::{
    ApiReply, ChatError, ListMessagesResponse, Message, SendMessageRequest, SendMessageResponse,
    WsMessage,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsFrame};
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, PushFeed};

pub struct RemoteBackend {
    http: reqwest::Client,
    base_url: String,
    token: String,
    next_feed: AtomicU64,
    readers: DashMap<u64, JoinHandle<()>>,
}

impl RemoteBackend {
    /// `base_url` senza slash finale, es. "http://127.0.0.1:3000".
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            next_feed: AtomicU64::new(0),
            readers: DashMap::new(),
        }
    }

    /// Numero di feed live aperti da questo backend.
    pub fn live_feeds(&self) -> usize {
        self.readers.len()
    }

    fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{base}/ws?token={}", self.token)
    }

    async fn read_reply<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ChatError> {
        // anche le risposte 4xx/5xx portano l'envelope { success, error }
        let reply: ApiReply<T> = resp
            .json()
            .await
            .map_err(|e| ChatError::transport(format!("invalid reply: {}", e)))?;
        reply.into_result().map_err(ChatError::from)
    }
}

#[async_trait]
impl ChatBackend for RemoteBackend {
    async fn load(&self, _current_user_id: &str, peer_id: &str) -> Result<Vec<Message>, ChatError> {
        let resp = self
            .http
            .get(format!("{}/api/messages/{}", self.base_url, peer_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("request failed: {}", e)))?;
        let body: ListMessagesResponse = Self::read_reply(resp).await?;
        Ok(body.messages)
    }

    async fn send(
        &self,
        _current_user_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError> {
        let req = SendMessageRequest {
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            attachment: attachment.map(str::to_string),
        };
        let resp = self
            .http
            .post(format!("{}/api/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("request failed: {}", e)))?;
        let body: SendMessageResponse = Self::read_reply(resp).await?;
        Ok(body.message)
    }

    async fn subscribe(&self, user_id: &str) -> Result<PushFeed, ChatError> {
        let (mut stream, _) = connect_async(self.ws_url())
            .await
            .map_err(|e| ChatError::transport(format!("ws connect failed: {}", e)))?;

        // il primo frame dice se il token è stato accettato
        match stream.next().await {
            Some(Ok(WsFrame::Text(txt))) => match serde_json::from_str::<WsMessage>(txt.as_str()) {
                Ok(WsMessage::AuthOk(user)) if user.user_id == user_id => {}
                Ok(WsMessage::AuthOk(user)) => {
                    warn!(expected = %user_id, got = %user.user_id, "token belongs to another user");
                    return Err(ChatError::Unauthorized);
                }
                Ok(WsMessage::Error(err)) => return Err(ChatError::from(err)),
                _ => return Err(ChatError::transport("unexpected first ws frame")),
            },
            _ => return Err(ChatError::transport("ws closed before authentication")),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_feed.fetch_add(1, Ordering::Relaxed);
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let txt = match frame {
                    Ok(WsFrame::Text(txt)) => txt,
                    Ok(WsFrame::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match serde_json::from_str::<WsMessage>(txt.as_str()) {
                    Ok(WsMessage::NewMessage(event)) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Error(err)) => warn!(code = %err.code, "ws error: {}", err.message),
                    Ok(other) => debug!(?other, "ignored ws frame"),
                    Err(e) => warn!(error = %e, "malformed ws frame"),
                }
            }
        });
        self.readers.insert(id, reader);
        info!(user = %user_id, "live feed connected");
        Ok(PushFeed::new(id, rx))
    }

    async fn unsubscribe(&self, feed: PushFeed) {
        if let Some((_, reader)) = self.readers.remove(&feed.id()) {
            reader.abort();
        }
    }
}
