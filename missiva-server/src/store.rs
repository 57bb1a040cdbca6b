//! Message Store: record durevole dei messaggi diretti, interrogabile per conversazione.
//!
//! Solo inserimenti e letture: nessun update o delete è esposto.

use async_trait::async_trait;
use missiva_core::{utils::media, ChatError, Message};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use time::OffsetDateTime;

/// Posizione nella conversazione: il messaggio più vecchio già mostrato.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: OffsetDateTime,
    pub id: String,
}

impl From<&Message> for Cursor {
    fn from(m: &Message) -> Self {
        Self {
            created_at: m.created_at,
            id: m.id.clone(),
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persiste un nuovo messaggio assegnando `id` e `createdAt`.
    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError>;

    /// Tutti i messaggi tra `a` e `b`, per `createdAt` crescente e poi per `id`.
    async fn list_between(&self, a: &str, b: &str) -> Result<Vec<Message>, ChatError>;

    /// I `limit` messaggi più recenti strettamente precedenti a `before`,
    /// restituiti in ordine crescente.
    async fn list_between_window(
        &self,
        a: &str,
        b: &str,
        before: Option<&Cursor>,
        limit: u32,
    ) -> Result<Vec<Message>, ChatError>;
}

/// Verifica i campi obbligatori prima di toccare il database.
pub fn validate_new_message(
    sender_id: &str,
    receiver_id: &str,
    content: &str,
    attachment: Option<&str>,
) -> Result<(), ChatError> {
    if sender_id.is_empty() {
        return Err(ChatError::validation("missing sender"));
    }
    if receiver_id.is_empty() {
        return Err(ChatError::validation("missing receiver"));
    }
    if content.is_empty() && attachment.is_none() {
        return Err(ChatError::validation("empty content"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str =
    "SELECT message_id, sender_id, receiver_id, content, attachment, created_at FROM messages";

const PAIR_FILTER: &str =
    "((sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?))";

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persiste un messaggio già completo (id e timestamp inclusi).
    /// Usato da `create` e per importare dati esistenti.
    pub async fn insert(&self, message: &Message) -> Result<(), ChatError> {
        validate_new_message(
            &message.sender_id,
            &message.receiver_id,
            &message.content,
            message.attachment.as_deref(),
        )?;
        let created_at = to_nanos(message.created_at)?;
        sqlx::query(
            "INSERT INTO messages (message_id, sender_id, receiver_id, content, attachment, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(&message.attachment)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ChatError::store(format!("db insert error: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError> {
        validate_new_message(sender_id, receiver_id, content, attachment)?;
        // il marcatore nel testo diventa subito attachment: la copia restituita
        // coincide con quella riletta dal database
        let (content, attachment) = match attachment {
            Some(url) => (content.to_string(), Some(url.to_string())),
            None => media::decode_legacy(content),
        };
        let message = Message {
            id: missiva_core::new_message_id(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content,
            attachment,
            created_at: missiva_core::now_utc(),
        };
        self.insert(&message).await?;
        Ok(message)
    }

    async fn list_between(&self, a: &str, b: &str) -> Result<Vec<Message>, ChatError> {
        let sql = format!("{SELECT_COLUMNS} WHERE {PAIR_FILTER} ORDER BY created_at ASC, message_id ASC");
        let rows = sqlx::query(&sql)
            .bind(a)
            .bind(b)
            .bind(b)
            .bind(a)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ChatError::store(format!("db error: {}", e)))?;
        rows.iter().map(message_from_row).collect()
    }

    async fn list_between_window(
        &self,
        a: &str,
        b: &str,
        before: Option<&Cursor>,
        limit: u32,
    ) -> Result<Vec<Message>, ChatError> {
        let rows = match before {
            Some(cursor) => {
                let at = to_nanos(cursor.created_at)?;
                let sql = format!(
                    "{SELECT_COLUMNS} WHERE {PAIR_FILTER} \
                     AND (created_at < ? OR (created_at = ? AND message_id < ?)) \
                     ORDER BY created_at DESC, message_id DESC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(a)
                    .bind(b)
                    .bind(b)
                    .bind(a)
                    .bind(at)
                    .bind(at)
                    .bind(&cursor.id)
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "{SELECT_COLUMNS} WHERE {PAIR_FILTER} ORDER BY created_at DESC, message_id DESC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(a)
                    .bind(b)
                    .bind(b)
                    .bind(a)
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| ChatError::store(format!("db error: {}", e)))?;

        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn to_nanos(at: OffsetDateTime) -> Result<i64, ChatError> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| ChatError::validation("timestamp out of range"))
}

fn message_from_row(row: &SqliteRow) -> Result<Message, ChatError> {
    let get_err = |e: sqlx::Error| ChatError::store(format!("db get error: {}", e));
    let nanos: i64 = row.try_get("created_at").map_err(get_err)?;
    let created_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| ChatError::store(format!("bad created_at: {}", e)))?;
    let content: String = row.try_get("content").map_err(get_err)?;
    let attachment: Option<String> = row.try_get("attachment").map_err(get_err)?;

    // righe legacy: immagine codificata nel testo
    let (content, attachment) = match attachment {
        Some(url) => (content, Some(url)),
        None => media::decode_legacy(&content),
    };

    Ok(Message {
        id: row.try_get("message_id").map_err(get_err)?,
        sender_id: row.try_get("sender_id").map_err(get_err)?,
        receiver_id: row.try_get("receiver_id").map_err(get_err)?,
        content,
        attachment,
        created_at,
    })
}
