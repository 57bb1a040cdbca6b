use anyhow::Context;
use axum::http::StatusCode;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod config;
pub mod controllers;
pub mod logging;
pub mod pipeline;
pub mod reader;
pub mod router;
pub mod routes;
pub mod store;
pub mod users;

pub use pipeline::SendPipeline;
pub use reader::{ConversationReader, Window};
pub use router::{ChannelRouter, DeliveryChannel, Subscription, SubscriptionHandle};
pub use store::{Cursor, MessageStore, SqliteMessageStore};
pub use users::UserDirectory;

/// Stato condiviso dagli handler. Niente stato mutabile per-richiesta: il
/// database è la fonte di verità, il router tiene solo le sottoscrizioni vive.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub users: UserDirectory,
    pub channels: Arc<dyn DeliveryChannel>,
    pub pipeline: SendPipeline,
    pub reader: ConversationReader,
}

impl AppState {
    /// Stato con il router in-process.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_channels(pool, Arc::new(ChannelRouter::new()))
    }

    /// Stato con un trasporto di consegna arbitrario.
    pub fn with_channels(pool: SqlitePool, channels: Arc<dyn DeliveryChannel>) -> Self {
        let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(pool.clone()));
        Self {
            users: UserDirectory::new(pool.clone()),
            pipeline: SendPipeline::new(store.clone(), channels.clone()),
            reader: ConversationReader::new(store),
            channels,
            pool,
        }
    }
}

// Dato un percorso di file, restituisce un URL SQLite valido. Crea le directory genitrici se non esistono.
pub fn sqlite_url_for_path(p: &Path) -> anyhow::Result<String> {
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dirs for {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&abs)
        .with_context(|| format!("create/open sqlite file {:?}", abs))?;
    let s = abs.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite:///{}", s))
}

/// Crea un DB URL SQLite a partire dal valore configurato (`--database-url` / DATABASE_URL).
/// "sqlite::memory:" passa invariato.
pub fn build_sqlite_url(raw: &str) -> anyhow::Result<String> {
    if raw == "sqlite::memory:" {
        return Ok(raw.to_string());
    }
    // Rimuovi il prefisso "sqlite://" se presente: "sqlite:///abs/x.db" resta assoluto.
    let path_part = raw.strip_prefix("sqlite://").unwrap_or(raw);
    sqlite_url_for_path(&PathBuf::from(path_part))
}

// Connect to the database and return a connection pool.
pub async fn connect_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect(db_url)
        .await
        .with_context(|| format!("connect to sqlite via {}", db_url))?;
    Ok(pool)
}

// Esegue le migrazioni del database. Crea le tabelle se non esistono.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // Enable foreign keys (SQLite)
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .context("enable foreign_keys")?;

    // created_at dei messaggi è in nanosecondi dall'epoch: ordina correttamente come intero.
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id    TEXT PRIMARY KEY,
            username   TEXT NOT NULL UNIQUE,
            name       TEXT NOT NULL,
            image      TEXT,
            token      TEXT UNIQUE,
            created_at TEXT NOT NULL
        );"#,
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            message_id  TEXT PRIMARY KEY,
            sender_id   TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            content     TEXT NOT NULL,
            attachment  TEXT,
            created_at  INTEGER NOT NULL,
            FOREIGN KEY(sender_id)   REFERENCES users(user_id),
            FOREIGN KEY(receiver_id) REFERENCES users(user_id)
        );"#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages (sender_id, receiver_id, created_at, message_id);"#,
    ];
    // applica ogni statement di migrazione
    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| format!("apply migration: {}", &s[..s.len().min(40)].replace('\n', " ")))?;
    }
    Ok(())
}

/// Controlla lo stato di salute del database tentando di acquisire una connessione dal pool.
pub async fn health_with_pool(pool: &SqlitePool) -> StatusCode {
    match pool.acquire().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
