//! Directory utenti: risoluzione dell'identità dal token e lookup dei profili.
//! L'autenticazione vera e propria vive fuori da questo servizio; qui c'è solo
//! quello che serve a sapere chi sta chiamando e chi è l'altro partecipante.

use anyhow::Context;
use missiva_core::{utils::new_token, ChatError, User};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mappa un token di sessione sullo user_id durevole. `None` se il token non esiste.
    pub async fn resolve_token(&self, token: &str) -> Result<Option<String>, ChatError> {
        if token.is_empty() {
            return Ok(None);
        }
        sqlx::query_scalar::<_, String>("SELECT user_id FROM users WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChatError::store(format!("db error: {}", e)))
    }

    /// Profilo pubblico di un utente.
    pub async fn profile(&self, user_id: &str) -> Result<Option<User>, ChatError> {
        let row = sqlx::query(
            "SELECT user_id, username, name, image, created_at FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChatError::store(format!("db error: {}", e)))?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Utenti con cui `user_id` può aprire una conversazione (tutti tranne sé stesso).
    pub async fn list_others(&self, user_id: &str) -> Result<Vec<User>, ChatError> {
        let rows = sqlx::query(
            "SELECT user_id, username, name, image, created_at FROM users WHERE user_id <> ? ORDER BY username",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatError::store(format!("db error: {}", e)))?;
        rows.iter().map(user_from_row).collect()
    }

    /// Crea un utente con un token nuovo. Usato dal comando `add-user` e dai test.
    pub async fn create_user(
        &self,
        username: &str,
        name: &str,
        image: Option<&str>,
    ) -> anyhow::Result<(User, String)> {
        let user_id = Uuid::new_v4().to_string();
        let token = new_token();
        let created_at = missiva_core::now_timestamp();

        sqlx::query("INSERT INTO users (user_id, username, name, image, token, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&user_id)
            .bind(username)
            .bind(name)
            .bind(image)
            .bind(&token)
            .bind(&created_at)
            .execute(&self.pool)
            .await
            .with_context(|| format!("insert user {}", username))?;

        let user = User {
            user_id,
            username: username.to_string(),
            name: name.to_string(),
            image: image.map(str::to_string),
            created_at,
        };
        Ok((user, token))
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, ChatError> {
    let get_err = |e: sqlx::Error| ChatError::store(format!("db get error: {}", e));
    Ok(User {
        user_id: row.try_get("user_id").map_err(get_err)?,
        username: row.try_get("username").map_err(get_err)?,
        name: row.try_get("name").map_err(get_err)?,
        image: row.try_get("image").map_err(get_err)?,
        created_at: row.try_get("created_at").map_err(get_err)?,
    })
}
