use axum::{routing::{get, post}, Router, Extension};
use std::sync::Arc;

use crate::{AppState, health_with_pool};
use crate::controllers;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|Extension(state): Extension<Arc<AppState>>| async move {
            health_with_pool(&state.pool).await
        }))
        .route("/api/messages", post(controllers::send_message))
        .route("/api/messages/{other_user_id}", get(controllers::list_messages))
        .route("/api/users", get(controllers::list_users))
        .route("/api/users/{user_id}", get(controllers::get_user))
        .route("/ws", get(controllers::ws_handler))
        .layer(Extension(state))
}
