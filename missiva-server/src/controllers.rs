use axum::extract::ws::{Message as WsFrame, WebSocket};
use axum::{
    extract::{Extension, Path, Query, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use missiva_core::{
    error::codes, utils::parse_timestamp, ApiReply, ChatError, Error, HistoryQuery,
    ListMessagesResponse, ListUsersResponse, SendMessageRequest, SendMessageResponse, User,
    UserResponse, WsMessage,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    reader::{Window, MAX_PAGE},
    store::Cursor,
    AppState,
};

type Reply<T> = (StatusCode, Json<ApiReply<T>>);

fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
        ChatError::Validation(_) => StatusCode::BAD_REQUEST,
        ChatError::Transport(_) => StatusCode::BAD_GATEWAY,
        ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T: Serialize>(result: Result<T, ChatError>) -> Reply<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiReply::ok(data))),
        Err(err) => {
            if matches!(err, ChatError::Store(_)) {
                warn!(error = %err, "request failed");
            }
            (status_for(&err), Json(ApiReply::failed(err)))
        }
    }
}

/// Risolve l'identità del chiamante dall'header `Authorization: Bearer <token>`.
async fn caller(state: &AppState, headers: &HeaderMap) -> Result<String, ChatError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    state
        .users
        .resolve_token(token)
        .await?
        .ok_or(ChatError::Unauthorized)
}

/// Senza `limit` né cursore: storico completo. Un cursore senza `limit` usa `MAX_PAGE`.
fn window_from_query(q: &HistoryQuery) -> Result<Option<Window>, ChatError> {
    if q.limit.is_none() && q.before.is_none() && q.before_id.is_none() {
        return Ok(None);
    }
    let limit = q.limit.unwrap_or(MAX_PAGE);
    let before = match (&q.before, &q.before_id) {
        (Some(at), Some(id)) => Some(Cursor {
            created_at: parse_timestamp(at)
                .map_err(|e| ChatError::validation(format!("invalid before: {}", e)))?,
            id: id.clone(),
        }),
        (None, None) => None,
        _ => return Err(ChatError::validation("before and beforeId go together")),
    };
    Ok(Some(Window { before, limit }))
}

/// Handler per GET /api/messages/{other_user_id}
pub async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(other_user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Reply<ListMessagesResponse> {
    let result = async {
        let me = caller(&state, &headers).await?;
        let messages = match window_from_query(&query)? {
            Some(window) => state.reader.load_window(&me, &other_user_id, window).await?,
            None => state.reader.load(&me, &other_user_id).await?,
        };
        Ok::<_, ChatError>(ListMessagesResponse { messages })
    }
    .await;
    reply(result)
}

/// Handler per POST /api/messages
pub async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Reply<SendMessageResponse> {
    let result = async {
        let me = caller(&state, &headers).await?;
        let message = state
            .pipeline
            .send(&me, &req.receiver_id, &req.content, req.attachment.as_deref())
            .await?;
        Ok::<_, ChatError>(SendMessageResponse { message })
    }
    .await;
    reply(result)
}

/// Handler per GET /api/users/{id}
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Reply<UserResponse> {
    match state.users.profile(&user_id).await {
        Ok(Some(user)) => reply(Ok(UserResponse { user })),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiReply::failed(Error::not_found("user not found"))),
        ),
        Err(err) => reply(Err(err)),
    }
}

/// Handler per GET /api/users
pub async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Reply<ListUsersResponse> {
    let result = async {
        let me = caller(&state, &headers).await?;
        let users = state.users.list_others(&me).await?;
        Ok::<_, ChatError>(ListUsersResponse { users })
    }
    .await;
    reply(result)
}

/// Handler per /ws
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let token = params.get("token").cloned();
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

async fn send_frame(socket: &mut WebSocket, msg: &WsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(text) => socket.send(WsFrame::Text(text.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "cannot encode ws frame");
            false
        }
    }
}

async fn send_error(socket: &mut WebSocket, code: &str, message: &str) {
    let _ = send_frame(socket, &WsMessage::Error(Error::new(code, message))).await;
}

/// Risolve il token in un utente completo; `Err` solo per errori del database.
async fn authenticate(state: &AppState, token: &str) -> Result<Option<User>, ChatError> {
    match state.users.resolve_token(token).await? {
        Some(user_id) => state.users.profile(&user_id).await,
        None => Ok(None),
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, token_q: Option<String>) {
    // Try authenticate via query param first, else wait for an Authenticate frame
    let token = match token_q {
        Some(token) => token,
        None => match socket.next().await {
            Some(Ok(WsFrame::Text(txt))) => match serde_json::from_str::<WsMessage>(txt.as_str()) {
                Ok(WsMessage::Authenticate(auth)) => auth.token,
                _ => {
                    send_error(&mut socket, codes::AUTH_REQUIRED, "expected Authenticate message").await;
                    return;
                }
            },
            Some(Ok(_)) => {
                send_error(&mut socket, codes::AUTH_REQUIRED, "expected text Authenticate message").await;
                return;
            }
            // connection closed or error
            _ => return,
        },
    };

    let user = match authenticate(&state, &token).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            send_error(&mut socket, codes::UNAUTHORIZED, "invalid token").await;
            return;
        }
        Err(e) => {
            send_error(&mut socket, e.code(), &e.to_string()).await;
            return;
        }
    };

    // Il canale ascoltato è sempre quello dell'utente autenticato, mai quello del peer.
    let subscription = match state.channels.subscribe(&user.user_id).await {
        Ok(sub) => sub,
        Err(e) => {
            send_error(&mut socket, e.code(), &e.to_string()).await;
            return;
        }
    };
    let (handle, mut events) = subscription.into_parts();

    if !send_frame(&mut socket, &WsMessage::AuthOk(user.clone())).await {
        state.channels.unsubscribe(&handle).await;
        return;
    }
    info!(user = %user.user_id, "websocket session started");

    /* socket.split() divide il WebSocket in sink (verso il client) e stream (dal client). */
    let (mut sender, mut receiver) = socket.split();

    // Task: forward delivery events -> websocket
    let forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&WsMessage::NewMessage(event)) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "cannot encode delivery event");
                    continue;
                }
            };
            if sender.send(WsFrame::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Il client non invia nulla di significativo dopo l'autenticazione: si attende la chiusura.
    while let Some(Ok(frame)) = receiver.next().await {
        if let WsFrame::Close(_) = frame {
            break;
        }
    }

    // cleanup: l'unsubscribe chiude il canale e fa terminare il forward task
    state.channels.unsubscribe(&handle).await;
    forward_task.abort();
    let _ = forward_task.await;
    info!(user = %user.user_id, "websocket session closed");
}
