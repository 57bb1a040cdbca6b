mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{add_user, setup_state};
use http_body_util::BodyExt;
use missiva_server::routes;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn call(app: &Router, req: Request<Body>) -> Result<(StatusCode, Value)> {
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = resp.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn get(uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(req.body(Body::empty())?)
}

fn post_json(uri: &str, token: &str, body: Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let app = routes::router(Arc::new(state));

    let (status, _) = call(&app, get("/health", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

/*
    Obiettivo test: senza token (o con token sconosciuto) la risposta è 401
    con envelope { success: false, error.code = "unauthorized" }.
*/
#[tokio::test]
async fn history_without_valid_token_is_unauthorized() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let (bob, _) = add_user(&state, "bob").await?;
    let app = routes::router(Arc::new(state));
    let uri = format!("/api/messages/{}", bob.user_id);

    for token in [None, Some("not-a-token")] {
        let (status, body) = call(&app, get(&uri, token)?).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "unauthorized");
    }
    Ok(())
}

#[tokio::test]
async fn send_then_read_history_over_http() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let (alice, alice_token) = add_user(&state, "alice").await?;
    let (bob, bob_token) = add_user(&state, "bob").await?;
    let app = routes::router(Arc::new(state));

    let (status, body) = call(
        &app,
        post_json(
            "/api/messages",
            &alice_token,
            json!({ "receiverId": bob.user_id, "content": "hello" }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"]["senderId"], alice.user_id);
    assert_eq!(body["message"]["receiverId"], bob.user_id);
    let id = body["message"]["id"].clone();

    let (status, body) = call(
        &app,
        get(&format!("/api/messages/{}", alice.user_id), Some(&bob_token))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["messages"][0]["id"], id);
    assert_eq!(body["messages"][0]["content"], "hello");
    Ok(())
}

#[tokio::test]
async fn empty_content_is_a_bad_request() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let (_, alice_token) = add_user(&state, "alice").await?;
    let (bob, _) = add_user(&state, "bob").await?;
    let app = routes::router(Arc::new(state));

    let (status, body) = call(
        &app,
        post_json(
            "/api/messages",
            &alice_token,
            json!({ "receiverId": bob.user_id, "content": "" }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    Ok(())
}

#[tokio::test]
async fn history_window_via_query_params() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let (alice, alice_token) = add_user(&state, "alice").await?;
    let (bob, _) = add_user(&state, "bob").await?;
    for text in ["a", "b", "c"] {
        state.pipeline.send(&alice.user_id, &bob.user_id, text, None).await?;
    }
    let app = routes::router(Arc::new(state));

    let (status, body) = call(
        &app,
        get(&format!("/api/messages/{}?limit=2", bob.user_id), Some(&alice_token))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"][0]["content"], "b");
    assert_eq!(body["messages"][1]["content"], "c");

    // before senza beforeId non è accettato
    let (status, _) = call(
        &app,
        get(
            &format!("/api/messages/{}?limit=2&before=2025-11-02T10:00:00Z", bob.user_id),
            Some(&alice_token),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

/*
    Obiettivo test: un cursore senza limit non viene ignorato. Restituisce solo
    i messaggi precedenti al cursore, non lo storico completo.
*/
#[tokio::test]
async fn cursor_without_limit_pages_backwards() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let (alice, alice_token) = add_user(&state, "alice").await?;
    let (bob, _) = add_user(&state, "bob").await?;
    for text in ["a", "b", "c"] {
        state.pipeline.send(&alice.user_id, &bob.user_id, text, None).await?;
    }
    let app = routes::router(Arc::new(state));

    let (_, body) = call(
        &app,
        get(&format!("/api/messages/{}", bob.user_id), Some(&alice_token))?,
    )
    .await?;
    let newest = &body["messages"][2];
    assert_eq!(newest["content"], "c");
    let uri = format!(
        "/api/messages/{}?before={}&beforeId={}",
        bob.user_id,
        newest["createdAt"].as_str().unwrap_or_default(),
        newest["id"].as_str().unwrap_or_default(),
    );

    let (status, body) = call(&app, get(&uri, Some(&alice_token))?).await?;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<_> = body["messages"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|m| m["content"].clone())
        .collect();
    assert_eq!(contents, [json!("a"), json!("b")]);
    Ok(())
}

#[tokio::test]
async fn user_profile_and_contact_list() -> Result<()> {
    let (_td, state) = setup_state().await?;
    let (alice, alice_token) = add_user(&state, "alice").await?;
    let (bob, _) = add_user(&state, "bob").await?;
    let app = routes::router(Arc::new(state));

    let (status, body) = call(&app, get(&format!("/api/users/{}", bob.user_id), None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "bob");

    let (status, body) = call(&app, get("/api/users/nobody", None)?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = call(&app, get("/api/users", Some(&alice_token))?).await?;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().cloned().unwrap_or_default();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], bob.user_id);
    assert_ne!(users[0]["userId"], alice.user_id);
    Ok(())
}
