//! Integration tests for the REST routes, served from the in-memory store.

use std::sync::Arc;

use api_lib::adapters::{MemoryDocumentStore, SampleUserDirectory};
use api_lib::config::Config;
use api_lib::web::jwt::{issue_session_token, verify_session_token, SessionClaims};
use api_lib::web::{router, state::AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

const JWT_SECRET: &str = "integration-secret-at-least-32-chars";

fn test_router() -> Router {
    let config = Config::from_lookup(|name: &str| match name {
        "SKIP_DB_INIT" => Some("true".to_string()),
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        "ADMIN_EMAILS" => Some("admin@simricare.kr".to_string()),
        "COUNSELOR_EMAILS" => Some("counselor.kim@simricare.kr".to_string()),
        _ => None,
    })
    .expect("test config");
    let state = AppState::new(
        Arc::new(config),
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(SampleUserDirectory::new()),
    );
    router(Arc::new(state))
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value), String> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let req = if let Some(payload) = body {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        let bytes =
            serde_json::to_vec(&payload).map_err(|err| format!("serialize request body: {err}"))?;
        builder
            .body(Body::from(bytes))
            .map_err(|err| format!("build request: {err}"))?
    } else {
        builder
            .body(Body::empty())
            .map_err(|err| format!("build request: {err}"))?
    };

    let response = router
        .clone()
        .oneshot(req)
        .await
        .map_err(|err| format!("route request: {err}"))?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .map_err(|err| format!("read response body: {err}"))?;

    let parsed = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|err| format!("parse response body: {err}"))?
    };
    Ok((status, parsed))
}

/// Sends a raw body with an optional content type and parses the reply.
async fn call_raw(
    router: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: &'static str,
) -> Result<(StatusCode, Value), String> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let req = builder
        .body(Body::from(body))
        .map_err(|err| format!("build request: {err}"))?;

    let response = router
        .clone()
        .oneshot(req)
        .await
        .map_err(|err| format!("route request: {err}"))?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .map_err(|err| format!("read response body: {err}"))?;
    let parsed = serde_json::from_slice(&bytes).map_err(|err| {
        format!(
            "response is not JSON ({err}): {}",
            String::from_utf8_lossy(&bytes)
        )
    })?;
    Ok((status, parsed))
}

async fn signup(router: &Router, email: &str) -> Result<String, String> {
    let (status, body) = call(
        router,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": email, "password": "correct-horse", "name": "테스트" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("signup response without token: {body}"))
}

#[tokio::test]
async fn health_reports_healthy() -> Result<(), String> {
    let router = test_router();

    let (status, body) = call(&router, Method::GET, "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "simricare-api");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn missing_required_field_is_a_bad_request() -> Result<(), String> {
    let router = test_router();

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/daily-records",
        None,
        Some(json!({ "clientId": "user-4", "date": "2024-03-01" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("content"));
    Ok(())
}

#[tokio::test]
async fn duplicate_open_assignment_is_rejected() -> Result<(), String> {
    let router = test_router();
    let request = json!({
        "clientId": "user-4",
        "counselorId": "user-2",
        "testType": "PHQ-9",
        "dueDate": "2024-04-01"
    });

    let (status, first) = call(
        &router,
        Method::POST,
        "/api/test-assignments",
        None,
        Some(request.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["status"], "assigned");

    let (status, second) =
        call(&router, Method::POST, "/api/test-assignments", None, Some(request)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(second["success"], false);
    assert_eq!(second["error"], "이미 할당되어 진행 중인 검사입니다.");
    Ok(())
}

#[tokio::test]
async fn assignment_actions_follow_the_status_lifecycle() -> Result<(), String> {
    let router = test_router();

    let (_, created) = call(
        &router,
        Method::POST,
        "/api/test-assignments",
        None,
        Some(json!({ "clientId": "user-5", "counselorId": "user-3", "testType": "GAD-7" })),
    )
    .await?;
    let id = created["data"]["id"].as_str().unwrap_or_default().to_string();

    let (status, started) = call(
        &router,
        Method::PUT,
        "/api/test-assignments",
        None,
        Some(json!({ "assignmentId": id, "action": "start" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["data"]["status"], "in_progress");

    let (status, completed) = call(
        &router,
        Method::PUT,
        "/api/test-assignments",
        None,
        Some(json!({ "assignmentId": id, "action": "complete" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["data"]["status"], "completed");

    let (status, _) = call(
        &router,
        Method::PUT,
        "/api/test-assignments",
        None,
        Some(json!({ "assignmentId": id, "action": "start" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &router,
        Method::PUT,
        "/api/test-assignments",
        None,
        Some(json!({ "assignmentId": id, "action": "archive" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = call(
        &router,
        Method::GET,
        "/api/test-assignments?clientId=user-5&status=completed",
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_results_require_a_session() -> Result<(), String> {
    let router = test_router();

    let (status, body) = call(&router, Method::GET, "/api/test-results", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) =
        call(&router, Method::GET, "/api/test-results", Some("not-a-session"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = signup(&router, "client.new@example.com").await?;
    let (status, body) =
        call(&router, Method::GET, "/api/test-results", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/test-results",
        Some(&token),
        Some(json!({ "testType": "PHQ-9", "result": { "score": 7 } })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&router, Method::GET, "/api/test-results", Some(&token), None).await?;
    assert_eq!(body["data"][0]["result"]["score"], 7);
    Ok(())
}

#[tokio::test]
async fn signup_rejects_a_registered_email_and_login_checks_the_password() -> Result<(), String> {
    let router = test_router();
    signup(&router, "client.dup@example.com").await?;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": "Client.Dup@example.com", "password": "another-pass" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "이미 가입된 이메일입니다.");

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "client.dup@example.com", "password": "wrong-password" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "client.dup@example.com", "password": "correct-horse" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap_or_default().to_string();

    let (status, session) =
        call(&router, Method::GET, "/api/auth/session", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["data"]["role"], "user");

    let (status, _) = call(&router, Method::POST, "/api/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&router, Method::GET, "/api/auth/session", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn chat_messages_round_trip_through_a_room() -> Result<(), String> {
    let router = test_router();

    let (status, sent) = call(
        &router,
        Method::POST,
        "/api/chat",
        None,
        Some(json!({ "senderId": "user-4", "receiverId": "user-2", "message": "안녕하세요" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["data"]["roomId"], "user-2_user-4");
    assert_eq!(sent["data"]["read"], false);
    let id = sent["data"]["id"].as_str().unwrap_or_default().to_string();

    call(
        &router,
        Method::POST,
        "/api/chat",
        None,
        Some(json!({ "senderId": "user-2", "receiverId": "user-4", "message": "반갑습니다" })),
    )
    .await?;

    let (status, room) =
        call(&router, Method::GET, "/api/chat?roomId=user-2_user-4", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["data"][0]["message"], "안녕하세요");
    assert_eq!(room["data"][1]["message"], "반갑습니다");

    let (status, read) =
        call(&router, Method::PUT, &format!("/api/chat/{id}/read"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["data"]["read"], true);

    let (status, _) = call(&router, Method::GET, "/api/chat", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn daily_records_filter_and_update() -> Result<(), String> {
    let router = test_router();

    for (client, date) in [("user-4", "2024-03-01"), ("user-4", "2024-03-02"), ("user-5", "2024-03-01")] {
        let (status, _) = call(
            &router,
            Method::POST,
            "/api/daily-records",
            None,
            Some(json!({ "clientId": client, "counselorId": "user-2", "date": date, "content": "상담 기록" })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, listed) =
        call(&router, Method::GET, "/api/daily-records?clientId=user-4", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let records = listed["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["date"], "2024-03-02");

    let id = records[1]["id"].as_str().unwrap_or_default().to_string();
    let (status, updated) = call(
        &router,
        Method::PUT,
        "/api/daily-records",
        None,
        Some(json!({ "id": id, "mood": "calm" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["mood"], "calm");
    assert_eq!(updated["data"]["content"], "상담 기록");

    let (status, _) = call(
        &router,
        Method::PUT,
        "/api/daily-records",
        None,
        Some(json!({ "id": "missing", "mood": "calm" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn only_admins_change_roles() -> Result<(), String> {
    let router = test_router();
    let body = json!({ "role": "counselor" });

    let (status, _) = call(
        &router,
        Method::PUT,
        "/api/users/user-4/role",
        None,
        Some(body.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let client = signup(&router, "client.plain@example.com").await?;
    let (status, _) = call(
        &router,
        Method::PUT,
        "/api/users/user-4/role",
        Some(&client),
        Some(body.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = signup(&router, "Admin@SimriCare.kr").await?;
    let (status, changed) = call(
        &router,
        Method::PUT,
        "/api/users/user-4/role",
        Some(&admin),
        Some(body),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["data"]["role"], "counselor");

    let (status, _) = call(
        &router,
        Method::PUT,
        "/api/users/user-4/role",
        Some(&admin),
        Some(json!({ "role": "superuser" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn preferences_default_then_merge() -> Result<(), String> {
    let router = test_router();

    let (status, defaults) =
        call(&router, Method::GET, "/api/user-preferences?userId=user-4", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["data"]["language"], "ko");
    assert_eq!(defaults["data"]["theme"], "light");

    let (status, saved) = call(
        &router,
        Method::PUT,
        "/api/user-preferences",
        None,
        Some(json!({ "userId": "user-4", "theme": "dark" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["data"]["theme"], "dark");
    assert_eq!(saved["data"]["language"], "ko");

    let (status, _) = call(&router, Method::GET, "/api/user-tests", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn functions_echo_and_store_client_logs() -> Result<(), String> {
    let router = test_router();

    let (status, echo) = call(
        &router,
        Method::PUT,
        "/functions/api",
        None,
        Some(json!({ "ping": 1 })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(echo["method"], "PUT");
    assert_eq!(echo["body"]["ping"], 1);

    let (status, processed) = call(
        &router,
        Method::POST,
        "/functions/process-logs",
        None,
        Some(json!({ "logs": [
            { "level": "error", "message": "sync failed", "context": { "pending": 2 } },
            { "message": "back online" }
        ] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["data"]["processed"], 2);

    let (status, _) = call(
        &router,
        Method::POST,
        "/functions/process-logs",
        None,
        Some(json!({ "logs": [] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn malformed_requests_use_the_failure_envelope() -> Result<(), String> {
    let router = test_router();

    let wrong_type = r#"{"clientId":5,"counselorId":"user-2","testType":"PHQ-9"}"#;
    let (status, body) = call_raw(
        &router,
        Method::POST,
        "/api/test-assignments",
        Some("application/json"),
        wrong_type,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, body) = call_raw(
        &router,
        Method::POST,
        "/api/daily-records",
        Some("application/json"),
        r#"{"clientId":"user-4","date""#,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call_raw(
        &router,
        Method::POST,
        "/api/chat",
        None,
        r#"{"senderId":"user-4","receiverId":"user-2","message":"hi"}"#,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("Content-Type"));

    let (status, body) = call_raw(
        &router,
        Method::GET,
        "/api/chat?roomId=a&roomId=b",
        None,
        "",
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn sessions_are_signed_tokens_expiring_in_thirty_days() -> Result<(), String> {
    let router = test_router();
    let token = signup(&router, "client.jwt@example.com").await?;

    let claims = verify_session_token(JWT_SECRET, &token).map_err(|e| e.to_string())?;
    assert_eq!(claims.email, "client.jwt@example.com");
    assert_eq!(claims.exp - claims.iat, Duration::days(30).num_seconds());

    // Same session, signed with a different key.
    let forged = issue_session_token("some-other-secret-at-least-32-chars", &claims)
        .map_err(|e| e.to_string())?;
    let (status, _) = call(&router, Method::GET, "/api/test-results", Some(&forged), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correctly signed, but naming a session that was never stored.
    let now = Utc::now();
    let unknown = SessionClaims::new(&claims.sub, "no-such-session", &claims.email, now, now + Duration::days(1));
    let unknown = issue_session_token(JWT_SECRET, &unknown).map_err(|e| e.to_string())?;
    let (status, _) = call(&router, Method::GET, "/api/test-results", Some(&unknown), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&router, Method::GET, "/api/test-results", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
