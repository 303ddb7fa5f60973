//! REST endpoints driven through the router with in-memory collaborators.

mod common;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{TestApp, test_app};
use gemini_live::{GeminiLiveClient, LiveSettings};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::{Arc, atomic::Ordering};
use tower::ServiceExt;
use vaani_api::{router::create_router, ws::SessionHandle};
use vaani_core::registration::OTP_RANGE;

fn app() -> (TestApp, Router) {
    let test = test_app("ws://127.0.0.1:9/unused", None);
    let router = create_router(test.state.clone());
    (test, router)
}

async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_register_stores_and_sends_six_digit_otp() {
    let (test, router) = app();

    let (status, body) = call(
        &router,
        Method::POST,
        "/register?name=Asha&no=9876543210&gender=female",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success"}));

    let sent = test.sender.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let (phone, otp) = &sent[0];
    assert_eq!(phone, "9876543210");
    assert!(OTP_RANGE.contains(otp));

    let users = test.store.users.lock().unwrap();
    let stored = users.get("9876543210").expect("user stored");
    assert_eq!(stored.otp, *otp);
    assert_eq!(stored.name, "Asha");
}

#[tokio::test]
async fn test_register_rejects_unknown_gender() {
    let (test, router) = app();
    let (status, body) = call(
        &router,
        Method::POST,
        "/register?name=Asha&no=9876543210&gender=robot",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("robot"));
    assert!(test.sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_delivery_failure_is_internal_error() {
    let (test, router) = app();
    test.sender.fail.store(true, Ordering::SeqCst);

    let (status, body) = call(
        &router,
        Method::POST,
        "/register?name=Asha&no=9876543210&gender=male",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "An internal server error occurred.");
}

#[tokio::test]
async fn test_verify_matches_stored_otp() {
    let (test, router) = app();
    call(
        &router,
        Method::POST,
        "/register?name=Ravi&no=9000000001&gender=male",
    )
    .await;
    let otp = test.sender.sent.lock().unwrap()[0].1;
    let wrong = if otp == 999_999 { 100_000 } else { otp + 1 };

    let (status, body) = call(
        &router,
        Method::POST,
        &format!("/verify?no=9000000001&otp={}", wrong),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "failure"}));
    assert!(test.store.verified.lock().unwrap().is_empty());

    let (status, body) = call(
        &router,
        Method::POST,
        &format!("/verify?no=9000000001&otp={}", otp),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success"}));
    assert!(test.store.verified.lock().unwrap().contains("9000000001"));
}

#[tokio::test]
async fn test_verify_unknown_phone_fails() {
    let (_test, router) = app();
    let (status, body) = call(&router, Method::POST, "/verify?no=1234567890&otp=123456").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "failure"}));
}

#[tokio::test]
async fn test_verify_rejects_non_numeric_otp() {
    let (_test, router) = app();
    let (status, _) = call(&router, Method::POST, "/verify?no=1234567890&otp=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tts_picks_voice_for_language_and_gender() {
    let (test, router) = app();
    let (status, body) = call(
        &router,
        Method::POST,
        "/tts?text=namaste&language=Hindi&gender=Male",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"filename": "/tmp/vaani-tts/hi-IN-AaravNeural.wav"}));

    let requests = test.speech.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![("namaste".to_string(), "hi-IN-AaravNeural".to_string())]
    );
}

#[tokio::test]
async fn test_tts_rejects_unknown_language() {
    let (test, router) = app();
    let (status, body) = call(
        &router,
        Method::POST,
        "/tts?text=hello&language=Klingon&gender=Female",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Klingon"));
    assert!(test.speech.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_session_lookup_and_close_request() {
    let (test, router) = app();
    let (status, _) = call(&router, Method::GET, "/sessions/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let settings = LiveSettings::new(SecretString::from("key".to_string()), "");
    let handle = SessionHandle::new(
        "phone-42",
        Arc::new(GeminiLiveClient::new(Arc::new(settings))),
    );
    test.state.sessions.put(handle.clone()).unwrap();

    let (status, body) = call(&router, Method::GET, "/sessions/phone-42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "phone-42", "state": "awaiting_config"}));

    let (status, _) = call(&router, Method::DELETE, "/sessions/phone-42").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    tokio::time::timeout(std::time::Duration::from_secs(1), handle.cancelled())
        .await
        .expect("close request should reach the session");

    let (status, _) = call(&router, Method::DELETE, "/sessions/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (_test, router) = app();
    let (status, body) = call(&router, Method::GET, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    for path in ["/register", "/verify", "/tts", "/sessions/{id}"] {
        assert!(body["paths"].get(path).is_some(), "missing {}", path);
    }
}
