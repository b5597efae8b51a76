//! End-to-end tests of the request chain, driven through the router.

use std::collections::HashSet;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE, ORIGIN, SET_COOKIE,
};
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use session_gateway::auth::PRINCIPAL_KIND;
use session_gateway::config::Environment;
use session_gateway::http::{build_router, X_REQUEST_ID};
use session_gateway::v1::{self, SessionView};

mod common;
use common::*;

#[tokio::test]
async fn test_cors_headers_on_every_response() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    for (method, uri) in [
        (Method::GET, "/heartbeat"),
        (Method::GET, "/missing"),
        (Method::GET, "/v1/panic"),
        (Method::GET, "/v1/store-failure"),
        (Method::DELETE, "/heartbeat"),
    ] {
        let mut request = request(method.clone(), uri);
        request
            .headers_mut()
            .insert(ORIGIN, "http://client.test".parse().unwrap());
        let response = send(&app, request).await;

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "http://client.test", "{method} {uri}");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true", "{method} {uri}");
        assert_eq!(headers[ACCESS_CONTROL_EXPOSE_HEADERS], "sessionid", "{method} {uri}");
        let allowed = headers[ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap().to_lowercase();
        for name in ["sessionid", "origin", "x-requested-with", "content-type", "authorization", "accept"] {
            assert!(allowed.contains(name), "{name} missing for {method} {uri}");
        }
        let methods = headers[ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        for name in ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE", "OPTIONS"] {
            assert!(methods.contains(name), "{name} missing for {method} {uri}");
        }
    }
}

#[tokio::test]
async fn test_preflight_never_reaches_the_session() {
    let (ctx, memory) = context(Environment::Development);
    let app = app(&ctx);

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/value")
        .header(ORIGIN, "http://client.test")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, preflight).await;
    assert!(response.status().is_success());
    assert!(response.headers().get(SET_COOKIE).is_none());

    let response = send(&app, request(Method::OPTIONS, "/v1/value")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(memory.is_empty());
}

#[tokio::test]
async fn test_heartbeat_is_empty_success() {
    let (ctx, _) = context(Environment::Production);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/heartbeat")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.is_empty());

    let response = send(&app, request(Method::HEAD, "/heartbeat")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_heartbeat_survives_store_outage() {
    let (ctx, _) = context(Environment::Production);
    let app = app(&ctx);

    let first = send(&app, request(Method::GET, "/v1/visits")).await;
    let cookie = session_cookie(&first).unwrap();

    ctx.store.close();

    let response = send(&app, request(Method::GET, "/heartbeat")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.is_empty());

    let response = send(&app, with_cookie(Method::GET, "/heartbeat", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_each_cookieless_request_gets_a_fresh_session() {
    let (ctx, memory) = context(Environment::Development);
    let app = app(&ctx);

    let mut ids = HashSet::new();
    for _ in 0..5 {
        let response = send(&app, request(Method::GET, "/heartbeat")).await;
        let cookie = session_cookie(&response).expect("session cookie issued");
        assert!(ids.insert(session_id(&cookie)));

        let raw = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(raw.contains("Path=/"));
        assert!(raw.contains("HttpOnly"));
        assert!(raw.contains("Max-Age=60"));
    }
    assert!(memory.is_empty(), "untouched sessions must not be stored");
}

#[tokio::test]
async fn test_cookie_replay_restores_session() {
    let (ctx, memory) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let cookie = session_cookie(&response).unwrap();
    assert_eq!(body_string(response).await, "1");

    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &cookie)).await;
    assert_eq!(body_string(response).await, "2");

    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &cookie)).await;
    assert_eq!(session_cookie(&response).as_deref(), Some(cookie.as_str()));
    assert_eq!(body_string(response).await, "3");

    let raw = memory
        .get(&format!("it:sessions:{}", session_id(&cookie)))
        .unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["data"]["visits"], 3);
    assert!(stored["expires_at_ms"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_cookie_restores_in_either_encoding() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let issued = session_cookie(&response).unwrap();
    let signed = cookie::Cookie::parse_encoded(issued.clone()).unwrap().value().to_string();

    let encoded = format!("Test%20Cookie={}", signed.replacen("s:", "s%3A", 1));
    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &encoded)).await;
    assert_eq!(body_string(response).await, "2");

    let plain = format!("{COOKIE_NAME}={signed}");
    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &plain)).await;
    assert_eq!(body_string(response).await, "3");
}

#[tokio::test]
async fn test_unmodified_restored_session_sets_no_cookie() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let cookie = session_cookie(&response).unwrap();

    let response = send(&app, with_cookie(Method::GET, "/v1/value", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_tampered_cookie_is_treated_as_absent() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let cookie = session_cookie(&response).unwrap();
    let original_id = session_id(&cookie);

    let (prefix, signature) = cookie.rsplit_once('.').unwrap();
    let flipped = if signature.starts_with('A') { "B" } else { "A" };
    let tampered = format!("{prefix}.{flipped}{}", &signature[1..]);

    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &tampered)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fresh = session_cookie(&response).unwrap();
    assert_ne!(session_id(&fresh), original_id);
    assert_eq!(body_string(response).await, "1");

    let forged = format!("{COOKIE_NAME}=s:{original_id}.bm90IGEgc2lnbmF0dXJl");
    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &forged)).await;
    assert_eq!(body_string(response).await, "1");
}

#[tokio::test]
async fn test_not_found_in_development() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    for uri in ["/nowhere", "/v1/nowhere", "/v2/visits"] {
        let response = send(&app, request(Method::GET, uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["message"], "Not Found");
        assert_eq!(body["error"]["status"], 404);
    }
}

#[tokio::test]
async fn test_not_found_in_production_is_empty() {
    let (ctx, _) = context(Environment::Production);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(X_REQUEST_ID).is_some());
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_statusless_errors_depend_on_environment() {
    let (dev, _) = context(Environment::Development);
    let response = send(&app(&dev), request(Method::GET, "/v1/store-failure")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["message"], "store connection closed");
    assert_eq!(body["error"]["kind"], "store");

    let (prod, _) = context(Environment::Production);
    let response = send(&app(&prod), request(Method::GET, "/v1/store-failure")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_error_responses_keep_session_cookie() {
    let (ctx, _) = context(Environment::Development);
    let response = send(&app(&ctx), request(Method::GET, "/v1/store-failure")).await;
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn test_panics_are_normalized() {
    let (dev, _) = context(Environment::Development);
    let response = send(&app(&dev), request(Method::GET, "/v1/panic")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["message"].as_str().unwrap().contains("handler exploded"));

    let (prod, _) = context(Environment::Production);
    let response = send(&app(&prod), request(Method::GET, "/v1/panic")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_body_decoding() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, json_request("/v1/echo", None, json!({"a": [1, 2]}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({"a": [1, 2]}));

    let form = Request::builder()
        .method(Method::POST)
        .uri("/v1/echo")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("tag=a&tag=b&name=x%20y"))
        .unwrap();
    let body: Value = serde_json::from_str(&body_string(send(&app, form).await).await).unwrap();
    assert_eq!(body, json!({"tag": ["a", "b"], "name": "x y"}));

    let plain = Request::builder()
        .method(Method::POST)
        .uri("/v1/echo")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("ignored"))
        .unwrap();
    let body: Value = serde_json::from_str(&body_string(send(&app, plain).await).await).unwrap();
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_malformed_and_oversized_bodies() {
    let (ctx, _) = context(Environment::Production);
    let app = app(&ctx);

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/v1/echo")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"a\":"))
        .unwrap();
    let response = send(&app, malformed).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.is_empty());

    let oversized = Request::builder()
        .method(Method::POST)
        .uri("/v1/echo")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(format!("\"{}\"", "x".repeat(4096))))
        .unwrap();
    let response = send(&app, oversized).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_extractor_rejections_are_normalized() {
    let (prod, _) = context(Environment::Production);
    let response = send(&app(&prod), json_request("/v1/typed", None, json!({"n": "x"}))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(session_cookie(&response).is_some());
    assert!(body_string(response).await.is_empty());

    let (dev, _) = context(Environment::Development);
    let response = send(&app(&dev), json_request("/v1/typed", None, json!({"n": "x"}))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["status"], 422);
    assert_eq!(body["error"]["kind"], "status");
    assert!(body["message"].as_str().unwrap().contains("invalid type"));

    let response = send(&app(&dev), json_request("/v1/typed", None, json!({"n": 7}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "7");
}

#[tokio::test]
async fn test_concurrent_writes_leave_one_value() {
    let (ctx, _) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let cookie = session_cookie(&response).unwrap();

    let values: Vec<String> = (0..16).map(|i| format!("value-{i}")).collect();
    let mut tasks = Vec::new();
    for value in values.clone() {
        let app = app.clone();
        let cookie = cookie.clone();
        tasks.push(tokio::spawn(async move {
            let request = json_request("/v1/value", Some(&cookie), json!({ "value": value }));
            send(&app, request).await.status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::NO_CONTENT);
    }

    let response = send(&app, with_cookie(Method::GET, "/v1/value", &cookie)).await;
    let stored = body_string(response).await;
    assert!(values.contains(&stored), "unexpected value {stored}");
}

#[tokio::test]
async fn test_login_restores_identity_and_rotates_session() {
    let (ctx, memory) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let anonymous_cookie = session_cookie(&response).unwrap();

    let response = send(&app, with_cookie(Method::GET, "/v1/whoami", &anonymous_cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        json_request("/v1/login", Some(&anonymous_cookie), json!({"user": "alice"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let user_cookie = session_cookie(&response).unwrap();
    assert_ne!(session_id(&user_cookie), session_id(&anonymous_cookie));
    assert!(memory
        .get(&format!("it:sessions:{}", session_id(&anonymous_cookie)))
        .is_none());

    let response = send(&app, with_cookie(Method::GET, "/v1/whoami", &user_cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let principal: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(principal["id"], "alice");
    assert_eq!(principal["display_name"], "ALICE");

    let response = send(&app, with_cookie(Method::GET, "/v1/visits", &user_cookie)).await;
    assert_eq!(body_string(response).await, "2");

    let response = send(&app, with_cookie(Method::GET, "/v1/whoami", &anonymous_cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stale_principal_falls_back_to_anonymous() {
    let (ctx, memory) = context(Environment::Development);
    let app = app(&ctx);

    let response = send(&app, json_request("/v1/login", None, json!({"user": "bob"}))).await;
    let cookie = session_cookie(&response).unwrap();

    memory.delete(&format!("it:{PRINCIPAL_KIND}:bob"));

    let response = send(&app, with_cookie(Method::GET, "/v1/whoami", &cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let raw = memory
        .get(&format!("it:sessions:{}", session_id(&cookie)))
        .unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert!(stored["data"].get("principal").is_none());
}

#[tokio::test]
async fn test_requests_after_store_close() {
    let (ctx, _) = context(Environment::Production);
    let app = app(&ctx);
    ctx.store.close();

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.is_empty());

    let response = send(&app, request(Method::GET, "/v1/value")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_default_v1_router() {
    let (ctx, memory) = context(Environment::Development);
    let app = build_router(&ctx, v1::router());

    let response = send(&app, request(Method::GET, "/v1/session")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).unwrap();
    let view: SessionView = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(view.is_new);
    assert!(view.principal.is_none());

    // Nothing was written, so the cookie points at no record yet.
    let response = send(&app, with_cookie(Method::GET, "/v1/session", &cookie)).await;
    let view: SessionView = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(view.is_new);
    assert!(memory.is_empty());

    let response = send(&app, json_request("/v1/echo", None, json!({"ping": true}))).await;
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({"ping": true}));
}

#[tokio::test]
async fn test_anonymous_logout_rotates_nothing() {
    let (ctx, memory) = context(Environment::Development);
    let app = app(&ctx);
    let logout_app = build_router(&ctx, v1::router());

    let response = send(&app, request(Method::GET, "/v1/visits")).await;
    let cookie = session_cookie(&response).unwrap();
    assert_eq!(memory.len(), 1);

    let response = send(&logout_app, with_cookie(Method::POST, "/v1/session/logout", &cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(memory.len(), 1);
    assert!(memory
        .get(&format!("it:sessions:{}", session_id(&cookie)))
        .is_some());

    let response = send(&logout_app, request(Method::POST, "/v1/session/logout")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(memory.len(), 1);
}
