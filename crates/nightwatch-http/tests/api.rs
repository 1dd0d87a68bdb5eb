//! Router tests driven in-process

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Europe::Paris;
use nightwatch_core::{EngineSettings, PolicyEngine, sign_request};
use nightwatch_http::{AppState, create_router};
use nightwatch_notify::{MockNotifier, Notifier};
use nightwatch_store::{SqliteStore, Store};
use nightwatch_util::{DeviceId, ParentId};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const ADMIN: &str = "test-admin-token-0123";

/// Monday 2025-06-02, 23:30 in Paris
fn now() -> DateTime<Utc> {
    Paris
        .with_ymd_and_hms(2025, 6, 2, 23, 30, 0)
        .unwrap()
        .with_timezone(&Utc)
}

struct Harness {
    router: Router,
    store: Arc<dyn Store>,
    notifier: Arc<MockNotifier>,
}

fn harness() -> Harness {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = PolicyEngine::new(
        store.clone(),
        EngineSettings {
            admin_token: Some(ADMIN.to_string()),
            ..Default::default()
        },
    );
    let notifier = Arc::new(MockNotifier::new());
    let state = AppState::new(Arc::new(engine), notifier.clone() as Arc<dyn Notifier>)
        .with_clock(now);

    Harness {
        router: create_router(state),
        store,
        notifier,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn admin(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn device(method: &str, uri: &str, secret: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", secret))
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Enroll a device with the scenario policy; returns (device_id, token, secret)
async fn enroll(router: &Router) -> (String, String, String) {
    let (status, enrolled) = send(
        router,
        admin("POST", "/api/v1/parent/devices", json!({ "name": "Sam's phone" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let device_id = enrolled["device"]["device_id"].as_str().unwrap().to_string();
    let (status, _) = send(
        router,
        admin(
            "PATCH",
            &format!("/api/v1/parent/devices/{}/policy", device_id),
            json!({
                "hotspot_off": true,
                "timezone": "Europe/Paris",
                "schedule": { "type": "weekly", "days": { "mon": { "start": "22:00", "end": "07:00" } } }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (
        device_id,
        enrolled["device_token"].as_str().unwrap().to_string(),
        enrolled["device_secret"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_is_open() {
    let h = harness();
    let (status, body) = send(
        &h.router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store_healthy"], true);
}

#[tokio::test]
async fn device_policy_with_bearer() {
    let h = harness();
    let (device_id, _, secret) = enroll(&h.router).await;

    let (status, body) = send(&h.router, device("GET", "/api/v1/device/policy", &secret, "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device_id"], device_id.as_str());
    assert_eq!(body["enforce"], true);
    assert_eq!(body["is_quiet_hours"], true);
    assert_eq!(body["schedule"]["active_window"]["start"], "22:00");
    assert_eq!(body["status_message"], "Protection is on through tomorrow.");
}

#[tokio::test]
async fn missing_or_bad_credentials_are_generic() {
    let h = harness();
    let (_, token, secret) = enroll(&h.router).await;

    let none = Request::builder()
        .uri("/api/v1/device/policy")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.router, none).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let unknown = device("GET", "/api/v1/device/policy", "feedface", "");
    let (_, unknown_body) = send(&h.router, unknown).await;

    let mismatched = Request::builder()
        .uri("/api/v1/device/policy")
        .header("authorization", format!("Bearer {}", secret))
        .header("x-device-token", format!("{}00", token))
        .body(Body::empty())
        .unwrap();
    let (status, mismatched_body) = send(&h.router, mismatched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, mismatched_body);
}

#[tokio::test]
async fn signed_event_post() {
    let h = harness();
    let (device_id, token, secret) = enroll(&h.router).await;

    let body = json!({
        "ts": now().to_rfc3339(),
        "trigger": "quiet_start",
        "shortcut_version": "2.1",
        "actions_attempted": ["hotspot_off"],
        "result": { "ok": true, "errors": [] }
    })
    .to_string();
    let timestamp = now().timestamp().to_string();
    let signature = sign_request(&secret, &timestamp, "POST", "/api/v1/device/events", body.as_bytes()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/device/events")
        .header("x-device-token", token.as_str())
        .header("x-timestamp", timestamp.as_str())
        .header("x-signature", signature.as_str())
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, accepted) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["ok"], true);

    let (status, history) = send(
        &h.router,
        admin("GET", &format!("/api/v1/parent/devices/{}/events?limit=5", device_id), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["events"][0]["trigger"], "quiet_start");
    assert_eq!(history["events"][0]["id"], accepted["event_id"]);

    // Same signature over a different body
    let tampered = Request::builder()
        .method("POST")
        .uri("/api/v1/device/events")
        .header("x-device-token", token.as_str())
        .header("x-timestamp", timestamp.as_str())
        .header("x-signature", signature.as_str())
        .body(Body::from(body.replace("quiet_start", "quiet_end")))
        .unwrap();
    let (status, _) = send(&h.router, tampered).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extra_time_request_notifies_parent() {
    let h = harness();
    let (_, _, secret) = enroll(&h.router).await;

    let (status, view) = send(
        &h.router,
        device(
            "POST",
            "/api/v1/device/extra-time",
            &secret,
            r#"{"minutes": 30, "reason": "finishing a movie"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["status"], "pending");

    let sent = h.notifier.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].summary().contains("30 more minutes"));
}

#[tokio::test]
async fn failing_notifier_does_not_fail_request() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = PolicyEngine::new(
        store,
        EngineSettings {
            admin_token: Some(ADMIN.to_string()),
            ..Default::default()
        },
    );
    let notifier = Arc::new(MockNotifier::failing());
    let router = create_router(
        AppState::new(Arc::new(engine), notifier.clone() as Arc<dyn Notifier>).with_clock(now),
    );
    let (_, _, secret) = enroll(&router).await;

    let (status, _) = send(
        &router,
        device("POST", "/api/v1/device/extra-time", &secret, r#"{"minutes": 10}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(notifier.wait_for(1, Duration::from_secs(2)).await.len(), 1);
}

#[tokio::test]
async fn second_decision_conflicts() {
    let h = harness();
    let (_, _, secret) = enroll(&h.router).await;
    let (_, request) = send(
        &h.router,
        device("POST", "/api/v1/device/extra-time", &secret, r#"{"minutes": 30}"#),
    )
    .await;
    let uri = format!(
        "/api/v1/parent/extra-time/{}/decision",
        request["id"].as_str().unwrap()
    );

    let (status, approved) = send(
        &h.router,
        admin("POST", &uri, json!({ "approve": true, "granted_minutes": 15 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["granted_minutes"], 15);

    let (status, body) = send(&h.router, admin("POST", &uri, json!({ "approve": false }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_resolved");

    let (_, policy) = send(&h.router, device("GET", "/api/v1/device/policy", &secret, "")).await;
    assert_eq!(policy["enforce"], false);
    assert_eq!(policy["active_extra_time"]["granted_minutes"], 15);
}

#[tokio::test]
async fn policy_validation_reports_field() {
    let h = harness();
    let (device_id, _, _) = enroll(&h.router).await;

    let (status, body) = send(
        &h.router,
        admin(
            "PATCH",
            &format!("/api/v1/parent/devices/{}/policy", device_id),
            json!({ "schedule": { "type": "weekly", "days": { "mon": { "start": "22:00", "end": "7pm" } } } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["field"], "schedule.days.mon.end");

    let (status, body) = send(
        &h.router,
        admin(
            "PATCH",
            &format!("/api/v1/parent/devices/{}/policy", device_id),
            json!({ "gap_threshold_minutes": "soon" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "body");

    let (status, body) = send(
        &h.router,
        admin(
            "PATCH",
            &format!("/api/v1/parent/devices/{}/policy", device_id),
            json!({ "schedule": { "type": "weekly", "days": {
                "Monday": { "start": "21:00", "end": "07:00" },
                "mon": { "start": "22:00", "end": "07:00" }
            } } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "schedule.days.mon");
}

#[tokio::test]
async fn rejected_event_still_counts_as_seen() {
    let h = harness();
    let (device_id, _, secret) = enroll(&h.router).await;
    let id: DeviceId = device_id.parse().unwrap();

    let (status, body) = send(
        &h.router,
        device("POST", "/api/v1/device/events", &secret, "{\"trigger\": 42}"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "body");
    assert_eq!(h.store.get_device(&id).unwrap().unwrap().last_seen, Some(now()));
    assert!(h.store.latest_event_at(&id).unwrap().is_none());
}

#[tokio::test]
async fn parent_session_scopes_devices() {
    let h = harness();
    h.store
        .register_parent_session("alice-session", &ParentId::new("alice"), None, now())
        .unwrap();
    h.store
        .register_parent_session("bob-session", &ParentId::new("bob"), None, now())
        .unwrap();

    let as_parent = |session: &str, method: &str, uri: &str, body: Value| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-parent-session", session)
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let (status, enrolled) = send(
        &h.router,
        as_parent("alice-session", "POST", "/api/v1/parent/devices", json!({ "name": "Tablet" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(enrolled["device"]["parent_id"], "alice");
    let policy_uri = format!(
        "/api/v1/parent/devices/{}/policy",
        enrolled["device"]["device_id"].as_str().unwrap()
    );

    let (status, _) = send(&h.router, as_parent("alice-session", "GET", &policy_uri, Value::Null)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.router, as_parent("bob-session", "GET", &policy_uri, Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, dashboard) = send(
        &h.router,
        as_parent("bob-session", "GET", "/api/v1/parent/dashboard", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["devices"].as_array().unwrap().len(), 0);

    let (status, _) = send(
        &h.router,
        as_parent("expired-or-unknown", "GET", "/api/v1/parent/dashboard", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn grant_and_delete() {
    let h = harness();
    let (device_id, _, secret) = enroll(&h.router).await;

    let (status, grant) = send(
        &h.router,
        admin(
            "POST",
            &format!("/api/v1/parent/devices/{}/extra-time", device_id),
            json!({ "minutes": 20 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(grant["status"], "approved");

    let (_, dashboard) = send(&h.router, admin("GET", "/api/v1/parent/dashboard", Value::Null)).await;
    let summary = &dashboard["devices"][0];
    assert_eq!(summary["enforce"], false);
    assert_eq!(summary["active_extra_time"]["granted_minutes"], 20);

    let (status, _) = send(
        &h.router,
        admin("DELETE", &format!("/api/v1/parent/devices/{}", device_id), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&h.router, device("GET", "/api/v1/device/policy", &secret, "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
