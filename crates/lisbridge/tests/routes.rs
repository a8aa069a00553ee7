use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use lisbridge::{router, AppState};
use lisbridge_core::{
    DeviceMessagePipeline, InMemoryDeviceMessageRepository, RecordingPublisher,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const APP_KEY: &str = "test-key";

struct Harness {
    app: Router,
    repository: Arc<InMemoryDeviceMessageRepository>,
    publisher: Arc<RecordingPublisher>,
}

fn harness_with(repository: InMemoryDeviceMessageRepository) -> Harness {
    let repository = Arc::new(repository);
    let publisher = Arc::new(RecordingPublisher::new());
    let pipeline = DeviceMessagePipeline::new(repository.clone(), publisher.clone());
    Harness {
        app: router(AppState::new(pipeline, APP_KEY)),
        repository,
        publisher,
    }
}

fn harness() -> Harness {
    harness_with(InMemoryDeviceMessageRepository::new())
}

fn authorized(builder: hyper::http::request::Builder) -> hyper::http::request::Builder {
    builder
        .header("X-Application-ID", "lis-gateway")
        .header("X-Client-ID", "ward-3")
        .header("X-Application-Key", APP_KEY)
        .header("content-type", "application/json")
}

fn post_body(body: Value) -> Body {
    Body::from(serde_json::to_vec(&body).expect("encode body"))
}

async fn read_json(response: axum::response::Response) -> Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn accepts_rs232_message_and_publishes() -> Result<()> {
    let harness = harness();
    let message = "NO.000123 2024-01-15\n10:42:17\nLEU +2      125 CELL/uL\nSG 1.015";
    let request = authorized(Request::post("/api/v1/device-messages"))
        .header("X-Request-ID", "req-42")
        .body(post_body(json!({
            "device_id": "URINE-7",
            "device_type_code": "URIT-500B",
            "protocol": "rs232",
            "message": STANDARD.encode(message),
        })))?;

    let response = harness.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );

    let body = read_json(response).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "payload requested successfully");
    assert_eq!(body["data"]["outcome"]["status"], "published");
    assert_eq!(body["metadata"], Value::Null);

    let stored = harness.repository.messages();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].message, message);

    let published = harness.publisher.records();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].sequence_number, 123);
    Ok(())
}

#[tokio::test]
async fn generates_request_id_when_absent() -> Result<()> {
    let harness = harness();
    let request = authorized(Request::post("/api/v1/device-messages")).body(post_body(json!({
        "device_id": "DEV-1",
        "device_type_code": "ANY",
        "protocol": "ftp",
        "message": STANDARD.encode("payload"),
    })))?;

    let response = harness.app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("request id header");
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());

    let body = read_json(response).await?;
    assert_eq!(body["data"]["outcome"]["status"], "skipped");
    assert!(harness.publisher.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_headers_are_unauthorized() -> Result<()> {
    let cases = [
        (vec![("X-Client-ID", "c"), ("X-Application-Key", APP_KEY)], 8015),
        (vec![("X-Application-ID", "a"), ("X-Application-Key", APP_KEY)], 8013),
        (vec![("X-Application-ID", "a"), ("X-Client-ID", "c")], 8012),
        (
            vec![
                ("X-Application-ID", "a"),
                ("X-Client-ID", "c"),
                ("X-Application-Key", "wrong"),
            ],
            8012,
        ),
    ];

    for (headers, error_id) in cases {
        let harness = harness();
        let mut builder = Request::post("/api/v1/device-messages");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(post_body(json!({})))?;

        let response = harness.app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await?;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "payload requested unsuccessfully");
        assert_eq!(body["error_code"]["error_id"], error_id);
        assert!(harness.repository.messages().is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn invalid_bodies_are_bad_requests() -> Result<()> {
    let bodies = [
        Body::from("not json"),
        post_body(json!({
            "device_id": "DEV-1",
            "device_type_code": "ANY",
            "protocol": "hl7",
        })),
        post_body(json!({
            "device_id": "DEV-1",
            "device_type_code": "ANY",
            "protocol": "hl7",
            "message": "%%% not base64 %%%",
        })),
        post_body(json!({
            "device_id": "",
            "device_type_code": "ANY",
            "protocol": "hl7",
            "message": STANDARD.encode("MSH|^~\\&"),
        })),
    ];

    for body in bodies {
        let harness = harness();
        let request = authorized(Request::post("/api/v1/device-messages")).body(body)?;
        let response = harness.app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await?;
        assert_eq!(body["error_code"]["error_id"], 8002);
        assert!(harness.repository.messages().is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn storage_failure_is_internal_error() -> Result<()> {
    let harness = harness_with(InMemoryDeviceMessageRepository::failing("database offline"));
    let request = authorized(Request::post("/api/v1/device-messages")).body(post_body(json!({
        "device_id": "DEV-1",
        "device_type_code": "COBAS",
        "protocol": "hl7",
        "message": STANDARD.encode("MSH|^~\\&\nPID|1||123"),
    })))?;

    let response = harness.app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await?;
    assert_eq!(body["error_code"]["error_id"], 8000);
    let errors = body["errors"].as_array().expect("errors array");
    assert!(errors
        .iter()
        .any(|error| error.as_str().unwrap_or_default().contains("database offline")));
    Ok(())
}

#[tokio::test]
async fn healthz_reports_storage_state() -> Result<()> {
    let response = harness()
        .app
        .oneshot(Request::get("/healthz").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await?, json!({ "status": "ok" }));

    let response = harness_with(InMemoryDeviceMessageRepository::failing("down"))
        .app
        .oneshot(Request::get("/healthz").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn whitespace_fields_count_as_present() -> Result<()> {
    let harness = harness();
    let request = authorized(Request::post("/api/v1/device-messages")).body(post_body(json!({
        "device_id": " ",
        "device_type_code": " ",
        "protocol": "rs232",
        "message": STANDARD.encode("NO.7\nPH 6.5"),
    })))?;

    let response = harness.app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = harness.repository.messages();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].device_id, " ");

    let published = harness.publisher.records();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].sequence_number, 7);
    Ok(())
}

#[tokio::test]
async fn padded_base64_message_is_rejected() -> Result<()> {
    let harness = harness();
    let request = authorized(Request::post("/api/v1/device-messages")).body(post_body(json!({
        "device_id": "DEV-1",
        "device_type_code": "ANY",
        "protocol": "hl7",
        "message": format!(" {} ", STANDARD.encode("MSH|^~\\&")),
    })))?;

    let response = harness.app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await?;
    assert_eq!(body["error_code"]["error_id"], 8002);
    assert!(harness.repository.messages().is_empty());
    Ok(())
}
