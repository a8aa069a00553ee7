#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use lisbridge_core::{
    HttpPublisher, PlatformConfig, PublishError, ResultPublisher, RetryPolicy, Serializer,
};

#[derive(Clone, Default)]
struct Platform {
    hits: Arc<AtomicUsize>,
    failures_before_success: usize,
    failure_status: u16,
    accept_headers: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn receive(
    State(platform): State<Platform>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let hit = platform.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(accept) = headers.get("accept").and_then(|value| value.to_str().ok()) {
        platform.accept_headers.lock().unwrap().push(accept.to_string());
    }
    platform.bodies.lock().unwrap().push(body);

    if hit < platform.failures_before_success {
        StatusCode::from_u16(platform.failure_status).unwrap()
    } else {
        StatusCode::OK
    }
}

async fn spawn_platform(platform: Platform) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/results", post(receive))
        .with_state(platform);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/results"))
}

fn fast_policy(retry_count: u32) -> RetryPolicy {
    RetryPolicy {
        retry_count,
        wait: Duration::from_millis(5),
        max_wait: Duration::from_millis(20),
    }
}

fn record() -> Serializer {
    Serializer {
        device_id: "URINE-7".into(),
        protocol: "rs232".into(),
        device_type_code: "URIT-500B".into(),
        sequence_number: 123,
        patient_id: "NO.000123".into(),
        timestamp: Some("2024-01-15T10:42:17Z".into()),
        results: Vec::new(),
    }
}

#[tokio::test]
async fn retries_server_errors_until_success() -> Result<()> {
    let platform = Platform {
        failures_before_success: 2,
        failure_status: 503,
        ..Platform::default()
    };
    let url = spawn_platform(platform.clone()).await?;
    let publisher = HttpPublisher::new(url, &PlatformConfig::default())?.with_policy(fast_policy(3));

    publisher.post(&record()).await?;

    assert_eq!(platform.hits.load(Ordering::SeqCst), 3);
    let accepts = platform.accept_headers.lock().unwrap().clone();
    assert!(accepts.iter().all(|accept| accept == "application/json"));
    let bodies = platform.bodies.lock().unwrap().clone();
    assert_eq!(bodies[0]["patient_id"], "NO.000123");
    assert_eq!(bodies[0]["sequence_number"], 123);
    Ok(())
}

#[tokio::test]
async fn gives_up_after_retry_budget() -> Result<()> {
    let platform = Platform {
        failures_before_success: usize::MAX,
        failure_status: 429,
        ..Platform::default()
    };
    let url = spawn_platform(platform.clone()).await?;
    let publisher = HttpPublisher::new(url, &PlatformConfig::default())?.with_policy(fast_policy(2));

    let err = publisher.post(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::Status { status: 429, .. }));
    assert_eq!(platform.hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn client_errors_are_not_retried() -> Result<()> {
    let platform = Platform {
        failures_before_success: usize::MAX,
        failure_status: 400,
        ..Platform::default()
    };
    let url = spawn_platform(platform.clone()).await?;
    let publisher = HttpPublisher::new(url, &PlatformConfig::default())?.with_policy(fast_policy(3));

    let err = publisher.post(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::Status { status: 400, .. }));
    assert_eq!(platform.hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_platform_is_a_transport_error() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let publisher = HttpPublisher::new(format!("http://{addr}/results"), &PlatformConfig::default())?
        .with_policy(fast_policy(1));
    let err = publisher.post(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::Transport(_)));
    Ok(())
}
