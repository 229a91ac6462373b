//! Standalone end-to-end tests.
//!
//! Drives the front-door router in-process with `oneshot` against a fully
//! assembled fabric: bridge, controller, local fleet, and redb store.
//! Shutdown ordering is checked over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tower::ServiceExt;

use swarm_bridge::Bridge;
use swarm_core::SwarmConfig;
use swarm_core::config::{BridgeConfig, ControllerConfig, WorkerConfig};
use swarm_queue::{Delivery, MessageQueue, QueueError, QueueFuture, ReceiptHandle};
use swarm_store::{ObjectStore, RedbObjectStore};
use swarm_worker::{ComputeCapability, ComputeError};
use swarmd::Fabric;

const BOUNDARY: &str = "swarm-test-boundary";

fn fast_config(timeout: Duration) -> SwarmConfig {
    let mut config = SwarmConfig::default();
    config.bridge = BridgeConfig {
        timeout,
        poll_interval: Duration::from_millis(10),
        receive_wait: Duration::from_millis(20),
        sweep_interval: Duration::from_millis(50),
        ..BridgeConfig::default()
    };
    config.controller = ControllerConfig {
        tick_interval: Duration::from_millis(20),
        scale_in_threshold: 3,
        terminate_timeout: Duration::from_secs(2),
        terminate_poll: Duration::from_millis(10),
        ..ControllerConfig::default()
    };
    config.worker = WorkerConfig {
        receive_wait: Duration::from_millis(20),
        backoff_base: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
        error_pause: Duration::from_millis(5),
        ..WorkerConfig::default()
    };
    config
}

fn echo() -> Arc<dyn ComputeCapability> {
    Arc::new(|image: &[u8], _model: &str| -> Result<String, ComputeError> {
        Ok(format!("match:{}", String::from_utf8_lossy(image)))
    })
}

fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(field, file_name, bytes)))
        .unwrap()
}

/// POST an upload over a real socket and return the raw HTTP response.
async fn upload_over_tcp(addr: SocketAddr, file_name: &str, bytes: &[u8]) -> String {
    let body = multipart_body("inputFile", file_name, bytes);
    let head = format!(
        "POST / HTTP/1.1\r\nHost: {addr}\r\nContent-Type: multipart/form-data; boundary={BOUNDARY}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(&body).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn memory_store() -> Arc<RedbObjectStore> {
    Arc::new(RedbObjectStore::open_in_memory().unwrap())
}

#[tokio::test]
async fn healthz_responds_ok() {
    let fabric = Fabric::assemble(&SwarmConfig::default(), memory_store(), echo());
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();

    let resp = fabric.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn missing_file_part_is_rejected() {
    let fabric = Fabric::assemble(&SwarmConfig::default(), memory_store(), echo());

    let resp = fabric
        .router()
        .oneshot(upload("somethingElse", "photo.jpg", b"pixels"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, "No file part");
}

#[tokio::test]
async fn upload_round_trips_through_the_fleet() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RedbObjectStore::open(&dir.path().join("objects.redb")).unwrap());
    let fabric = Fabric::assemble(&fast_config(Duration::from_secs(5)), store.clone(), echo());
    let router = fabric.router();
    let handle = fabric.start();

    let resp = router.oneshot(upload("inputFile", "photo.jpg", b"pixels")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "photo:match:pixels");

    // The worker stores its output artifact under the file stem.
    assert_eq!(store.get("swarm-out", "photo").unwrap(), b"match:pixels");
    assert!(!handle.fleet().nodes().is_empty());

    tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_uploads_each_get_their_own_answer() {
    let fabric = Fabric::assemble(&fast_config(Duration::from_secs(10)), memory_store(), echo());
    let router = fabric.router();
    let handle = fabric.start();

    let calls: Vec<_> = (0..20)
        .map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let name = format!("img{i}.png");
                let resp = router
                    .oneshot(upload("inputFile", &name, format!("face-{i}").as_bytes()))
                    .await
                    .unwrap();
                (i, resp.status(), body_text(resp).await)
            })
        })
        .collect();

    for call in calls {
        let (i, status, text) = call.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, format!("img{i}:match:face-{i}"));
    }

    // Fleet never grows past the configured ceiling.
    assert!(handle.fleet().nodes().len() <= 15);

    handle.shutdown().await;
}

#[tokio::test]
async fn idle_fleet_scales_in_after_traffic() {
    let fabric = Fabric::assemble(&fast_config(Duration::from_secs(5)), memory_store(), echo());
    let router = fabric.router();
    let handle = fabric.start();

    let resp = router.oneshot(upload("inputFile", "a.jpg", b"x")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut drained = false;
    for _ in 0..200 {
        if handle.fleet().nodes().iter().all(|n| !n.state.is_active()) {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(drained, "fleet never scaled in");

    handle.shutdown().await;
}

#[tokio::test]
async fn compute_failure_is_returned_as_error_result() {
    let failing: Arc<dyn ComputeCapability> =
        Arc::new(|_: &[u8], model: &str| -> Result<String, ComputeError> {
            Err(ComputeError::Model {
                model: model.to_string(),
                reason: "not found".to_string(),
            })
        });
    let fabric = Fabric::assemble(&fast_config(Duration::from_secs(5)), memory_store(), failing);
    let router = fabric.router();
    let handle = fabric.start();

    let resp = router.oneshot(upload("inputFile", "b.jpg", b"x")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = body_text(resp).await;
    assert!(text.starts_with("b:Error: "), "unexpected body {text}");

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_requests() {
    let slow: Arc<dyn ComputeCapability> =
        Arc::new(|image: &[u8], _model: &str| -> Result<String, ComputeError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(format!("match:{}", String::from_utf8_lossy(image)))
        });
    let fabric = Fabric::assemble(&fast_config(Duration::from_secs(10)), memory_store(), slow);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(fabric.serve(listener, async move {
        let _ = stop_rx.await;
    }));

    let started = Instant::now();
    let client = tokio::spawn(async move { upload_over_tcp(addr, "photo.jpg", b"pixels").await });

    // Stop while the job is still computing.
    tokio::time::sleep(Duration::from_millis(150)).await;
    stop_tx.send(()).unwrap();

    let response = client.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response {response}");
    assert!(response.ends_with("photo:match:pixels"), "unexpected response {response}");

    tokio::time::timeout(Duration::from_secs(3), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn no_workers_means_gateway_timeout() {
    // Assembled but never started: nothing consumes the work queue.
    let fabric = Fabric::assemble(&fast_config(Duration::from_millis(100)), memory_store(), echo());

    let resp = fabric
        .router()
        .oneshot(upload("inputFile", "c.jpg", b"x"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_text(resp).await, "Error: Response timeout");
}

struct RefusingQueue;

impl MessageQueue for RefusingQueue {
    fn send(&self, _body: String) -> QueueFuture<'_, String> {
        Box::pin(async { Err(QueueError::Send("queue unavailable".into())) })
    }
    fn receive(&self, _max: usize, _wait: Duration) -> QueueFuture<'_, Vec<Delivery>> {
        Box::pin(async { Ok(Vec::new()) })
    }
    fn delete<'a>(&'a self, _receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
    fn approximate_len(&self) -> QueueFuture<'_, usize> {
        Box::pin(async { Ok(0) })
    }
}

#[tokio::test]
async fn submission_failure_is_internal_error() {
    let config = BridgeConfig {
        send_attempts: 1,
        ..BridgeConfig::default()
    };
    let bridge = Bridge::new(config, Arc::new(RefusingQueue), memory_store(), "swarm-in");
    let router = swarm_api::build_router(bridge);

    let resp = router.oneshot(upload("inputFile", "d.jpg", b"x")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(resp).await;
    assert!(text.starts_with("Error: job submission failed"), "unexpected body {text}");
}
