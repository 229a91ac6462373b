//! The correlation bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use swarm_core::config::BridgeConfig;
use swarm_core::{JobRequest, JobResult};
use swarm_queue::{MessageQueue, RetryPolicy, encode, send_with_retry};
use swarm_store::ObjectStore;

use crate::error::{BridgeError, BridgeResult};
use crate::poller::{ResultPoller, run_sweeper};
use crate::table::CorrelationTable;

/// Turns a submission into a blocking call that returns the job's result.
///
/// Cheap to clone; clones share the table, queues, and store, so one bridge
/// can serve every request handler in the process.
#[derive(Clone)]
pub struct Bridge {
    work: Arc<dyn MessageQueue>,
    store: Arc<dyn ObjectStore>,
    table: Arc<CorrelationTable>,
    config: BridgeConfig,
    input_bucket: String,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        work: Arc<dyn MessageQueue>,
        store: Arc<dyn ObjectStore>,
        input_bucket: impl Into<String>,
    ) -> Self {
        Self {
            work,
            store,
            table: Arc::new(CorrelationTable::new()),
            config,
            input_bucket: input_bucket.into(),
        }
    }

    /// Spawn this bridge's result poller and orphan sweeper.
    pub fn start(
        &self,
        results: Arc<dyn MessageQueue>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let poller = ResultPoller::new(
            results,
            Arc::clone(&self.table),
            self.config.receive_batch,
            self.config.receive_wait,
            self.config.poll_interval,
        );
        let poller_shutdown = shutdown.clone();
        let poller_task = tokio::spawn(async move { poller.run(poller_shutdown).await });

        let sweeper_task = tokio::spawn(run_sweeper(
            Arc::clone(&self.table),
            self.config.orphan_ttl,
            self.config.sweep_interval,
            shutdown,
        ));

        info!(
            timeout_ms = self.config.timeout.as_millis() as u64,
            orphan_ttl_ms = self.config.orphan_ttl.as_millis() as u64,
            "bridge started"
        );
        vec![poller_task, sweeper_task]
    }

    pub fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Stage `bytes` in the input bucket and run it as a job.
    pub async fn submit(&self, file_name: &str, bytes: &[u8]) -> BridgeResult<JobResult> {
        let correlation_id = Uuid::new_v4().to_string();
        let key = format!("uploads/{correlation_id}/{file_name}");
        let locator = self.store.put(&self.input_bucket, &key, bytes)?;
        debug!(%correlation_id, %locator, size = bytes.len(), "payload staged");

        self.submit_request(JobRequest::new(file_name, locator.to_string(), correlation_id))
            .await
    }

    /// Publish an already staged request and wait for its result.
    pub async fn submit_request(&self, request: JobRequest) -> BridgeResult<JobResult> {
        let body = encode(&request)?;
        let policy = RetryPolicy::with_attempts(self.config.send_attempts);
        send_with_retry(self.work.as_ref(), body, policy).await?;
        info!(correlation_id = %request.correlation_id, file = %request.file_name, "job submitted");

        self.await_result(&request.correlation_id).await
    }

    /// Wait until the result for `correlation_id` is in the table, then
    /// claim it. Woken by every insert, with `poll_interval` as a fallback.
    pub async fn await_result(&self, correlation_id: &str) -> BridgeResult<JobResult> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;

        loop {
            let notified = self.table.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.table.pop(correlation_id) {
                debug!(
                    %correlation_id,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "result claimed"
                );
                return Ok(result);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(%correlation_id, "timed out waiting for result");
                return Err(BridgeError::Timeout {
                    correlation_id: correlation_id.to_string(),
                    waited: now - started,
                });
            }

            let nap = self.config.poll_interval.min(deadline - now);
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use swarm_queue::{Delivery, QueueError, QueueFuture, QueuePair, ReceiptHandle, decode};
    use swarm_store::RedbObjectStore;

    fn config(timeout: Duration) -> BridgeConfig {
        BridgeConfig {
            timeout,
            poll_interval: Duration::from_millis(10),
            receive_batch: 10,
            receive_wait: Duration::from_millis(20),
            orphan_ttl: Duration::from_millis(200),
            sweep_interval: Duration::from_millis(20),
            send_attempts: 2,
        }
    }

    struct Fixture {
        queues: QueuePair,
        store: Arc<RedbObjectStore>,
        bridge: Bridge,
        shutdown: watch::Sender<bool>,
    }

    fn fixture(timeout: Duration) -> Fixture {
        let queues = QueuePair::in_memory(Duration::from_secs(30));
        let store = Arc::new(RedbObjectStore::open_in_memory().unwrap());
        let bridge = Bridge::new(config(timeout), queues.work.clone(), store.clone(), "in");
        let (shutdown, rx) = watch::channel(false);
        bridge.start(queues.results.clone(), rx);
        Fixture {
            queues,
            store,
            bridge,
            shutdown,
        }
    }

    /// Answers every job with `result_for(request)`, after `delay`.
    fn fake_worker(
        queues: QueuePair,
        delay: Duration,
        result_for: fn(&JobRequest) -> String,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let got = queues.work.receive(10, Duration::from_millis(20)).await.unwrap();
                for d in got {
                    let req: JobRequest = decode(&d.body).unwrap();
                    tokio::time::sleep(delay).await;
                    let res = JobResult::success(req.correlation_id.clone(), result_for(&req));
                    queues.results.send(encode(&res).unwrap()).await.unwrap();
                    queues.work.delete(&d.receipt).await.unwrap();
                }
            }
        })
    }

    #[tokio::test]
    async fn result_is_returned_to_its_caller() {
        let f = fixture(Duration::from_secs(2));
        let req = JobRequest::new("a.jpg", "swarm://in/uploads/abc/a.jpg", "abc");

        let results = f.queues.results.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let body = r#"{"result":"match:0.93","correlation_id":"abc"}"#.to_string();
            results.send(body).await.unwrap();
        });

        let got = f.bridge.submit_request(req).await.unwrap();
        assert_eq!(got.result, "match:0.93");
        assert!(!f.bridge.table().contains("abc"));
        f.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn submit_stages_payload_and_publishes_request() {
        let f = fixture(Duration::from_millis(100));
        let err = f.bridge.submit("photo.jpg", b"pixels").await.unwrap_err();
        assert!(err.is_timeout());

        let got = f.queues.work.receive(10, Duration::from_millis(20)).await.unwrap();
        assert_eq!(got.len(), 1);
        let req: JobRequest = decode(&got[0].body).unwrap();
        assert_eq!(req.file_name, "photo.jpg");
        assert_eq!(
            req.payload_reference,
            format!("swarm://in/uploads/{}/photo.jpg", req.correlation_id)
        );
        let key = format!("uploads/{}/photo.jpg", req.correlation_id);
        assert_eq!(f.store.get("in", &key).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn timeout_waits_at_least_the_configured_duration() {
        let f = fixture(Duration::from_millis(150));
        let started = std::time::Instant::now();
        let err = f.bridge.await_result("never").await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(150));
        match err {
            BridgeError::Timeout {
                correlation_id,
                waited,
            } => {
                assert_eq!(correlation_id, "never");
                assert!(waited >= Duration::from_millis(150));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn late_result_is_orphaned_then_swept() {
        let f = fixture(Duration::from_millis(50));
        let err = f.bridge.await_result("late").await.unwrap_err();
        assert!(err.is_timeout());

        let body = encode(&JobResult::success("late", "too late")).unwrap();
        f.queues.results.send(body).await.unwrap();
        for _ in 0..50 {
            if f.bridge.table().contains("late") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(f.bridge.table().contains("late"));

        // orphan_ttl is 200ms, swept every 20ms.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(f.bridge.table().is_empty());
    }

    #[tokio::test]
    async fn concurrent_submits_get_their_own_results() {
        let f = fixture(Duration::from_secs(5));
        let worker = fake_worker(f.queues.clone(), Duration::from_millis(1), |req| {
            format!("result-for-{}", req.file_name)
        });

        let calls: Vec<_> = (0..50)
            .map(|i| {
                let bridge = f.bridge.clone();
                tokio::spawn(async move {
                    let name = format!("f{i}.jpg");
                    let got = bridge.submit(&name, name.as_bytes()).await.unwrap();
                    (name, got.result)
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for call in calls {
            let (name, result) = call.await.unwrap();
            assert_eq!(result, format!("result-for-{name}"));
            seen.insert(name);
        }
        assert_eq!(seen.len(), 50);
        assert!(f.bridge.table().is_empty());
        worker.abort();
    }

    #[tokio::test]
    async fn duplicate_delivery_resolves_once() {
        let f = fixture(Duration::from_secs(2));
        let results = f.queues.results.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let body = encode(&JobResult::success("dup", "same")).unwrap();
            results.send(body.clone()).await.unwrap();
            results.send(body).await.unwrap();
        });

        let got = f.bridge.await_result("dup").await.unwrap();
        assert_eq!(got.result, "same");

        // The second copy lands as an orphan and is never handed out twice.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(f.bridge.table().len() <= 1);
    }

    #[tokio::test]
    async fn independent_bridges_do_not_share_results() {
        let a = fixture(Duration::from_millis(200));
        let b = fixture(Duration::from_millis(200));

        let body = encode(&JobResult::success("x", "for-a")).unwrap();
        a.queues.results.send(body).await.unwrap();

        assert_eq!(a.bridge.await_result("x").await.unwrap().result, "for-a");
        assert!(b.bridge.await_result("x").await.unwrap_err().is_timeout());
    }

    /// Rejects every send.
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
    async fn submission_failure_is_not_a_timeout() {
        let store = Arc::new(RedbObjectStore::open_in_memory().unwrap());
        let bridge = Bridge::new(config(Duration::from_secs(5)), Arc::new(RefusingQueue), store, "in");

        let started = std::time::Instant::now();
        let err = bridge.submit("a.jpg", b"x").await.unwrap_err();
        assert!(matches!(err, BridgeError::Submission(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stopped_bridge_tasks_exit() {
        let queues = QueuePair::in_memory(Duration::from_secs(30));
        let store = Arc::new(RedbObjectStore::open_in_memory().unwrap());
        let bridge = Bridge::new(config(Duration::from_secs(1)), queues.work.clone(), store, "in");
        let (tx, rx) = watch::channel(false);
        let tasks = bridge.start(queues.results.clone(), rx);

        tx.send(true).unwrap();
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
