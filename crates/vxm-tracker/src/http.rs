//! HTTP client for the experiment-tracking service.
//!
//! Events are posted as JSON to `{endpoint}/api/runs/{run_id}/log`. Any
//! failure is logged at debug level and counted in [`dropped_events`].

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::sink::{MediaRef, MetricsSink, ScalarMap, TablePayload, WatchTarget};
use crate::Result;

static DROPPED_EVENTS: AtomicU64 = AtomicU64::new(0);

/// Number of sink events that could not be delivered in this process.
pub fn dropped_events() -> u64 {
    DROPPED_EVENTS.load(Ordering::Relaxed)
}

/// Identity of a run on the tracking service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub project: Option<String>,
    pub name: Option<String>,
    pub allow_val_change: bool,
}

/// Tracking-service client bound to a single run.
pub struct HttpTracker {
    endpoint: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
    run: RunHandle,
}

impl HttpTracker {
    /// Create a run and return a client bound to it.
    ///
    /// Only a missing endpoint or an unbuildable client is an error. If the
    /// service cannot be reached the run id is still valid locally and later
    /// events are dropped one by one.
    pub async fn start(config: &TrackerConfig, run_config: &Value) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .ok_or(TrackerError::NotConfigured)?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("vxm-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        // In a sweep the agent decides project, name and config values.
        let run = if config.sweep {
            RunHandle {
                run_id: Uuid::new_v4(),
                project: None,
                name: None,
                allow_val_change: true,
            }
        } else {
            RunHandle {
                run_id: Uuid::new_v4(),
                project: Some(config.project.clone()),
                name: config.run_name.clone(),
                allow_val_change: false,
            }
        };

        let tracker = HttpTracker {
            endpoint,
            api_key: config.api_key.clone(),
            http_client,
            run,
        };

        let body = json!({
            "run": tracker.run,
            "config": if config.sweep { Value::Null } else { run_config.clone() },
            "started_at": Utc::now(),
        });
        let url = format!("{}/api/runs", tracker.endpoint);
        if let Err(e) = tracker.post(&url, &body).await {
            DROPPED_EVENTS.fetch_add(1, Ordering::Relaxed);
            debug!(event = "tracker.dropped", kind = "run.create", error = %e);
        }

        Ok(tracker)
    }

    /// The run this client logs into.
    pub fn run(&self) -> &RunHandle {
        &self.run
    }

    /// Whether the run was started by a sweep agent.
    pub fn is_sweep(&self) -> bool {
        self.run.allow_val_change
    }

    async fn post(&self, url: &str, body: &Value) -> Result<()> {
        let mut request = self.http_client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TrackerError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Deliver one event, swallowing any failure.
    async fn send<P: Serialize>(&self, kind: &str, payload: P) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                self.drop_event(kind, &TrackerError::from(e));
                return;
            }
        };
        let body = json!({
            "kind": kind,
            "timestamp": Utc::now(),
            "payload": payload,
        });
        let url = format!("{}/api/runs/{}/log", self.endpoint, self.run.run_id);
        if let Err(e) = self.post(&url, &body).await {
            self.drop_event(kind, &e);
        }
    }

    fn drop_event(&self, kind: &str, error: &TrackerError) {
        DROPPED_EVENTS.fetch_add(1, Ordering::Relaxed);
        debug!(
            event = "tracker.dropped",
            run_id = %self.run.run_id,
            kind = %kind,
            error = %error,
        );
    }
}

#[async_trait]
impl MetricsSink for HttpTracker {
    async fn log_step(&self, step: u64, scalars: &ScalarMap) {
        self.send("step", json!({ "step": step, "scalars": scalars }))
            .await;
    }

    async fn log_epoch(&self, epoch: u64, scalars: &ScalarMap) {
        self.send("epoch", json!({ "epoch": epoch, "scalars": scalars }))
            .await;
    }

    async fn log_image(&self, step: u64, image: &MediaRef, label: &str) {
        self.send(
            "image",
            json!({ "step": step, "label": label, "media": image }),
        )
        .await;
    }

    async fn log_video(&self, path: &Path, label: &str, fps: u32) {
        match MediaRef::from_file(path) {
            Ok(media) => {
                self.send(
                    "video",
                    json!({ "label": label, "fps": fps, "format": "gif", "media": media }),
                )
                .await
            }
            Err(e) => self.drop_event("video", &e),
        }
    }

    async fn log_table(&self, table: &TablePayload, label: &str) {
        self.send("table", json!({ "label": label, "table": table }))
            .await;
    }

    async fn watch(&self, target: &WatchTarget) {
        self.send("watch", json!({ "target": target, "log": "all" }))
            .await;
    }

    async fn log_config(&self, config: &Value) {
        self.send("config", json!({ "config": config, "allow_val_change": true }))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Accept connections, answer 200 and forward `(request line, body)`.
    async fn spawn_recorder() -> (String, mpsc::UnboundedReceiver<(String, Value)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let header_end = loop {
                        let n = socket.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                    };
                    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                    let content_length = head
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    while buf.len() < header_end + content_length {
                        let n = socket.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }
                    let body: Value =
                        serde_json::from_slice(&buf[header_end..header_end + content_length])
                            .unwrap_or(Value::Null);
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        )
                        .await
                        .unwrap();
                    let _ = tx.send((request_line, body));
                });
            }
        });

        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_start_requires_endpoint() {
        let config = TrackerConfig {
            enabled: true,
            endpoint: None,
            ..TrackerConfig::default()
        };
        let result = HttpTracker::start(&config, &json!({})).await;
        assert!(matches!(result, Err(TrackerError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_start_registers_run_with_config() {
        let (endpoint, mut rx) = spawn_recorder().await;
        let config = TrackerConfig::new(&endpoint).with_run_name("round-eval");

        let tracker = HttpTracker::start(&config, &json!({ "dataset": "mold" }))
            .await
            .unwrap();

        let (line, body) = rx.recv().await.unwrap();
        assert!(line.starts_with("POST /api/runs "));
        assert_eq!(body["run"]["project"], "Voxel Morph");
        assert_eq!(body["run"]["name"], "round-eval");
        assert_eq!(body["config"]["dataset"], "mold");
        assert!(!tracker.is_sweep());
    }

    #[tokio::test]
    async fn test_sweep_run_leaves_identity_to_agent() {
        let (endpoint, mut rx) = spawn_recorder().await;
        let config = TrackerConfig::new(&endpoint).in_sweep();

        let tracker = HttpTracker::start(&config, &json!({ "dataset": "mold" }))
            .await
            .unwrap();

        let (_, body) = rx.recv().await.unwrap();
        assert!(body["run"]["project"].is_null());
        assert!(body["config"].is_null());
        assert_eq!(body["run"]["allow_val_change"], true);
        assert!(tracker.is_sweep());
        assert!(tracker.run().name.is_none());
    }

    #[tokio::test]
    async fn test_log_step_posts_to_run_log() {
        let (endpoint, mut rx) = spawn_recorder().await;
        let tracker = HttpTracker::start(&TrackerConfig::new(&endpoint), &json!({}))
            .await
            .unwrap();
        let _ = rx.recv().await.unwrap();

        let scalars = ScalarMap::from([("Subject raw MSE".to_string(), 10.0)]);
        tracker.log_step(4, &scalars).await;

        let (line, body) = rx.recv().await.unwrap();
        let expected = format!("POST /api/runs/{}/log ", tracker.run().run_id);
        assert!(line.starts_with(&expected), "unexpected request line {line}");
        assert_eq!(body["kind"], "step");
        assert_eq!(body["payload"]["step"], 4);
        assert_eq!(body["payload"]["scalars"]["Subject raw MSE"], 10.0);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn test_unreachable_service_drops_events_without_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let before = dropped_events();
        let tracker = HttpTracker::start(&TrackerConfig::new(&endpoint), &json!({}))
            .await
            .unwrap();
        tracker.log_epoch(1, &ScalarMap::new()).await;
        tracker
            .log_video(Path::new("/nonexistent/registration.gif"), "gif", 4)
            .await;

        assert!(dropped_events() >= before + 3);
        assert!(logs_contain("tracker.dropped"));
    }
}
