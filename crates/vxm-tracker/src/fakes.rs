//! In-memory sink (testing only)
//!
//! `MemorySink` records every event it receives so tests can assert on what a
//! run reported without a tracking service.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::sink::{MediaRef, MetricsSink, ScalarMap, TablePayload, WatchTarget};

/// One event received by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Step { step: u64, scalars: ScalarMap },
    Epoch { epoch: u64, scalars: ScalarMap },
    Image { step: u64, image: MediaRef, label: String },
    Video { path: PathBuf, label: String, fps: u32 },
    Table { table: TablePayload, label: String },
    Watch(WatchTarget),
    Config(serde_json::Value),
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Tables logged under `label`.
    pub fn tables(&self, label: &str) -> Vec<TablePayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Table { table, label: l } if l == label => Some(table),
                _ => None,
            })
            .collect()
    }

    /// Step events in arrival order.
    pub fn steps(&self) -> Vec<(u64, ScalarMap)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Step { step, scalars } => Some((step, scalars)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl MetricsSink for MemorySink {
    async fn log_step(&self, step: u64, scalars: &ScalarMap) {
        self.push(SinkEvent::Step {
            step,
            scalars: scalars.clone(),
        });
    }

    async fn log_epoch(&self, epoch: u64, scalars: &ScalarMap) {
        self.push(SinkEvent::Epoch {
            epoch,
            scalars: scalars.clone(),
        });
    }

    async fn log_image(&self, step: u64, image: &MediaRef, label: &str) {
        self.push(SinkEvent::Image {
            step,
            image: image.clone(),
            label: label.to_string(),
        });
    }

    async fn log_video(&self, path: &Path, label: &str, fps: u32) {
        self.push(SinkEvent::Video {
            path: path.to_path_buf(),
            label: label.to_string(),
            fps,
        });
    }

    async fn log_table(&self, table: &TablePayload, label: &str) {
        self.push(SinkEvent::Table {
            table: table.clone(),
            label: label.to_string(),
        });
    }

    async fn watch(&self, target: &WatchTarget) {
        self.push(SinkEvent::Watch(target.clone()));
    }

    async fn log_config(&self, config: &serde_json::Value) {
        self.push(SinkEvent::Config(config.clone()));
    }
}
