//! Per-build fan-out of log lines and status transitions.
//!
//! Every streamed line goes to two places: the live broker and the
//! durable `build_logs` table. The two writes are independent and both
//! are always attempted.

use crate::broker::LogBroker;
use crate::model::{BuildStatus, LogLevel};
use crate::store::BuildStore;
use tracing::info;

#[derive(Clone)]
pub struct Reporter {
    build_id: String,
    broker: LogBroker,
    store: BuildStore,
}

impl Reporter {
    pub fn new(build_id: &str, broker: LogBroker, store: BuildStore) -> Self {
        Self {
            build_id: build_id.to_string(),
            broker,
            store,
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Streams one log line to subscribers and appends the durable row.
    pub async fn log(&self, level: LogLevel, message: &str) {
        info!(build_id = %self.build_id, "{}", message);
        self.broker.publish_log(&self.build_id, level, message).await;
        self.store.insert_log(&self.build_id, level, message).await;
    }

    /// Streams a non-terminal status transition and records it on the
    /// build row. Terminal transitions go through the orchestrator's
    /// terminal path instead.
    pub async fn status(&self, status: BuildStatus, message: &str) {
        info!(build_id = %self.build_id, status = %status, "{}", message);
        self.broker
            .publish_status(&self.build_id, status, message)
            .await;
        if !status.is_terminal() {
            self.store.set_status(&self.build_id, status).await;
        }
    }
}
