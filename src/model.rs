//! Core data types shared across the worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One build request as delivered on the message bus. Immutable.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildJob {
    #[serde(rename = "buildId")]
    pub build_id: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub branch: String,
    /// Carried on the bus payload but never trusted; the orchestrator
    /// always resolves the URL from the project row.
    #[serde(rename = "git_repo_url", default)]
    pub git_repo_url: Option<String>,
}

/// Lifecycle states of a build record.
///
/// Transitions only ever advance: `queued → running → cloning → installing
/// → building` and from any non-terminal state into exactly one of the
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Queued,
    Running,
    Cloning,
    Installing,
    Building,
    Completed,
    Failed,
    Timeout,
    Rejected,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Queued => "queued",
            BuildStatus::Running => "running",
            BuildStatus::Cloning => "cloning",
            BuildStatus::Installing => "installing",
            BuildStatus::Building => "building",
            BuildStatus::Completed => "completed",
            BuildStatus::Failed => "failed",
            BuildStatus::Timeout => "timeout",
            BuildStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Completed
                | BuildStatus::Failed
                | BuildStatus::Timeout
                | BuildStatus::Rejected
        )
    }

    /// Terminal name as seen by stream subscribers. `completed` is
    /// normalised to `success` on the wire.
    pub fn terminal_label(&self) -> &'static str {
        match self {
            BuildStatus::Completed => "success",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a streamed build log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Event delivered to live-log subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildEvent {
    Connected {
        #[serde(rename = "buildId")]
        build_id: String,
        message: String,
    },
    Log {
        #[serde(rename = "buildId")]
        build_id: String,
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Status {
        #[serde(rename = "buildId")]
        build_id: String,
        status: BuildStatus,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    Complete {
        #[serde(rename = "buildId")]
        build_id: String,
        status: String,
        timestamp: DateTime<Utc>,
    },
}

/// Resource envelope derived from a project's subscription tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaEnvelope {
    pub plan: String,
    pub max_concurrent_builds: u32,
    pub max_builds_per_hour: u32,
    pub max_builds_per_day: u32,
    pub max_build_duration: Duration,
    pub max_build_size: u64,
    pub max_services: u32,
    pub cpu_cores: u32,
    pub memory_gb: u32,
}

/// CPU, memory, pid and network parameters handed to the container engine
/// for one build.
#[derive(Debug, Clone)]
pub struct SandboxEnvelope {
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub memory_limit: i64,
    pub pids_limit: i64,
    pub no_new_privileges: bool,
    pub network_mode: String,
}

impl SandboxEnvelope {
    pub const CPU_PERIOD: i64 = 100_000;

    pub fn for_quota(quota: &QuotaEnvelope) -> Self {
        Self {
            cpu_quota: i64::from(quota.cpu_cores) * Self::CPU_PERIOD,
            cpu_period: Self::CPU_PERIOD,
            memory_limit: i64::from(quota.memory_gb) * 1024 * 1024 * 1024,
            pids_limit: 512,
            no_new_privileges: true,
            network_mode: "bridge".to_string(),
        }
    }
}
