//! Relational store operations.
//!
//! The worker owns the write path of `builds` for the builds it executes
//! and appends to `build_logs`; everything else is read-only lookups.

use crate::model::{BuildStatus, LogLevel};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;

/// One encrypted env record as stored by the control plane.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnvRecord {
    pub service_name: String,
    pub env_content: String,
}

#[derive(Clone)]
pub struct BuildStore {
    pool: PgPool,
}

impl BuildStore {
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a non-terminal status transition.
    pub async fn set_status(&self, build_id: &str, status: BuildStatus) {
        let result = sqlx::query("UPDATE builds SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(build_id)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(build_id, error = %e, "failed to persist status transition");
        }
    }

    /// Marks the build running and stamps `started_at`.
    pub async fn mark_started(&self, build_id: &str) {
        let result = sqlx::query(
            "UPDATE builds SET status = 'running', started_at = NOW() WHERE id = $1",
        )
        .bind(build_id)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!(build_id, error = %e, "failed to mark build started");
        }
    }

    /// Records a terminal transition. Elapsed seconds and `completed_at`
    /// are always written; image tags only accompany `completed`.
    pub async fn mark_terminal(
        &self,
        build_id: &str,
        status: BuildStatus,
        error_message: Option<&str>,
        build_time_seconds: i64,
        image_tags: Option<&[String]>,
    ) {
        debug_assert!(status.is_terminal());
        let tags_json = image_tags.map(|tags| serde_json::json!(tags));
        let result = sqlx::query(
            "UPDATE builds
             SET status = $2,
                 error_message = $3,
                 build_time_seconds = $4,
                 image_tags = COALESCE($5, image_tags),
                 completed_at = NOW()
             WHERE id = $1",
        )
        .bind(build_id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(build_time_seconds)
        .bind(tags_json)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!(build_id, error = %e, "failed to persist terminal status");
        }
    }

    /// Attaches detection and quota metadata to the build record.
    pub async fn set_metadata(&self, build_id: &str, metadata: &serde_json::Value) {
        let result = sqlx::query("UPDATE builds SET metadata = $1 WHERE id = $2")
            .bind(metadata)
            .bind(build_id)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(build_id, error = %e, "failed to persist build metadata");
        }
    }

    /// Appends one durable log row. Best effort; the live stream is the
    /// primary delivery path.
    pub async fn insert_log(&self, build_id: &str, level: LogLevel, message: &str) {
        let result = sqlx::query(
            "INSERT INTO build_logs (build_id, log_type, message, created_at)
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(build_id)
        .bind(level.as_str())
        .bind(message)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!(build_id, error = %e, "failed to insert log row");
        }
    }

    pub async fn project_git_url(&self, project_id: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT git_repo_url FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// All encrypted env records for a project, stable by service name.
    pub async fn env_records(&self, project_id: &str) -> Result<Vec<EnvRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT service_name, env_content
             FROM project_env_configs
             WHERE project_id = $1
             ORDER BY service_name",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Projects the active subscription plan id for a project, walking
    /// the project/company/subscription chain.
    pub async fn plan_id(&self, project_id: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT sp.id
             FROM projects p
             JOIN companies c ON c.id = p.company_id
             JOIN subscriptions s ON s.company_id = c.id
             JOIN subscription_plans sp ON sp.id = s.plan_id
             WHERE p.id = $1
               AND s.status = 'active'
             LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}
