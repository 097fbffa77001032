//! The per-build state machine.
//!
//! One invocation of [`Orchestrator::handle`] takes a parsed build job
//! from quota resolution all the way to a terminal status. Phases run
//! under a hard deadline taken from the quota envelope; expiry cancels
//! whatever is in flight and records `timeout`. The cleanup chain
//! (artifact upload, workspace removal, engine pruning, slot release)
//! runs on every exit path and can never override the terminal status.

use crate::broker::LogBroker;
use crate::config::WorkerConfig;
use crate::credentials::CredentialFetcher;
use crate::detect;
use crate::envfile;
use crate::envfile::validate::EnvValidation;
use crate::error::BuildError;
use crate::executor::{BuildEngine, EngineError};
use crate::gitclone;
use crate::limits::RateLimiter;
use crate::model::{BuildJob, BuildStatus, LogLevel, QuotaEnvelope, SandboxEnvelope};
use crate::objects::ArtifactStore;
use crate::quota::QuotaResolver;
use crate::recipe;
use crate::reporter::Reporter;
use crate::store::BuildStore;
use crate::workspace::Workspace;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// What the consumer should do with the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Build reached `completed`; acknowledge.
    Ack,
    /// Terminal failure, rejection or timeout; negative-acknowledge
    /// without requeue.
    Reject,
}

pub struct Orchestrator {
    config: Arc<WorkerConfig>,
    store: BuildStore,
    broker: LogBroker,
    quotas: QuotaResolver,
    limiter: RateLimiter,
    credentials: CredentialFetcher,
    engine: BuildEngine,
    objects: ArtifactStore,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<WorkerConfig>,
        store: BuildStore,
        broker: LogBroker,
        limiter: RateLimiter,
        credentials: CredentialFetcher,
        engine: BuildEngine,
        objects: ArtifactStore,
    ) -> Self {
        let quotas = QuotaResolver::new(store.clone());
        Self {
            config,
            store,
            broker,
            quotas,
            limiter,
            credentials,
            engine,
            objects,
        }
    }

    pub fn broker(&self) -> &LogBroker {
        &self.broker
    }

    /// Runs one build to a terminal status and returns the delivery
    /// disposition.
    pub async fn handle(&self, job: BuildJob) -> Disposition {
        let reporter = Reporter::new(&job.build_id, self.broker.clone(), self.store.clone());
        let started = Instant::now();

        info!(build_id = %job.build_id, project_id = %job.project_id, "starting build");
        reporter.status(BuildStatus::Queued, "Build queued").await;

        let quota = self.quotas.resolve(&job.project_id).await;

        match self.limiter.reserve(&job.project_id, &quota).await {
            Ok(Ok(())) => {}
            Ok(Err(denial)) => {
                reporter
                    .log(LogLevel::Error, &format!("Build rejected: {}", denial))
                    .await;
                self.finish(
                    &reporter,
                    started,
                    BuildStatus::Rejected,
                    Some(&denial.to_string()),
                    "Build rejected",
                    None,
                )
                .await;
                return Disposition::Reject;
            }
            Err(e) => {
                error!(build_id = %job.build_id, error = %e, "rate limiter unavailable");
                reporter
                    .log(LogLevel::Error, "Build rejected: rate limiter unavailable")
                    .await;
                self.finish(
                    &reporter,
                    started,
                    BuildStatus::Rejected,
                    Some("rate limiter unavailable"),
                    "Build rejected",
                    None,
                )
                .await;
                return Disposition::Reject;
            }
        }

        reporter
            .log(
                LogLevel::Info,
                &format!(
                    "Starting build (tier: {}, timeout: {}s)",
                    quota.plan,
                    quota.max_build_duration.as_secs()
                ),
            )
            .await;

        let outcome = tokio::time::timeout(
            quota.max_build_duration,
            self.run_phases(&job, &quota, &reporter),
        )
        .await;

        self.cleanup(&job).await;
        self.limiter.release(&job.project_id).await;

        match outcome {
            Ok(Ok(image_tags)) => {
                let elapsed = started.elapsed().as_secs();
                reporter
                    .log(
                        LogLevel::Success,
                        &format!(
                            "Build completed successfully with {} service(s) in {}m {}s",
                            image_tags.len(),
                            elapsed / 60,
                            elapsed % 60
                        ),
                    )
                    .await;
                self.finish(
                    &reporter,
                    started,
                    BuildStatus::Completed,
                    None,
                    "Build completed successfully",
                    Some(image_tags.as_slice()),
                )
                .await;
                Disposition::Ack
            }
            Ok(Err(build_error)) => {
                let message = build_error.to_string();
                reporter.log(LogLevel::Error, &message).await;
                self.emit_troubleshooting(&reporter, &build_error).await;
                self.finish(
                    &reporter,
                    started,
                    BuildStatus::Failed,
                    Some(&message),
                    "Build failed",
                    None,
                )
                .await;
                Disposition::Reject
            }
            Err(_elapsed) => {
                let limit = quota.max_build_duration.as_secs();
                reporter
                    .log(
                        LogLevel::Error,
                        &format!("Build exceeded time limit of {}s", limit),
                    )
                    .await;
                self.finish(
                    &reporter,
                    started,
                    BuildStatus::Timeout,
                    Some(&format!("Build exceeded {}s limit", limit)),
                    "Build timeout",
                    None,
                )
                .await;
                Disposition::Reject
            }
        }
    }

    /// The sequential build phases. Runs inside the deadline; any error
    /// terminates the build as `failed`.
    async fn run_phases(
        &self,
        job: &BuildJob,
        quota: &QuotaEnvelope,
        reporter: &Reporter,
    ) -> Result<Vec<String>, BuildError> {
        // running
        reporter.status(BuildStatus::Running, "Build started").await;
        self.store.mark_started(&job.build_id).await;

        // The store is the source of truth for the repository URL; the
        // copy on the bus payload is never trusted.
        let git_url = self
            .store
            .project_git_url(&job.project_id)
            .await?
            .ok_or_else(|| BuildError::ProjectNotFound(job.project_id.clone()))?;

        // cloning
        reporter
            .status(BuildStatus::Cloning, "Cloning repository")
            .await;

        let token = match self.credentials.project_token(&job.project_id).await {
            Ok(Some(token)) => {
                reporter
                    .log(LogLevel::Info, "Using version-control integration token")
                    .await;
                token
            }
            Ok(None) => {
                reporter
                    .log(LogLevel::Warn, "No version-control integration found")
                    .await;
                return Err(BuildError::MissingIntegration);
            }
            Err(e) => {
                warn!(build_id = %job.build_id, error = %e, "credential service unavailable");
                reporter
                    .log(LogLevel::Warn, "No version-control integration found")
                    .await;
                return Err(BuildError::MissingIntegration);
            }
        };

        let workspace = Workspace::prepare(&self.config.build_root, &job.build_id)
            .map_err(|e| BuildError::Other(format!("failed to prepare workspace: {}", e)))?;

        gitclone::clone_branch(&git_url, &job.branch, workspace.path(), &token)
            .await
            .map_err(|e| BuildError::Clone(e.to_string()))?;
        reporter
            .log(LogLevel::Success, "Repository cloned successfully")
            .await;

        let build_size = workspace.size_bytes();
        if build_size > quota.max_build_size {
            return Err(BuildError::ContextTooLarge {
                size_mb: build_size / (1024 * 1024),
                limit_mb: quota.max_build_size / (1024 * 1024),
            });
        }

        // installing: detection
        reporter
            .status(BuildStatus::Installing, "Detecting frameworks")
            .await;

        let detection = detect::detect_services(workspace.path()).map_err(|e| match e {
            detect::DetectError::NoBuildableService => BuildError::NoBuildableService,
            detect::DetectError::Io(io) => BuildError::Other(io.to_string()),
        })?;

        if detection.is_monorepo {
            reporter
                .log(
                    LogLevel::Info,
                    &format!(
                        "Detected monorepo with {} services",
                        detection.frameworks.len()
                    ),
                )
                .await;
            for framework in &detection.frameworks {
                reporter
                    .log(
                        LogLevel::Info,
                        &format!("  - {} in {}/", framework.name, framework.path),
                    )
                    .await;
            }
        } else {
            reporter
                .log(
                    LogLevel::Info,
                    &format!("Detected framework: {}", detection.frameworks[0].name),
                )
                .await;
        }

        let metadata = serde_json::json!({
            "frameworks": detection.frameworks,
            "isMonorepo": detection.is_monorepo,
            "plan": quota.plan,
            "buildSize": build_size,
            "quota": {
                "maxServices": quota.max_services,
                "maxBuildSize": quota.max_build_size,
                "maxBuildDurationSecs": quota.max_build_duration.as_secs(),
                "cpuCores": quota.cpu_cores,
                "memoryGB": quota.memory_gb,
            },
        });
        self.store.set_metadata(&job.build_id, &metadata).await;

        // installing: environment
        self.resolve_environment(job, &detection, &workspace, reporter)
            .await?;

        // building
        reporter
            .status(BuildStatus::Building, "Building container images")
            .await;
        reporter
            .log(
                LogLevel::Info,
                &format!(
                    "Build resources: {} CPU cores, {} GB RAM",
                    quota.cpu_cores, quota.memory_gb
                ),
            )
            .await;

        if detection.is_monorepo {
            recipe::write_composition(
                workspace.path(),
                &detection,
                &self.config.registry_namespace,
                &job.project_id,
                &job.build_id,
            )
            .map_err(|e| BuildError::Composition(e.to_string()))?;
            reporter
                .log(LogLevel::Info, "Generated composition manifest and README")
                .await;
        }

        let sandbox = SandboxEnvelope::for_quota(quota);
        let mut image_tags = Vec::with_capacity(detection.frameworks.len());

        for framework in &detection.frameworks {
            let service_dir = if framework.path == "." {
                workspace.path().to_path_buf()
            } else {
                workspace.path().join(&framework.path)
            };
            let service = framework.service_name();

            match recipe::ensure_dockerfile(framework, &service_dir).map_err(|e| {
                BuildError::Recipe {
                    service: service.clone(),
                    reason: e.to_string(),
                }
            })? {
                recipe::RecipeOutcome::Generated => {
                    reporter
                        .log(
                            LogLevel::Success,
                            &format!("Generated Dockerfile for {} in {}/", framework.name, framework.path),
                        )
                        .await;
                }
                recipe::RecipeOutcome::AlreadyPresent => {
                    reporter
                        .log(
                            LogLevel::Info,
                            &format!(
                                "Using existing Dockerfile for {} in {}/",
                                framework.name, framework.path
                            ),
                        )
                        .await;
                }
            }

            let image_tag = framework.image_tag(
                &self.config.registry_namespace,
                &job.project_id,
                &job.build_id,
            );
            reporter
                .log(
                    LogLevel::Info,
                    &format!("Building image for {}: {}", framework.name, image_tag),
                )
                .await;

            self.engine
                .build_image(&service_dir, &image_tag, &sandbox, reporter)
                .await
                .map_err(|e| match e {
                    EngineError::CriticalBuildError(reason)
                    | EngineError::Engine(reason)
                    | EngineError::Archive(reason) => BuildError::EngineBuild {
                        service: service.clone(),
                        reason,
                    },
                    EngineError::Push(reason) => BuildError::Push {
                        service: service.clone(),
                        reason,
                    },
                })?;
            reporter
                .log(
                    LogLevel::Success,
                    &format!("Image built successfully for {}", framework.name),
                )
                .await;

            reporter
                .log(
                    LogLevel::Info,
                    &format!("Pushing image for {}...", framework.name),
                )
                .await;
            self.engine
                .push_image(&image_tag)
                .await
                .map_err(|e| BuildError::Push {
                    service: service.clone(),
                    reason: e.to_string(),
                })?;
            reporter
                .log(
                    LogLevel::Success,
                    &format!("Image pushed successfully for {}", framework.name),
                )
                .await;

            image_tags.push(image_tag);
        }

        Ok(image_tags)
    }

    /// Fetches, decrypts and writes env files, then validates required
    /// variables for Next.js services. Validation failures only fail the
    /// build when the project actually uploaded env records.
    async fn resolve_environment(
        &self,
        job: &BuildJob,
        detection: &detect::DetectionResult,
        workspace: &Workspace,
        reporter: &Reporter,
    ) -> Result<(), BuildError> {
        let records = match self.store.env_records(&job.project_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(build_id = %job.build_id, error = %e, "failed to fetch env records");
                reporter
                    .log(LogLevel::Warn, "No environment configurations found")
                    .await;
                Vec::new()
            }
        };

        let strict = !records.is_empty();
        if strict {
            let configs =
                envfile::decrypt_records(&records, &self.config.env_encryption_key);
            reporter
                .log(
                    LogLevel::Info,
                    &format!("Loaded {} environment configuration(s)", configs.len()),
                )
                .await;

            let outcome =
                envfile::write_env_files(workspace.path(), &configs, &detection.frameworks)
                    .map_err(|e| {
                        BuildError::Other(format!("failed to write env files: {}", e))
                    })?;
            for (service, path) in &outcome.written {
                reporter
                    .log(
                        LogLevel::Success,
                        &format!("Written .env for {} to {}", service, path.display()),
                    )
                    .await;
            }
            for service in &outcome.skipped {
                reporter
                    .log(
                        LogLevel::Warn,
                        &format!("No matching service found for env config: {}", service),
                    )
                    .await;
            }
        } else {
            reporter
                .log(LogLevel::Warn, "No environment configurations uploaded")
                .await;
        }

        reporter
            .log(LogLevel::Info, "Validating environment variables...")
            .await;
        for framework in &detection.frameworks {
            if framework.kind != detect::FrameworkKind::NextJs {
                continue;
            }
            let service_dir = if framework.path == "." {
                workspace.path().to_path_buf()
            } else {
                workspace.path().join(&framework.path)
            };

            match envfile::validate::validate_service(&service_dir) {
                EnvValidation::Satisfied { required } => {
                    reporter
                        .log(
                            LogLevel::Success,
                            &format!(
                                "All {} required environment variable(s) are configured",
                                required.len()
                            ),
                        )
                        .await;
                }
                EnvValidation::Undetermined => {
                    reporter
                        .log(
                            LogLevel::Info,
                            "Could not detect required environment variables",
                        )
                        .await;
                }
                EnvValidation::Missing(missing) => {
                    reporter
                        .log(LogLevel::Error, "Missing required environment variables:")
                        .await;
                    for variable in &missing {
                        reporter
                            .log(LogLevel::Error, &format!("   {}", variable))
                            .await;
                    }
                    if strict {
                        reporter
                            .log(
                                LogLevel::Info,
                                "Add these variables to your environment configuration in the dashboard",
                            )
                            .await;
                        return Err(BuildError::MissingEnvVars(missing));
                    }
                    reporter
                        .log(
                            LogLevel::Warn,
                            "BUILD WARNING: application may require environment variables",
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Best-effort cleanup chain; never affects the terminal status.
    async fn cleanup(&self, job: &BuildJob) {
        let workspace_path = Workspace::path_for(&self.config.build_root, &job.build_id);
        if workspace_path.exists() {
            self.objects
                .upload_build_artifacts(&workspace_path, &job.project_id, &job.build_id)
                .await;
            if let Err(e) = std::fs::remove_dir_all(&workspace_path) {
                warn!(build_id = %job.build_id, error = %e, "failed to remove workspace");
            }
        }

        if tokio::time::timeout(CLEANUP_TIMEOUT, self.engine.prune_artifacts())
            .await
            .is_err()
        {
            warn!(build_id = %job.build_id, "engine cleanup timed out");
        }
    }

    /// Records the terminal state and emits exactly one terminal status
    /// event followed by the subscriber-closing complete event.
    async fn finish(
        &self,
        reporter: &Reporter,
        started: Instant,
        status: BuildStatus,
        error_message: Option<&str>,
        status_message: &str,
        image_tags: Option<&[String]>,
    ) {
        let elapsed = started.elapsed().as_secs() as i64;
        self.store
            .mark_terminal(
                reporter.build_id(),
                status,
                error_message,
                elapsed,
                image_tags,
            )
            .await;
        self.broker
            .publish_status(reporter.build_id(), status, status_message)
            .await;
        self.broker
            .publish_build_complete(reporter.build_id(), status)
            .await;
    }

    /// Extra guidance for the failure modes users hit most.
    async fn emit_troubleshooting(&self, reporter: &Reporter, error: &BuildError) {
        if let BuildError::EngineBuild { reason, .. } = error {
            if reason.contains("npm run build") || reason.contains("prerender") {
                reporter.log(LogLevel::Info, "Troubleshooting tips:").await;
                reporter
                    .log(
                        LogLevel::Info,
                        "   Verify all required environment variables are configured",
                    )
                    .await;
                reporter
                    .log(
                        LogLevel::Info,
                        "   Check that NEXT_PUBLIC_* variables are set for client-side code",
                    )
                    .await;
            }
        }
    }
}
