//! Container-engine driver: context archiving, sandboxed builds, image
//! push and artefact pruning.

pub mod policy;

use crate::model::{LogLevel, SandboxEnvelope};
use crate::reporter::Reporter;
use bollard::auth::DockerCredentials;
use bollard::container::PruneContainersOptions;
use bollard::image::{BuildImageOptions, PruneImagesOptions, PushImageOptions};
use bollard::Docker;
use futures_util::StreamExt;
use policy::CriticalErrorPolicy;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_BACKOFF: Duration = Duration::from_secs(2);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Engine(String),

    #[error("{0}")]
    CriticalBuildError(String),

    #[error("{0}")]
    Push(String),

    #[error("failed to archive build context: {0}")]
    Archive(String),
}

/// Shared client for the container engine. Connections are pooled inside
/// the underlying client, so one instance serves every concurrent build.
#[derive(Clone)]
pub struct BuildEngine {
    docker: Docker,
    registry_username: String,
    registry_password: String,
    policy: CriticalErrorPolicy,
}

impl BuildEngine {
    /// Connects to the local engine socket, retrying while the daemon
    /// comes up.
    pub async fn connect(
        registry_username: &str,
        registry_password: &str,
    ) -> Result<Self, EngineError> {
        let mut last_error = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            match Docker::connect_with_local_defaults() {
                Ok(docker) => {
                    let ping = tokio::time::timeout(PING_TIMEOUT, docker.ping()).await;
                    match ping {
                        Ok(Ok(_)) => {
                            info!("connected to container engine");
                            return Ok(Self {
                                docker,
                                registry_username: registry_username.to_string(),
                                registry_password: registry_password.to_string(),
                                policy: CriticalErrorPolicy::default(),
                            });
                        }
                        Ok(Err(e)) => last_error = e.to_string(),
                        Err(_) => last_error = "engine ping timed out".to_string(),
                    }
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt < CONNECT_ATTEMPTS {
                debug!(attempt, error = %last_error, "waiting for container engine");
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
        }
        Err(EngineError::Engine(format!(
            "failed to reach container engine after {} attempts: {}",
            CONNECT_ATTEMPTS, last_error
        )))
    }

    /// Builds one image from `service_dir` under the sandbox envelope,
    /// forwarding output lines to the reporter. Returns an error only for
    /// transport failures or output matching the critical-error policy.
    pub async fn build_image(
        &self,
        service_dir: &Path,
        image_tag: &str,
        sandbox: &SandboxEnvelope,
        reporter: &Reporter,
    ) -> Result<(), EngineError> {
        let context = archive_context(service_dir).await?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: image_tag.to_string(),
            rm: true,
            forcerm: true,
            nocache: false,
            platform: "linux/amd64".to_string(),
            memory: Some(sandbox.memory_limit as u64),
            memswap: Some(sandbox.memory_limit),
            cpuperiod: Some(sandbox.cpu_period as u64),
            cpuquota: Some(sandbox.cpu_quota as u64),
            networkmode: sandbox.network_mode.clone(),
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(context.into()));

        let mut critical = false;
        let mut last_error = String::new();

        while let Some(message) = stream.next().await {
            let event = match message {
                Ok(event) => event,
                Err(e) => return Err(EngineError::Engine(e.to_string())),
            };

            if let Some(text) = event.stream.as_deref() {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    reporter.log(LogLevel::Info, line).await;

                    if self.policy.is_noise(line) {
                        continue;
                    }
                    if self.policy.is_prerender_failure(line) {
                        reporter
                            .log(
                                LogLevel::Warn,
                                "Prerender error detected, check environment variables",
                            )
                            .await;
                        critical = true;
                        last_error = line.to_string();
                    }
                }
            }

            let error_message = event
                .error
                .clone()
                .or_else(|| event.error_detail.as_ref().and_then(|d| d.message.clone()));
            if let Some(error_message) = error_message {
                reporter.log(LogLevel::Error, &error_message).await;
                if self.policy.is_critical(&error_message) {
                    critical = true;
                    last_error = error_message;
                }
            }
        }

        if critical {
            return Err(EngineError::CriticalBuildError(last_error));
        }
        Ok(())
    }

    /// Pushes an image using the configured registry credentials.
    pub async fn push_image(&self, image_tag: &str) -> Result<(), EngineError> {
        let credentials = DockerCredentials {
            username: Some(self.registry_username.clone()),
            password: Some(self.registry_password.clone()),
            ..Default::default()
        };

        let mut stream = self.docker.push_image(
            image_tag,
            None::<PushImageOptions<String>>,
            Some(credentials),
        );

        while let Some(message) = stream.next().await {
            let info = message.map_err(|e| EngineError::Push(e.to_string()))?;
            if let Some(error) = info.error {
                return Err(EngineError::Push(error));
            }
        }
        Ok(())
    }

    /// Prunes dangling images and stopped containers left behind by the
    /// build. Best effort.
    pub async fn prune_artifacts(&self) {
        let mut reclaimed: u64 = 0;

        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);
        match self
            .docker
            .prune_images(Some(PruneImagesOptions { filters }))
            .await
        {
            Ok(report) => reclaimed += report.space_reclaimed.unwrap_or(0) as u64,
            Err(e) => warn!(error = %e, "failed to prune dangling images"),
        }

        match self
            .docker
            .prune_containers(None::<PruneContainersOptions<String>>)
            .await
        {
            Ok(report) => reclaimed += report.space_reclaimed.unwrap_or(0) as u64,
            Err(e) => warn!(error = %e, "failed to prune stopped containers"),
        }

        if reclaimed > 0 {
            info!(reclaimed_mb = reclaimed / (1024 * 1024), "engine artefacts pruned");
        }
    }
}

/// Archives a service directory into an in-memory tar for the engine.
async fn archive_context(service_dir: &Path) -> Result<Vec<u8>, EngineError> {
    let dir = service_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append_dir_all(".", &dir)
            .map_err(|e| EngineError::Archive(e.to_string()))?;
        builder
            .into_inner()
            .map_err(|e| EngineError::Archive(e.to_string()))
    })
    .await
    .map_err(|e| EngineError::Archive(e.to_string()))?
}
