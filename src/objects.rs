//! Object-store upload of generated build artifacts.
//!
//! After every build, whatever synthesis produced is preserved under
//! `builds/<projectId>/<buildId>/`: the composition manifest, the README
//! and each generated Dockerfile at its service-relative path. Uploads
//! are best effort and never affect the build outcome.

use crate::config::ObjectStoreConfig;
use crate::recipe::{COMPOSE_FILE, README_FILE};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Clone)]
pub struct ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ArtifactStore {
    pub fn new(config: &ObjectStoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "worker-config",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Uploads the workspace's generated artifacts. Missing files are
    /// skipped silently; failed uploads are logged and swallowed.
    pub async fn upload_build_artifacts(
        &self,
        workspace: &Path,
        project_id: &str,
        build_id: &str,
    ) {
        let prefix = format!("builds/{}/{}", project_id, build_id);

        for name in [COMPOSE_FILE, README_FILE] {
            let path = workspace.join(name);
            if path.is_file() {
                self.put_file(&path, &format!("{}/{}", prefix, name)).await;
            }
        }

        for entry in WalkDir::new(workspace)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() == "Dockerfile")
        {
            if let Ok(relative) = entry.path().strip_prefix(workspace) {
                let key = format!("{}/{}", prefix, relative.display());
                self.put_file(entry.path(), &key).await;
            }
        }
    }

    async fn put_file(&self, path: &Path, key: &str) {
        let body = match ByteStream::from_path(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read artifact");
                return;
            }
        };

        match self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
        {
            Ok(_) => debug!(key, "artifact uploaded"),
            Err(e) => warn!(key, error = %e, "artifact upload failed"),
        }
    }
}
