//! Shallow repository cloning into a build workspace.

use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, RemoteCallbacks};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Username GitHub expects alongside an installation token.
const TOKEN_USERNAME: &str = "x-access-token";

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("failed to clone repository: {0}")]
    Git(String),

    #[error("clone task was aborted")]
    Aborted,
}

/// Shallow-clones a single branch of `git_url` into `target`, authenticating
/// with a short-lived installation token as the password.
///
/// libgit2 work is blocking, so the clone runs on the blocking pool; the
/// caller bounds it with the per-build deadline.
pub async fn clone_branch(
    git_url: &str,
    branch: &str,
    target: &Path,
    token: &str,
) -> Result<(), CloneError> {
    let git_url = git_url.to_string();
    let branch = branch.to_string();
    let target = target.to_path_buf();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext(TOKEN_USERNAME, &token)
        });

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);
        fetch.depth(1);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch);
        if !branch.is_empty() {
            builder.branch(&branch);
        }

        info!(url = %git_url, branch = %branch, "cloning repository");
        builder
            .clone(&git_url, &target)
            .map(|_| ())
            .map_err(|e| CloneError::Git(e.message().to_string()))
    })
    .await
    .map_err(|_| CloneError::Aborted)?
}
