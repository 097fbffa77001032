//! Error taxonomy for the build worker.
//!
//! Build-phase errors terminate a single build as `failed` and carry the
//! user-visible cause that lands in `error_message`. Infrastructure
//! errors are retried at the call site; startup wiring reports its typed
//! errors and exits directly.

use thiserror::Error;

/// An error that terminates one build with a `failed` status.
///
/// The `Display` output is what end users read, so every variant renders
/// an actionable sentence.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("no version-control integration configured for this project")]
    MissingIntegration,

    #[error("failed to clone repository: {0}")]
    Clone(String),

    #[error("build context size ({size_mb} MB) exceeds limit ({limit_mb} MB)")]
    ContextTooLarge { size_mb: u64, limit_mb: u64 },

    #[error("no buildable service found")]
    NoBuildableService,

    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("failed to generate build recipe for {service}: {reason}")]
    Recipe { service: String, reason: String },

    #[error("failed to generate service composition: {0}")]
    Composition(String),

    #[error("container build failed for {service}: {reason}")]
    EngineBuild { service: String, reason: String },

    #[error("image push failed for {service}: {reason}")]
    Push { service: String, reason: String },

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

/// A rate-limit reservation that was denied. The reservation is fully
/// reverted before this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitDenial {
    #[error("concurrent build limit reached ({0} builds already running)")]
    Concurrent(u32),

    #[error("hourly build limit reached ({0} builds per hour)")]
    Hourly(u32),

    #[error("daily build limit reached ({0} builds per day)")]
    Daily(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_vars_lists_every_name() {
        let err = BuildError::MissingEnvVars(vec![
            "NEXT_PUBLIC_API".to_string(),
            "NEXT_PUBLIC_WS".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("NEXT_PUBLIC_API"));
        assert!(msg.contains("NEXT_PUBLIC_WS"));
        assert!(msg.starts_with("missing required environment variables"));
    }

    #[test]
    fn context_too_large_reports_megabytes() {
        let err = BuildError::ContextTooLarge {
            size_mb: 512,
            limit_mb: 500,
        };
        assert_eq!(
            err.to_string(),
            "build context size (512 MB) exceeds limit (500 MB)"
        );
    }

    #[test]
    fn denial_messages_name_the_window() {
        assert!(RateLimitDenial::Concurrent(1).to_string().contains("concurrent"));
        assert!(RateLimitDenial::Hourly(5).to_string().contains("hour"));
        assert!(RateLimitDenial::Daily(20).to_string().contains("day"));
    }
}
