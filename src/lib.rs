pub mod broker;
pub mod config;
pub mod consumer;
pub mod credentials;
pub mod detect;
pub mod envfile;
pub mod error;
pub mod executor;
pub mod gitclone;
pub mod limits;
pub mod model;
pub mod objects;
pub mod orchestrator;
pub mod quota;
pub mod recipe;
pub mod reporter;
pub mod store;
pub mod workspace;

pub use broker::{LogBroker, Subscription};
pub use config::{ConfigError, WorkerConfig};
pub use detect::{detect_services, DetectionResult, Framework, FrameworkKind};
pub use error::{BuildError, RateLimitDenial};
pub use model::{BuildEvent, BuildJob, BuildStatus, LogLevel, QuotaEnvelope, SandboxEnvelope};
pub use orchestrator::{Disposition, Orchestrator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialises structured logging once for the process. Level comes from
/// `RUST_LOG` when set, otherwise everything from this crate at `info`
/// with noisy dependencies demoted.
pub fn init_logging() {
    use std::sync::Once;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if std::env::var("RUST_LOG").is_err() {
            filter = filter
                .add_directive("obtura_builder=info".parse().unwrap())
                .add_directive("lapin=warn".parse().unwrap())
                .add_directive("sqlx=warn".parse().unwrap())
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("h2=warn".parse().unwrap())
                .add_directive("reqwest=warn".parse().unwrap());
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "obtura-builder");
    }
}
