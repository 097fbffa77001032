use obtura_builder::config::WorkerConfig;
use obtura_builder::consumer::BuildConsumer;
use obtura_builder::credentials::CredentialFetcher;
use obtura_builder::executor::BuildEngine;
use obtura_builder::limits::RateLimiter;
use obtura_builder::objects::ArtifactStore;
use obtura_builder::orchestrator::Orchestrator;
use obtura_builder::store::BuildStore;
use obtura_builder::{broker::LogBroker, VERSION};

use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    obtura_builder::init_logging();
    info!("obtura-builder v{} starting", VERSION);

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        error!("configuration error: {}", e);
        eprintln!("Configuration error: {}", e);
        process::exit(1);
    }
    let config = Arc::new(config);

    let store = match BuildStore::connect(&config.store.connection_url()).await {
        Ok(store) => store,
        Err(e) => {
            error!("failed to connect to database: {}", e);
            process::exit(1);
        }
    };
    info!("connected to database");

    let limiter = match RateLimiter::connect(&config.redis_url).await {
        Ok(limiter) => limiter,
        Err(e) => {
            error!("failed to connect to shared state: {}", e);
            process::exit(1);
        }
    };
    info!("connected to shared state");

    let engine = match BuildEngine::connect(&config.registry_username, &config.registry_password)
        .await
    {
        Ok(engine) => engine,
        Err(e) => {
            error!("failed to connect to container engine: {}", e);
            process::exit(1);
        }
    };

    let objects = ArtifactStore::new(&config.objects);
    let credentials = CredentialFetcher::new(&config.core_api_url);
    let broker = LogBroker::new();

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        store,
        broker,
        limiter,
        credentials,
        engine,
        objects,
    ));

    let consumer = match BuildConsumer::connect(&config.rabbitmq_url, orchestrator).await {
        Ok(consumer) => consumer,
        Err(e) => {
            error!("failed to connect to message bus: {}", e);
            process::exit(1);
        }
    };
    info!("connected to message bus");

    tokio::select! {
        result = consumer.run() => {
            if let Err(e) = result {
                error!("consumer stopped: {}", e);
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
}
