//! Message-bus ingestion of build requests.
//!
//! Declares the durable topology (topic exchange, durable queue, binding)
//! and consumes with manual acknowledgement. Each delivery is handed to
//! the orchestrator on its own task so consumption never stalls behind a
//! running build; concurrency is bounded by the rate limiter, not here.

use crate::model::BuildJob;
use crate::orchestrator::{Disposition, Orchestrator};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use std::sync::Arc;
use tracing::{error, info};

pub const EXCHANGE: &str = "obtura.builds";
pub const QUEUE: &str = "build-queue";
pub const ROUTING_KEY: &str = "build.triggered";
const CONSUMER_TAG: &str = "obtura-builder";

pub struct BuildConsumer {
    // Held so the connection outlives the channel.
    _connection: Connection,
    channel: Channel,
    orchestrator: Arc<Orchestrator>,
}

impl BuildConsumer {
    /// Connects to the bus and declares the build topology.
    pub async fn connect(
        url: &str,
        orchestrator: Arc<Orchestrator>,
    ) -> Result<Self, lapin::Error> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                QUEUE,
                EXCHANGE,
                ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            _connection: connection,
            channel,
            orchestrator,
        })
    }

    /// Consumes deliveries until the channel closes, spawning one build
    /// task per delivery.
    pub async fn run(&self) -> Result<(), lapin::Error> {
        let mut consumer = self
            .channel
            .basic_consume(
                QUEUE,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("listening for build requests");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!(error = %e, "failed to receive delivery");
                    continue;
                }
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let job: BuildJob = match serde_json::from_slice(&delivery.data) {
                    Ok(job) => job,
                    Err(e) => {
                        error!(error = %e, "malformed build request, dropping");
                        if let Err(e) = delivery
                            .nack(BasicNackOptions {
                                requeue: false,
                                ..Default::default()
                            })
                            .await
                        {
                            error!(error = %e, "failed to nack malformed delivery");
                        }
                        return;
                    }
                };

                let disposition = orchestrator.handle(job).await;
                let result = match disposition {
                    Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
                    Disposition::Reject => {
                        delivery
                            .nack(BasicNackOptions {
                                requeue: false,
                                ..Default::default()
                            })
                            .await
                    }
                };
                if let Err(e) = result {
                    error!(error = %e, "failed to settle delivery");
                }
            });
        }

        Ok(())
    }
}
