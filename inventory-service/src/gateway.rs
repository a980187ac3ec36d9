use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::Message;
use shared::{OrderCreated, ReservationOutcome};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::ledger::InventoryStore;
use crate::saga::SagaOrchestrator;

pub fn create_consumer(config: &GatewayConfig) -> KafkaResult<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &config.consumer_group)
        .set("bootstrap.servers", &config.brokers)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000")
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;
    consumer.subscribe(&[&config.inbound_topic])?;
    Ok(consumer)
}

pub fn create_producer(config: &GatewayConfig) -> KafkaResult<FutureProducer> {
    producer_config(config).create()
}

/// The librdkafka delivery timeout tracks `publish_timeout`.
fn producer_config(config: &GatewayConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("message.timeout.ms", config.publish_timeout.as_millis().to_string());
    client
}

#[async_trait]
pub trait OutcomePublisher: Send + Sync {
    async fn publish(&self, outcome: &ReservationOutcome) -> Result<(), GatewayError>;

    /// Flushes anything buffered. Called once on shutdown.
    async fn close(&self) {}
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(producer: FutureProducer, topic: String, timeout: Duration) -> Self {
        Self { producer, topic, timeout }
    }
}

#[async_trait]
impl OutcomePublisher for KafkaPublisher {
    async fn publish(&self, outcome: &ReservationOutcome) -> Result<(), GatewayError> {
        let json = serde_json::to_string(outcome)?;
        // Keyed by order so every outcome for one order lands on one partition.
        let key = outcome.order_id().to_string();
        let record = FutureRecord::to(&self.topic).payload(&json).key(&key);

        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(source, _)| GatewayError::Publish {
                topic: self.topic.clone(),
                source,
            })?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.producer.flush(self.timeout) {
            error!("Error flushing producer: {}", e);
        }
    }
}

/// Bridges the message bus and the saga orchestrator.
pub struct EventGateway<S, P> {
    saga: SagaOrchestrator<S>,
    publisher: P,
    retry_backoff: Duration,
}

impl<S: InventoryStore, P: OutcomePublisher> EventGateway<S, P> {
    pub fn new(saga: SagaOrchestrator<S>, publisher: P, retry_backoff: Duration) -> Self {
        Self {
            saga,
            publisher,
            retry_backoff,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Decodes one inbound payload, runs the saga for it and publishes the
    /// single resulting outcome. Returns the outcome that was published.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<ReservationOutcome, GatewayError> {
        let event = OrderCreated::decode(payload)?;
        info!(order_id = %event.order_id, user_id = %event.user_id, "processing order created event");

        let report = self.saga.run(&event).await;
        let outcome = report.outcome();
        self.publisher.publish(&outcome).await?;

        info!(order_id = %outcome.order_id(), status = outcome.status(), "reservation outcome published");
        Ok(outcome)
    }

    /// Consumes until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Messages are handled one at a time. Shutdown is only observed between
    /// messages, so a saga that has started always runs to completion.
    pub async fn run(&self, consumer: StreamConsumer, mut shutdown: watch::Receiver<bool>) {
        info!("Inventory event gateway started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let message = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                message = consumer.recv() => message,
            };

            let m = match message {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, backoff_ms = self.retry_backoff.as_millis() as u64, "Error receiving message");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(self.retry_backoff) => continue,
                    }
                }
            };

            info!(topic = m.topic(), partition = m.partition(), offset = m.offset(), "Received message");

            match self.handle_payload(m.payload().unwrap_or_default()).await {
                Ok(_) => {}
                Err(GatewayError::Decode(e)) => {
                    error!(offset = m.offset(), error = %e, "Dropping undecodable message");
                }
                Err(e) => error!("Error handling message: {}", e),
            }

            if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
                error!("Error committing message: {}", e);
            }
        }

        info!("Inventory event gateway stopping");
        consumer.unsubscribe();
        self.publisher.close().await;
    }
}
