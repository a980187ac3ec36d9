//! Stock reservation and order-reservation saga for the inventory service.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod saga;
pub mod schema;

pub use engine::ReservationEngine;
pub use error::{GatewayError, InventoryError};
pub use gateway::{EventGateway, KafkaPublisher, OutcomePublisher};
pub use ledger::{InMemoryStore, InventoryStore, PgStore};
pub use saga::{FailedCompensation, SagaOrchestrator, SagaReport, SagaState};
