use diesel_async::pooled_connection::PoolError;
use rdkafka::error::KafkaError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory not found for product {0}")]
    NotFound(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("corrupt ledger row: {0}")]
    CorruptRow(String),
}

impl InventoryError {
    /// Infrastructure failures, as opposed to expected business outcomes.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            InventoryError::Database(_) | InventoryError::Pool(_) | InventoryError::CorruptRow(_)
        )
    }
}

impl From<bb8::RunError<PoolError>> for InventoryError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        InventoryError::Pool(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] KafkaError),

    #[error("decode error: {0}")]
    Decode(#[from] shared::DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("publish to {topic} failed: {source}")]
    Publish { topic: String, source: KafkaError },
}
