//! Inventory ledger storage.
//!
//! Backends expose reads plus a single write primitive, [`InventoryStore::apply_locked`],
//! which evaluates a [`StockOp`] inside one product's critical section and
//! persists the new counters together with the matching movement, or nothing.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{DbPool, PgStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::InventoryError;
use crate::models::{Inventory, StockMovement, StockOp};

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Current ledger state for a product, with availability and status derived.
    async fn get_by_product_id(&self, product_id: Uuid) -> Result<Inventory, InventoryError>;

    /// Applies `op` while holding an exclusive lock on the product's row.
    ///
    /// Concurrent calls for the same product are serialized; calls for
    /// different products do not contend. When `op` evaluates to an error
    /// neither the row nor the movement log is touched.
    async fn apply_locked(&self, product_id: Uuid, op: &StockOp) -> Result<Inventory, InventoryError>;

    /// Movement history for a product, oldest first.
    async fn movements(&self, product_id: Uuid) -> Result<Vec<StockMovement>, InventoryError>;
}
