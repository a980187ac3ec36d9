use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::InventoryError;
use crate::ledger::InventoryStore;
use crate::models::{Inventory, StockMovement, StockOp};

/// The only writer of the inventory ledger.
pub struct ReservationEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for ReservationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: InventoryStore> ReservationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn get_stock(&self, product_id: Uuid) -> Result<Inventory, InventoryError> {
        self.store.get_by_product_id(product_id).await
    }

    pub async fn movements(&self, product_id: Uuid) -> Result<Vec<StockMovement>, InventoryError> {
        self.store.movements(product_id).await
    }

    /// Physical count adjustment. Negative deltas are not checked against
    /// availability.
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i32,
        reason: &str,
    ) -> Result<Inventory, InventoryError> {
        let op = StockOp::Adjust {
            delta,
            reason: reason.to_string(),
        };
        op.validate()?;
        let inventory = self.store.apply_locked(product_id, &op).await?;
        info!(%product_id, delta, reason, quantity = inventory.quantity, "stock adjusted");
        Ok(inventory)
    }

    pub async fn add_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        reason: &str,
    ) -> Result<Inventory, InventoryError> {
        self.adjust_stock(product_id, quantity, reason).await
    }

    pub async fn remove_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        reason: &str,
    ) -> Result<Inventory, InventoryError> {
        let delta = quantity
            .checked_neg()
            .ok_or(InventoryError::InvalidQuantity(quantity))?;
        self.adjust_stock(product_id, delta, reason).await
    }

    pub async fn reserve(
        &self,
        product_id: Uuid,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<Inventory, InventoryError> {
        let op = StockOp::Reserve { quantity, order_id };
        op.validate()?;
        match self.store.apply_locked(product_id, &op).await {
            Ok(inventory) => {
                info!(%product_id, %order_id, quantity, available = inventory.available_qty, "stock reserved");
                Ok(inventory)
            }
            Err(err @ InventoryError::InsufficientStock { .. }) => {
                warn!(%product_id, %order_id, quantity, error = %err, "reservation rejected");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn release(
        &self,
        product_id: Uuid,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<Inventory, InventoryError> {
        let op = StockOp::Release { quantity, order_id };
        op.validate()?;
        let inventory = self.store.apply_locked(product_id, &op).await?;
        info!(%product_id, %order_id, quantity, available = inventory.available_qty, "stock released");
        Ok(inventory)
    }

    /// Advisory only: a concurrent reservation may take the stock before the
    /// caller acts on a positive answer. Never use this to gate a write.
    pub async fn check_availability(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, InventoryError> {
        let inventory = self.store.get_by_product_id(product_id).await?;
        Ok(inventory.available_qty >= quantity)
    }
}
