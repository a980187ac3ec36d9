use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
#[cfg(test)]
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::InventoryStore;
use crate::error::InventoryError;
use crate::models::*;

#[derive(Debug)]
struct Entry {
    row: InventoryRow,
    movements: Vec<StockMovement>,
}

/// In-memory ledger with one mutex per product, for tests and local runs
/// without a database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Entry>>>>>,
    #[cfg(test)]
    failing_releases: Arc<RwLock<HashSet<Uuid>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the ledger row for a product, replacing any existing one.
    pub fn insert(&self, product_id: Uuid, quantity: i32, low_stock_threshold: i32) -> Uuid {
        let now = Utc::now();
        let row = InventoryRow {
            id: Uuid::new_v4(),
            product_id,
            warehouse_id: Uuid::new_v4(),
            quantity,
            reserved_qty: 0,
            low_stock_threshold,
            created_at: now,
            updated_at: now,
        };
        let id = row.id;
        self.entries.write().insert(
            product_id,
            Arc::new(Mutex::new(Entry {
                row,
                movements: Vec::new(),
            })),
        );
        id
    }

    /// Makes every subsequent release against `product_id` fail with a
    /// persistence error, leaving the ledger untouched.
    #[cfg(test)]
    pub fn fail_releases_for(&self, product_id: Uuid) {
        self.failing_releases.write().insert(product_id);
    }

    #[cfg(test)]
    fn injected_fault(&self, product_id: Uuid, op: &StockOp) -> Result<(), InventoryError> {
        if matches!(op, StockOp::Release { .. }) && self.failing_releases.read().contains(&product_id) {
            return Err(InventoryError::Pool(format!(
                "ledger unavailable for product {product_id}"
            )));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn injected_fault(&self, _product_id: Uuid, _op: &StockOp) -> Result<(), InventoryError> {
        Ok(())
    }

    fn entry(&self, product_id: Uuid) -> Result<Arc<Mutex<Entry>>, InventoryError> {
        self.entries
            .read()
            .get(&product_id)
            .cloned()
            .ok_or(InventoryError::NotFound(product_id))
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn get_by_product_id(&self, product_id: Uuid) -> Result<Inventory, InventoryError> {
        let entry = self.entry(product_id)?;
        let row = entry.lock().row.clone();
        Ok(row.into())
    }

    async fn apply_locked(&self, product_id: Uuid, op: &StockOp) -> Result<Inventory, InventoryError> {
        op.validate()?;
        let entry = self.entry(product_id)?;
        self.injected_fault(product_id, op)?;

        let mut guard = entry.lock();
        let change = op.apply(product_id, guard.row.quantity, guard.row.reserved_qty)?;
        let now = Utc::now();
        let inventory_id = guard.row.id;

        guard.row.quantity = change.quantity;
        guard.row.reserved_qty = change.reserved_qty;
        guard.row.updated_at = now;
        guard.movements.push(StockMovement {
            id: Uuid::new_v4(),
            inventory_id,
            movement_type: change.movement_type,
            quantity: change.movement_quantity,
            order_id: change.order_id,
            reason: change.reason,
            created_at: now,
        });

        Ok(guard.row.clone().into())
    }

    async fn movements(&self, product_id: Uuid) -> Result<Vec<StockMovement>, InventoryError> {
        let entry = self.entry(product_id)?;
        let movements = entry.lock().movements.clone();
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let product_id = Uuid::new_v4();

        assert!(matches!(
            store.get_by_product_id(product_id).await,
            Err(InventoryError::NotFound(id)) if id == product_id
        ));
        assert!(matches!(
            store
                .apply_locked(product_id, &StockOp::Adjust { delta: 1, reason: "x".into() })
                .await,
            Err(InventoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejected_op_leaves_entry_untouched() {
        let store = InMemoryStore::new();
        let product_id = Uuid::new_v4();
        store.insert(product_id, 2, 0);
        let before = store.get_by_product_id(product_id).await.unwrap();

        let op = StockOp::Reserve { quantity: 3, order_id: Uuid::new_v4() };
        assert!(store.apply_locked(product_id, &op).await.is_err());

        assert_eq!(store.get_by_product_id(product_id).await.unwrap(), before);
        assert!(store.movements(product_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_releases_only_affect_releases() {
        let store = InMemoryStore::new();
        let product_id = Uuid::new_v4();
        store.insert(product_id, 5, 0);
        store.fail_releases_for(product_id);
        let order_id = Uuid::new_v4();

        store
            .apply_locked(product_id, &StockOp::Reserve { quantity: 2, order_id })
            .await
            .unwrap();
        let err = store
            .apply_locked(product_id, &StockOp::Release { quantity: 2, order_id })
            .await
            .unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(store.get_by_product_id(product_id).await.unwrap().reserved_qty, 2);
        assert_eq!(store.movements(product_id).await.unwrap().len(), 1);
    }
}
