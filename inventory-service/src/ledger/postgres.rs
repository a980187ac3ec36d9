use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use super::InventoryStore;
use crate::error::InventoryError;
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

/// PostgreSQL ledger. The critical section is a transaction holding a
/// `SELECT ... FOR UPDATE` lock on the product's `inventory` row; the lock is
/// released when the transaction commits or rolls back.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_size: u32) -> Result<Self, InventoryError> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .build(config)
            .await
            .map_err(|e| InventoryError::Pool(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

async fn find_row(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
) -> Result<InventoryRow, InventoryError> {
    inventory::table
        .filter(inventory::product_id.eq(product_id))
        .select(InventoryRow::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or(InventoryError::NotFound(product_id))
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn get_by_product_id(&self, product_id: Uuid) -> Result<Inventory, InventoryError> {
        let mut conn = self.pool.get().await?;
        let row = find_row(&mut conn, product_id).await?;
        Ok(row.into())
    }

    async fn apply_locked(&self, product_id: Uuid, op: &StockOp) -> Result<Inventory, InventoryError> {
        op.validate()?;
        let mut conn = self.pool.get().await?;

        let row = conn
            .transaction::<_, InventoryError, _>(|conn| {
                Box::pin(async move {
                    let locked = inventory::table
                        .filter(inventory::product_id.eq(product_id))
                        .select(InventoryRow::as_select())
                        .for_update()
                        .get_result(conn)
                        .await
                        .optional()?
                        .ok_or(InventoryError::NotFound(product_id))?;

                    // An error here rolls the transaction back before anything is written.
                    let change = op.apply(product_id, locked.quantity, locked.reserved_qty)?;
                    let now = Utc::now();

                    let updated = diesel::update(inventory::table.find(locked.id))
                        .set((
                            inventory::quantity.eq(change.quantity),
                            inventory::reserved_qty.eq(change.reserved_qty),
                            inventory::updated_at.eq(now),
                        ))
                        .returning(InventoryRow::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::insert_into(stock_movements::table)
                        .values(change.into_movement(locked.id, now))
                        .execute(conn)
                        .await?;

                    Ok(updated)
                })
            })
            .await?;

        debug!(%product_id, quantity = row.quantity, reserved_qty = row.reserved_qty, "ledger row committed");
        Ok(row.into())
    }

    async fn movements(&self, product_id: Uuid) -> Result<Vec<StockMovement>, InventoryError> {
        let mut conn = self.pool.get().await?;
        let row = find_row(&mut conn, product_id).await?;

        // `seq` is drawn while the row lock is held, so per product it follows commit order.
        stock_movements::table
            .filter(stock_movements::inventory_id.eq(row.id))
            .order(stock_movements::seq.asc())
            .select(MovementRow::as_select())
            .load(&mut *conn)
            .await?
            .into_iter()
            .map(StockMovement::try_from)
            .collect()
    }
}
