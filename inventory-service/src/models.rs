use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::InventoryError;

pub const RESERVE_REASON: &str = "Order reservation";
pub const RELEASE_REASON: &str = "Order cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn derive(available: i32, threshold: i32) -> Self {
        if available <= 0 {
            StockStatus::OutOfStock
        } else if available <= threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
    Reserve,
    Release,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Reserve => "RESERVE",
            MovementType::Release => "RELEASE",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "RESERVE" => Ok(MovementType::Reserve),
            "RELEASE" => Ok(MovementType::Release),
            other => Err(InventoryError::CorruptRow(format!(
                "unknown movement type {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::inventory)]
pub struct InventoryRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub reserved_qty: i32,
    pub low_stock_threshold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read view of a product's stock. `available_qty` and `status` are derived
/// from the row every time one is built and are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub reserved_qty: i32,
    pub available_qty: i32,
    pub low_stock_threshold: i32,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `quantity - reserved_qty`, widened so no pair of stored counters can overflow.
pub fn available(quantity: i32, reserved_qty: i32) -> i64 {
    i64::from(quantity) - i64::from(reserved_qty)
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

impl From<InventoryRow> for Inventory {
    fn from(row: InventoryRow) -> Self {
        // Rows written through `StockOp::apply` always fit; anything edited
        // out of band is clamped rather than trusted.
        let available_qty = saturate(available(row.quantity, row.reserved_qty));
        Self {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            reserved_qty: row.reserved_qty,
            available_qty,
            low_stock_threshold: row.low_stock_threshold,
            status: StockStatus::derive(available_qty, row.low_stock_threshold),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::stock_movements)]
pub struct MovementRow {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub movement_type: String,
    pub quantity: i32,
    pub order_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::stock_movements)]
pub struct NewMovement {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub movement_type: String,
    pub quantity: i32,
    pub order_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub inventory_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = InventoryError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            inventory_id: row.inventory_id,
            movement_type: row.movement_type.parse()?,
            quantity: row.quantity,
            order_id: row.order_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// A quantity-affecting operation on one product's ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockOp {
    /// Physical count correction; positive is a receipt, negative a removal.
    Adjust { delta: i32, reason: String },
    Reserve { quantity: i32, order_id: Uuid },
    Release { quantity: i32, order_id: Uuid },
}

/// The outcome of evaluating a [`StockOp`] against a locked row: the row's
/// new counters plus the movement that must be written alongside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub quantity: i32,
    pub reserved_qty: i32,
    pub movement_type: MovementType,
    pub movement_quantity: i32,
    pub order_id: Option<Uuid>,
    pub reason: String,
}

impl StockChange {
    pub fn into_movement(self, inventory_id: Uuid, at: DateTime<Utc>) -> NewMovement {
        NewMovement {
            id: Uuid::new_v4(),
            inventory_id,
            movement_type: self.movement_type.as_str().to_string(),
            quantity: self.movement_quantity,
            order_id: self.order_id,
            reason: self.reason,
            created_at: at,
        }
    }
}

impl StockOp {
    pub fn validate(&self) -> Result<(), InventoryError> {
        match self {
            // i32::MIN has no positive magnitude to record as a movement.
            StockOp::Adjust { delta, .. } if *delta == 0 || *delta == i32::MIN => {
                Err(InventoryError::InvalidQuantity(*delta))
            }
            StockOp::Reserve { quantity, .. } | StockOp::Release { quantity, .. }
                if *quantity <= 0 =>
            {
                Err(InventoryError::InvalidQuantity(*quantity))
            }
            _ => Ok(()),
        }
    }

    /// Evaluates the operation against the current counters of a row that
    /// the caller holds exclusively.
    pub fn apply(
        &self,
        product_id: Uuid,
        quantity: i32,
        reserved_qty: i32,
    ) -> Result<StockChange, InventoryError> {
        self.validate()?;

        let change = match self {
            StockOp::Adjust { delta, reason } => {
                let new_quantity = quantity
                    .checked_add(*delta)
                    .ok_or(InventoryError::InvalidQuantity(*delta))?;
                let movement_type = if *delta < 0 {
                    MovementType::Out
                } else {
                    MovementType::In
                };
                StockChange {
                    quantity: new_quantity,
                    reserved_qty,
                    movement_type,
                    movement_quantity: delta.abs(),
                    order_id: None,
                    reason: reason.clone(),
                }
            }
            StockOp::Reserve {
                quantity: requested,
                order_id,
            } => {
                let available = available(quantity, reserved_qty);
                if available < i64::from(*requested) {
                    return Err(InventoryError::InsufficientStock {
                        product_id,
                        requested: *requested,
                        available: saturate(available),
                    });
                }
                StockChange {
                    quantity,
                    reserved_qty: reserved_qty
                        .checked_add(*requested)
                        .ok_or(InventoryError::InvalidQuantity(*requested))?,
                    movement_type: MovementType::Reserve,
                    movement_quantity: *requested,
                    order_id: Some(*order_id),
                    reason: RESERVE_REASON.to_string(),
                }
            }
            // No check against a prior reservation; the counter may go
            // negative if callers release more than they reserved.
            StockOp::Release {
                quantity: released,
                order_id,
            } => StockChange {
                quantity,
                reserved_qty: reserved_qty
                    .checked_sub(*released)
                    .ok_or(InventoryError::InvalidQuantity(*released))?,
                movement_type: MovementType::Release,
                movement_quantity: *released,
                order_id: Some(*order_id),
                reason: RELEASE_REASON.to_string(),
            },
        };

        // The new counters must still yield an i32 availability.
        if change.quantity.checked_sub(change.reserved_qty).is_none() {
            return Err(InventoryError::InvalidQuantity(change.movement_quantity));
        }
        Ok(change)
    }
}
