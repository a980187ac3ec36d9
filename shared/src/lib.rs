//! Wire contracts exchanged between the inventory service and the rest of
//! the platform over Kafka.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status string carried by a successful reservation outcome.
pub const STATUS_RESERVED: &str = "RESERVED";
/// Status string carried by a failed reservation outcome.
pub const STATUS_RESERVATION_FAILED: &str = "STOCK_RESERVATION_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Published by the order service when an order has been placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub total_amount: f64,
    pub status: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("order {0} has no items")]
    NoItems(Uuid),
    #[error("order {order_id} item {product_id} has non-positive quantity {quantity}")]
    InvalidQuantity {
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
}

impl OrderCreated {
    /// Decodes and validates an inbound payload. Every item must carry a
    /// positive quantity and the order must list at least one item.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let event: OrderCreated = serde_json::from_slice(payload)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.items.is_empty() {
            return Err(DecodeError::NoItems(self.order_id));
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity <= 0) {
            return Err(DecodeError::InvalidQuantity {
                order_id: self.order_id,
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }
        Ok(())
    }
}

/// The single message published per processed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ReservationOutcome {
    #[serde(rename = "RESERVED", rename_all = "camelCase")]
    Reserved { order_id: Uuid },
    #[serde(rename = "STOCK_RESERVATION_FAILED", rename_all = "camelCase")]
    Failed {
        order_id: Uuid,
        reason: String,
        /// Items whose compensating release failed and still hold stock.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        unreleased: Vec<OrderItem>,
    },
}

impl ReservationOutcome {
    pub fn reserved(order_id: Uuid) -> Self {
        Self::Reserved { order_id }
    }

    pub fn failed(order_id: Uuid, reason: String, unreleased: Vec<OrderItem>) -> Self {
        Self::Failed {
            order_id,
            reason,
            unreleased,
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Reserved { order_id } | Self::Failed { order_id, .. } => *order_id,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Reserved { .. } => STATUS_RESERVED,
            Self::Failed { .. } => STATUS_RESERVATION_FAILED,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_json(items: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "orderId": "7f1c7a4e-5d0b-4f57-9a8e-0c5d2f6b1a01",
            "userId": "0b8e3c2d-1111-4a4a-8b8b-222233334444",
            "totalAmount": 125.5,
            "status": "PENDING",
            "items": items,
        }))
        .unwrap()
    }

    #[test]
    fn decodes_camel_case_order() {
        let product = Uuid::new_v4();
        let payload = order_json(json!([{ "productId": product, "quantity": 3 }]));

        let event = OrderCreated::decode(&payload).unwrap();
        assert_eq!(event.status, "PENDING");
        assert_eq!(event.items, vec![OrderItem { product_id: product, quantity: 3 }]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            OrderCreated::decode(b"not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_loosely_typed_items() {
        let payload = order_json(json!([{ "productId": "abc", "quantity": "three" }]));
        assert!(matches!(
            OrderCreated::decode(&payload),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_empty_and_non_positive_items() {
        let empty = order_json(json!([]));
        assert!(matches!(OrderCreated::decode(&empty), Err(DecodeError::NoItems(_))));

        let zero = order_json(json!([{ "productId": Uuid::new_v4(), "quantity": 0 }]));
        assert!(matches!(
            OrderCreated::decode(&zero),
            Err(DecodeError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn outcome_wire_shape() {
        let order_id = Uuid::new_v4();

        let reserved = serde_json::to_value(ReservationOutcome::reserved(order_id)).unwrap();
        assert_eq!(reserved, json!({ "orderId": order_id, "status": "RESERVED" }));

        let failed = serde_json::to_value(ReservationOutcome::failed(
            order_id,
            "insufficient stock".to_string(),
            vec![],
        ))
        .unwrap();
        assert_eq!(
            failed,
            json!({
                "orderId": order_id,
                "reason": "insufficient stock",
                "status": "STOCK_RESERVATION_FAILED",
            })
        );
    }

    #[test]
    fn failed_outcome_lists_unreleased_items() {
        let order_id = Uuid::new_v4();
        let item = OrderItem { product_id: Uuid::new_v4(), quantity: 4 };
        let outcome = ReservationOutcome::failed(order_id, "boom".to_string(), vec![item]);

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["unreleased"][0]["quantity"], 4);
        assert_eq!(outcome.status(), STATUS_RESERVATION_FAILED);
        assert!(!outcome.is_reserved());
    }
}
