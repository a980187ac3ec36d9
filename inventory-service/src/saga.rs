//! Order reservation saga.
//!
//! Each item of an order is reserved in its own transaction, in the order
//! listed. The first failure stops forward progress and every reservation
//! already made for the order is released again. Progress lives only in
//! memory for the duration of one message: a crash mid-order leaves the
//! reservations made so far held with nothing recording them.

use shared::{OrderCreated, OrderItem, ReservationOutcome};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::ReservationEngine;
use crate::ledger::InventoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Started,
    Compensating,
    Succeeded,
    Failed,
}

/// A compensating release that did not go through; the stock it covered is
/// still held and needs manual reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCompensation {
    pub item: OrderItem,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SagaReport {
    pub order_id: Uuid,
    pub state: SagaState,
    pub reserved: Vec<OrderItem>,
    pub failure_reason: Option<String>,
    pub failed_compensations: Vec<FailedCompensation>,
}

impl SagaReport {
    pub fn succeeded(&self) -> bool {
        self.state == SagaState::Succeeded
    }

    pub fn outcome(&self) -> ReservationOutcome {
        match self.state {
            SagaState::Succeeded => ReservationOutcome::reserved(self.order_id),
            _ => ReservationOutcome::failed(
                self.order_id,
                self.failure_reason.clone().unwrap_or_default(),
                self.failed_compensations.iter().map(|f| f.item).collect(),
            ),
        }
    }
}

pub struct SagaOrchestrator<S> {
    engine: ReservationEngine<S>,
}

impl<S: InventoryStore> SagaOrchestrator<S> {
    pub fn new(engine: ReservationEngine<S>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ReservationEngine<S> {
        &self.engine
    }

    pub async fn run(&self, event: &OrderCreated) -> SagaReport {
        let order_id = event.order_id;
        let mut state = SagaState::Started;
        let mut reserved: Vec<OrderItem> = Vec::with_capacity(event.items.len());
        let mut failure_reason = None;

        info!(%order_id, items = event.items.len(), "reserving order");

        for item in &event.items {
            match self.engine.reserve(item.product_id, item.quantity, order_id).await {
                Ok(_) => reserved.push(*item),
                Err(e) => {
                    error!(%order_id, product_id = %item.product_id, quantity = item.quantity, error = %e, "stock reservation failed");
                    failure_reason = Some(e.to_string());
                    state = SagaState::Compensating;
                    break;
                }
            }
        }

        if state == SagaState::Started {
            info!(%order_id, "order reserved");
            return SagaReport {
                order_id,
                state: SagaState::Succeeded,
                reserved,
                failure_reason: None,
                failed_compensations: Vec::new(),
            };
        }

        let failed_compensations = self.compensate(order_id, &reserved).await;
        if !failed_compensations.is_empty() {
            error!(%order_id, dangling = failed_compensations.len(), "compensation incomplete, reservations left held");
        }

        SagaReport {
            order_id,
            state: SagaState::Failed,
            reserved: Vec::new(),
            failure_reason,
            failed_compensations,
        }
    }

    async fn compensate(&self, order_id: Uuid, reserved: &[OrderItem]) -> Vec<FailedCompensation> {
        if reserved.is_empty() {
            return Vec::new();
        }
        info!(%order_id, items = reserved.len(), "rolling back reservations");

        let mut failed = Vec::new();
        for item in reserved.iter().rev() {
            if let Err(e) = self.engine.release(item.product_id, item.quantity, order_id).await {
                warn!(%order_id, product_id = %item.product_id, quantity = item.quantity, error = %e, "compensating release failed");
                failed.push(FailedCompensation {
                    item: *item,
                    error: e.to_string(),
                });
            }
        }
        failed
    }
}
