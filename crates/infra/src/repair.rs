//! Administrative stock repair.
//!
//! Races and provider outages can leave reserved stock stranded (e.g. a
//! crash between the status swap and the commit). For an order that has
//! already settled, this forcibly releases whatever reserved stock still
//! matches the ordered quantities. Last-resort escape hatch, not part of the
//! steady-state protocol; every correction it makes is logged.

use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, warn};

use stockwell_core::{InventoryId, OrderId};

use crate::store::{OrderStore, StockStore, StoreError};

#[derive(Debug, Error)]
pub enum RepairError {
    /// A pending order's reservation is live and correct; repairing it would
    /// just leak stock.
    #[error("order {0} is still pending; nothing to repair")]
    OrderStillPending(OrderId),

    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RepairCorrection {
    pub inventory_id: InventoryId,
    pub requested: i64,
    pub released: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RepairReport {
    pub order_id: OrderId,
    pub corrections: Vec<RepairCorrection>,
}

pub struct StockRepair {
    orders: Arc<dyn OrderStore>,
    stock: Arc<dyn StockStore>,
}

impl StockRepair {
    pub fn new(orders: Arc<dyn OrderStore>, stock: Arc<dyn StockStore>) -> Self {
        Self { orders, stock }
    }

    /// Release residual reserved stock for a settled order.
    ///
    /// Idempotent: releases are clamped, so running the repair twice (or
    /// repairing an order whose reservation already settled cleanly)
    /// releases nothing further.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn repair_order(&self, order_id: OrderId) -> Result<RepairReport, RepairError> {
        let order = match self.orders.get(order_id).await {
            Ok(order) => order,
            Err(StoreError::NotFound) => return Err(RepairError::NotFound),
            Err(e) => return Err(e.into()),
        };

        if !order.status.is_settled() {
            return Err(RepairError::OrderStillPending(order_id));
        }

        let mut corrections = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let released = self.stock.release(item.inventory_id, item.quantity).await?;
            if released > 0 {
                warn!(
                    order_id = %order_id,
                    inventory_id = %item.inventory_id,
                    released,
                    "repair released residual reserved stock"
                );
            }
            corrections.push(RepairCorrection {
                inventory_id: item.inventory_id,
                requested: item.quantity,
                released,
            });
        }

        Ok(RepairReport {
            order_id,
            corrections,
        })
    }
}
