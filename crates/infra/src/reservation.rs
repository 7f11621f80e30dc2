//! Reservation lifecycle over the stock ledger.

use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, warn};

use stockwell_core::InventoryId;
use stockwell_inventory::InsufficientStock;
use stockwell_orders::Order;

use crate::store::{ReserveError, StockStore, StoreError};

/// Why an order could not be reserved.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("insufficient stock for inventory {inventory_id}: {source}")]
    Insufficient {
        inventory_id: InventoryId,
        #[source]
        source: InsufficientStock,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates, releases and commits the stock held by one order.
///
/// Reservation is all-or-nothing per order; release and commit are
/// per-item clamped operations, so replaying either is harmless.
#[derive(Clone)]
pub struct ReservationManager {
    stock: Arc<dyn StockStore>,
}

impl ReservationManager {
    pub fn new(stock: Arc<dyn StockStore>) -> Self {
        Self { stock }
    }

    /// Reserve every item of the order, or nothing.
    ///
    /// Items reserve in request order with no lock across rows; on the first
    /// failure everything already reserved in this call is rolled back
    /// before the error surfaces.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn reserve_for_order(&self, order: &Order) -> Result<(), ReservationError> {
        let mut reserved: Vec<(InventoryId, i64)> = Vec::with_capacity(order.items.len());

        for item in &order.items {
            match self.stock.reserve(item.inventory_id, item.quantity).await {
                Ok(()) => reserved.push((item.inventory_id, item.quantity)),
                Err(err) => {
                    self.roll_back(order, &reserved).await;
                    return Err(match err {
                        ReserveError::Insufficient(source) => ReservationError::Insufficient {
                            inventory_id: item.inventory_id,
                            source,
                        },
                        ReserveError::Store(e) => ReservationError::Store(e),
                    });
                }
            }
        }

        Ok(())
    }

    /// Release every item. Safe to call any number of times.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn release_for_order(&self, order: &Order) -> Result<(), StoreError> {
        for item in &order.items {
            let released = self.stock.release(item.inventory_id, item.quantity).await?;
            if released < item.quantity {
                tracing::debug!(
                    order_id = %order.id,
                    inventory_id = %item.inventory_id,
                    requested = item.quantity,
                    released,
                    "release clamped (already released)"
                );
            }
        }
        Ok(())
    }

    /// Commit every item's reservation into a permanent stock decrement.
    ///
    /// Callers gate this behind the Pending→Processing compare-and-swap, so
    /// it runs once per order; a clamped shortfall means the reservation was
    /// disturbed out-of-band (e.g. manual repair) and is logged for
    /// reconciliation.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn commit_for_order(&self, order: &Order) -> Result<(), StoreError> {
        for item in &order.items {
            let receipt = self.stock.commit(item.inventory_id, item.quantity).await?;
            if receipt.shortfall > 0 {
                warn!(
                    order_id = %order.id,
                    inventory_id = %item.inventory_id,
                    requested = item.quantity,
                    committed = receipt.committed,
                    shortfall = receipt.shortfall,
                    "commit clamped; reserved stock was released out-of-band"
                );
            }
        }
        Ok(())
    }

    async fn roll_back(&self, order: &Order, reserved: &[(InventoryId, i64)]) {
        for (inventory_id, qty) in reserved {
            if let Err(e) = self.stock.release(*inventory_id, *qty).await {
                // Leaves reserved stock stranded; the admin repair path is
                // the escape hatch.
                warn!(
                    order_id = %order.id,
                    inventory_id = %inventory_id,
                    qty,
                    error = %e,
                    "rollback release failed"
                );
            }
        }
    }
}
