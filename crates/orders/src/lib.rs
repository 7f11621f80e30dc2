//! `stockwell-orders` — the order aggregate and its settlement state machine.

pub mod order;
pub mod payment;

pub use order::{AppliedPromotion, Order, OrderItem, OrderStatus};
pub use payment::{PaymentRecord, PaymentStatus};
