//! `stockwell-promotions` — coupon definitions and one-time-use rules.
//!
//! The rules here are pure; the usage ledger in `stockwell-infra` applies
//! them against stored usage counts and records.

pub mod identity;
pub mod promotion;
pub mod usage;

pub use identity::{CanonicalEmail, CheckoutIdentity};
pub use promotion::{Promotion, PromotionError};
pub use usage::PromotionUsageRecord;
