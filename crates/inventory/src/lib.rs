//! `stockwell-inventory` — per-SKU stock arithmetic.
//!
//! The stock ledger's transitions (reserve, release, commit) live here as
//! pure functions over [`StockLevel`]. Storage backends encode the same
//! transitions as single-statement conditional updates; the in-memory
//! backend and the tests exercise these directly.

pub mod stock;

pub use stock::{CommitReceipt, InsufficientStock, InventoryRecord, Sku, StockLevel};
