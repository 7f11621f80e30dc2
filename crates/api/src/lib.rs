//! `stockwell-api` — HTTP boundary for the reservation subsystem.

pub mod app;
pub mod middleware;
