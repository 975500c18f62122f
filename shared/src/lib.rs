//! Shared domain model for the plant warehouse management backend
//!
//! This crate holds the stock lifecycle rules (container state machine, stock-in
//! planning, approval gates, sticker accounting and the raw-material ledger) as
//! pure functions so that the backend can run them inside a single database
//! transaction and tests can run them without one.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
