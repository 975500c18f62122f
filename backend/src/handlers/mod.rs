//! HTTP handlers, one module per resource

mod batchlabels;
mod containers;
mod health;
mod inventory;
mod requisitions;
mod rm_batches;
mod stickers;
mod stock_in;

pub use batchlabels::*;
pub use containers::*;
pub use health::*;
pub use inventory::*;
pub use requisitions::*;
pub use rm_batches::*;
pub use stickers::*;
pub use stock_in::*;
