//! Domain models for the warehouse stock lifecycle

mod approval;
mod batchlabel;
mod container;
mod inventory;
mod master_data;
mod requisition;
mod rm_batch;
mod sticker;
mod stock_in;

pub use approval::*;
pub use batchlabel::*;
pub use container::*;
pub use inventory::*;
pub use master_data::*;
pub use requisition::*;
pub use rm_batch::*;
pub use sticker::*;
pub use stock_in::*;
