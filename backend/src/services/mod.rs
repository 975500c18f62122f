//! Business logic services for the warehouse stock lifecycle

pub mod approval;
pub mod batchlabel;
pub mod container;
pub mod inventory;
pub mod query;
pub mod requisition;
pub mod rm_batch;
pub mod sticker;
pub mod stock_in;

pub use approval::ApprovalService;
pub use batchlabel::BatchlabelService;
pub use container::ContainerService;
pub use inventory::InventoryService;
pub use requisition::RequisitionService;
pub use rm_batch::RmBatchService;
pub use sticker::StickerService;
pub use stock_in::StockInService;
