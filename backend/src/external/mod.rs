//! Lookups into data owned outside the stock engine

pub mod master_data;

pub use master_data::{MasterDataResolver, ReferenceValidator};
