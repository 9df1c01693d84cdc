pub mod sweeper;
pub mod transfer;

pub use transfer::{TransferRequest, TransferService};
