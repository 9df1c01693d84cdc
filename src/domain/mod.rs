pub mod account;
pub mod transaction;

pub use account::{Account, AccountStatus};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
