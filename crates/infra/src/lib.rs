//! Infrastructure layer: storage adapters, transactions, cross-aggregate
//! checks, the project directory and configuration.

pub mod config;
pub mod directory;
pub mod records;
pub mod storage;
pub mod transaction;
pub mod uniqueness;

pub use config::Config;
pub use directory::{ProjectDirectory, StorageDirectory};
pub use records::ensure_schema;
pub use transaction::TransactionScope;
pub use uniqueness::{LiveRows, UniquenessError};
