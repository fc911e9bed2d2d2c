pub mod config;
pub mod crypto;
pub mod instruction;
pub mod plan;
pub mod serializer;
pub mod time;
pub mod transaction;
pub mod units;
