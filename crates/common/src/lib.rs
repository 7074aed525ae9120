pub mod config;
pub mod error;
pub mod precision;
pub mod types;
