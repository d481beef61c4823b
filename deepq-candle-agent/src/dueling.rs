//! Dueling architecture.
mod base;
mod config;
pub use base::Dueling;
pub use config::DuelingConfig;
