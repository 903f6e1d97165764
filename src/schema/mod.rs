//! Schema module - Configuration and rule vocabulary for Picobot runs.

mod config;
mod evolution;
mod rule;

pub use config::*;
pub use evolution::*;
pub use rule::*;
