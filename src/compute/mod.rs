//! Compute module - simulation of rule-table robots.

mod agent;
mod ingest;
mod policy;
mod rule_table;

pub mod evolution;

pub use agent::*;
pub use ingest::*;
pub use policy::*;
pub use rule_table::*;
