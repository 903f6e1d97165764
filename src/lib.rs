//! Picobot - finite-state robots exploring a walled grid.
//!
//! A robot sees only which of its four sides are boundary walls. Its program
//! is a rule table mapping `(state, pattern)` to a move and a next state.
//! This crate simulates such programs and evolves them with a genetic
//! algorithm that rewards covering the grid quickly without getting stuck.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration types, patterns and rule encodings
//! - `compute`: Rule tables, the agent simulator, ingestion of external
//!   programs and the evolutionary search
//!
//! # Example
//!
//! ```rust,no_run
//! use picobot::{
//!     compute::{Agent, Position, RuleTable, TableMovePolicy},
//!     schema::GridConfig,
//! };
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let grid = GridConfig::default();
//! let mut rng = StdRng::seed_from_u64(7);
//! let table = RuleTable::random(grid.max_states, &mut rng);
//!
//! let mut agent = Agent::new(&grid, Position::new(0, 0)).unwrap();
//! let Ok(outcome) = agent.run(&mut TableMovePolicy::new(&table), 800);
//!
//! println!("{:?} after {} steps", outcome.stop_reason, outcome.steps_taken);
//! println!("{}", agent.snapshot().render());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{Agent, Position, RuleTable, TableMovePolicy};
pub use schema::{EvolutionConfig, GridConfig, Pattern};
