//! Evolutionary search for rule tables that explore the whole grid.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): random-start trials scored by coverage,
//!   efficiency and a stuck penalty
//! - **Genome Operations** (`genome`): random generation, crossover, and mutation
//! - **Search** (`search`): rank, truncation selection, reproduction
//!
//! # Example
//!
//! ```rust,no_run
//! use picobot::compute::evolution::EvolutionEngine;
//! use picobot::schema::EvolutionConfig;
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default()).unwrap();
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best fitness = {:.3}",
//!         progress.generation, progress.best_fitness);
//! });
//!
//! println!("{}", result.best);
//! println!("{}", result.best_scores);
//! ```

mod fitness;
mod genome;
mod search;

pub use fitness::{FitnessEvaluator, FitnessScores, TrialResult, run_trial};
pub use genome::table_distance;
pub use search::{
    EvolutionEngine, EvolutionResult, RankedTable, evolve, population_diversity, rank_population,
    reproduce, select_elite,
};
