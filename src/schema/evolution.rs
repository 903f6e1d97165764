//! Evolution configuration types for rule-table search.
//!
//! This module provides the parameters of the generational genetic search
//! and the progress/statistics types it reports back to callers.

use serde::{Deserialize, Serialize};

use super::{ConfigError, GridConfig};

/// Top-level configuration for a genetic search over rule tables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionConfig {
    /// Grid and automaton dimensions.
    #[serde(default)]
    pub grid: GridConfig,
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Evaluation settings (trials and steps per candidate).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Selection and variation settings.
    #[serde(default)]
    pub genetic: GeneticAlgorithmConfig,
    /// Wall-clock budget in seconds, checked between generations.
    #[serde(default)]
    pub time_budget_secs: Option<f64>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of rule tables per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Number of rank/select/reproduce cycles.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
        }
    }
}

fn default_population_size() -> usize {
    100
}
fn default_max_generations() -> usize {
    50
}

/// How each candidate is scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Independent trials per candidate, each from a random start cell.
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Step cap for every trial.
    #[serde(default = "default_steps")]
    pub steps: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            steps: default_steps(),
        }
    }
}

fn default_trials() -> usize {
    20
}
fn default_steps() -> usize {
    800
}

/// Genetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Fraction of the ranked population eligible as parents (truncation selection).
    #[serde(default = "default_elite_fraction")]
    pub elite_fraction: f64,
    /// Probability that an offspring receives one point mutation.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            elite_fraction: default_elite_fraction(),
            mutation_rate: default_mutation_rate(),
        }
    }
}

fn default_elite_fraction() -> f64 {
    0.2
}
fn default_mutation_rate() -> f64 {
    0.02
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Progress update emitted once per ranked generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generation that was just ranked.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Best combined score in this generation.
    pub generation_best: f64,
    /// Mean combined score in this generation.
    pub avg_fitness: f64,
    /// Best combined score seen so far.
    pub best_fitness: f64,
    /// Seconds since the run started.
    pub elapsed_seconds: f64,
    /// Statistics history for plotting.
    pub history: EvolutionHistory,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f64>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f64>,
    /// Mean pairwise table distance per generation.
    pub diversity: Vec<f64>,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations completed (rank, select and reproduce all ran).
    pub generations: usize,
    /// Total rule-table evaluations performed.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Average fitness of the final population.
    pub final_avg_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: TerminationReason,
}

/// Reason an evolution run stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TerminationReason {
    /// Reached the configured generation count.
    MaxGenerations,
    /// Caller raised the cancel flag.
    Cancelled,
    /// Wall-clock budget exhausted.
    TimeBudget,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be positive")]
    EmptyPopulation,
    #[error("Generation count must be positive")]
    NoGenerations,
    #[error("Trial count must be positive")]
    NoTrials,
    #[error("Steps per trial must be positive")]
    NoSteps,
    #[error("Elite fraction {0} must lie in (0, 1]")]
    InvalidEliteFraction(f64),
    #[error("Mutation rate {0} must lie in [0, 1]")]
    InvalidMutationRate(f64),
    #[error("Time budget {0}s must be positive")]
    InvalidTimeBudget(f64),
    #[error("Grid config validation failed: {0}")]
    GridConfigError(#[from] ConfigError),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.grid.validate()?;

        if self.population.size == 0 {
            return Err(EvolutionConfigError::EmptyPopulation);
        }
        if self.population.max_generations == 0 {
            return Err(EvolutionConfigError::NoGenerations);
        }
        if self.evaluation.trials == 0 {
            return Err(EvolutionConfigError::NoTrials);
        }
        if self.evaluation.steps == 0 {
            return Err(EvolutionConfigError::NoSteps);
        }

        let fraction = self.genetic.elite_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(EvolutionConfigError::InvalidEliteFraction(fraction));
        }
        let rate = self.genetic.mutation_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(EvolutionConfigError::InvalidMutationRate(rate));
        }
        if let Some(budget) = self.time_budget_secs
            && !(budget > 0.0)
        {
            return Err(EvolutionConfigError::InvalidTimeBudget(budget));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluation.trials, 20);
        assert_eq!(config.evaluation.steps, 800);
    }

    #[test]
    fn test_zero_arguments_rejected() {
        let mut config = EvolutionConfig::default();
        config.population.size = 0;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::EmptyPopulation)
        ));

        let mut config = EvolutionConfig::default();
        config.population.max_generations = 0;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::NoGenerations)
        ));

        let mut config = EvolutionConfig::default();
        config.evaluation.trials = 0;
        assert!(matches!(config.validate(), Err(EvolutionConfigError::NoTrials)));

        let mut config = EvolutionConfig::default();
        config.evaluation.steps = 0;
        assert!(matches!(config.validate(), Err(EvolutionConfigError::NoSteps)));
    }

    #[test]
    fn test_rates_rejected() {
        let mut config = EvolutionConfig::default();
        config.genetic.elite_fraction = 0.0;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidEliteFraction(_))
        ));

        let mut config = EvolutionConfig::default();
        config.genetic.mutation_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidMutationRate(_))
        ));

        let mut config = EvolutionConfig::default();
        config.time_budget_secs = Some(0.0);
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidTimeBudget(_))
        ));
    }

    #[test]
    fn test_grid_errors_propagate() {
        let mut config = EvolutionConfig::default();
        config.grid.columns = 1;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::GridConfigError(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);

        let sparse: EvolutionConfig =
            serde_json::from_str(r#"{"population": {"size": 10}}"#).unwrap();
        assert_eq!(sparse.population.size, 10);
        assert_eq!(sparse.population.max_generations, 50);
        assert_eq!(sparse.grid, GridConfig::default());
    }
}
