//! Fitness evaluation for rule tables.
//!
//! A table is scored by running it from several random start cells and
//! averaging how much of the grid it covers and how few steps it wastes.

use std::fmt;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::{Agent, Position, RuleTable, StopReason, TableMovePolicy};
use crate::schema::{ConfigError, EvaluationConfig, EvolutionConfigError, GridConfig};

/// Weight of coverage in the combined score.
const COVERAGE_WEIGHT: f64 = 0.7;
/// Weight of efficiency in the combined score.
const EFFICIENCY_WEIGHT: f64 = 0.3;
/// Combined-score reduction when every trial gets stuck.
const STUCK_PENALTY: f64 = 0.2;

/// Outcome of a single simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub start: Position,
    pub steps: usize,
    pub visit_count: usize,
    /// `visit_count / cells`.
    pub coverage: f64,
    /// `visit_count / steps`, capped at 1; 0 when no step was taken.
    pub efficiency: f64,
    pub stuck: bool,
    pub stop_reason: StopReason,
}

/// Run `table` once on `grid` for at most `max_steps` steps.
///
/// Starts at `start`, or at a uniformly random cell drawn from `rng` when
/// `start` is `None`. Identical inputs and RNG state give identical results.
pub fn run_trial<R: Rng + ?Sized>(
    table: &RuleTable,
    grid: &GridConfig,
    start: Option<Position>,
    max_steps: usize,
    rng: &mut R,
) -> Result<TrialResult, ConfigError> {
    grid.validate()?;
    let start = start.unwrap_or_else(|| Position::random(grid, rng));
    let mut agent = Agent::new(grid, start)?;

    let Ok(outcome) = agent.run(&mut TableMovePolicy::new(table), max_steps);

    let visit_count = agent.visit_count();
    let steps = outcome.steps_taken;
    let efficiency = if steps == 0 {
        0.0
    } else {
        (visit_count as f64 / steps as f64).min(1.0)
    };

    Ok(TrialResult {
        start,
        steps,
        visit_count,
        coverage: visit_count as f64 / grid.cell_count() as f64,
        efficiency,
        stuck: outcome.stop_reason == StopReason::Stuck,
        stop_reason: outcome.stop_reason,
    })
}

/// Aggregated scores over a batch of trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FitnessScores {
    /// Mean coverage.
    pub coverage: f64,
    /// Mean efficiency.
    pub efficiency: f64,
    /// Weighted score used for ranking.
    pub combined: f64,
    /// Cells visited, summed over trials.
    pub total_visited: usize,
    pub stuck_count: usize,
    /// `stuck_count / trials`.
    pub stuck_percentage: f64,
    pub trials: usize,
}

impl FitnessScores {
    /// Aggregate trial results. An empty batch scores zero.
    pub fn from_trials(trials: &[TrialResult]) -> Self {
        if trials.is_empty() {
            return Self::default();
        }
        let n = trials.len() as f64;

        let coverage = trials.iter().map(|t| t.coverage).sum::<f64>() / n;
        let efficiency = trials.iter().map(|t| t.efficiency).sum::<f64>() / n;
        let total_visited = trials.iter().map(|t| t.visit_count).sum();
        let stuck_count = trials.iter().filter(|t| t.stuck).count();
        let stuck_percentage = stuck_count as f64 / n;

        let combined = (COVERAGE_WEIGHT * coverage + EFFICIENCY_WEIGHT * efficiency)
            * (1.0 - stuck_percentage * STUCK_PENALTY);

        Self {
            coverage,
            efficiency,
            combined,
            total_visited,
            stuck_count,
            stuck_percentage,
            trials: trials.len(),
        }
    }
}

impl fmt::Display for FitnessScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program Performance:")?;
        writeln!(
            f,
            "- Coverage: {:.1}% of the grid was visited",
            self.coverage * 100.0
        )?;
        writeln!(
            f,
            "- Efficiency: {:.1}% (unique cells visited per step)",
            self.efficiency * 100.0
        )?;
        writeln!(f, "- Combined Score: {:.1}%", self.combined * 100.0)?;
        writeln!(
            f,
            "- Total cells visited across all trials: {}",
            self.total_visited
        )?;
        write!(
            f,
            "- Got stuck in {} out of {} trials ({:.1}%)",
            self.stuck_count,
            self.trials,
            self.stuck_percentage * 100.0
        )
    }
}

/// Scores rule tables over repeated random-start trials.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    grid: GridConfig,
    evaluation: EvaluationConfig,
}

impl FitnessEvaluator {
    /// Create an evaluator, rejecting empty grids and zero trial or step counts.
    pub fn new(
        grid: GridConfig,
        evaluation: EvaluationConfig,
    ) -> Result<Self, EvolutionConfigError> {
        grid.validate()?;
        if evaluation.trials == 0 {
            return Err(EvolutionConfigError::NoTrials);
        }
        if evaluation.steps == 0 {
            return Err(EvolutionConfigError::NoSteps);
        }
        Ok(Self { grid, evaluation })
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    pub fn evaluation(&self) -> &EvaluationConfig {
        &self.evaluation
    }

    /// Run every trial and return the individual results.
    ///
    /// One seed per trial is drawn from `rng` up front, so the outcome does
    /// not depend on how rayon schedules the trials.
    pub fn trials<R: Rng + ?Sized>(&self, table: &RuleTable, rng: &mut R) -> Vec<TrialResult> {
        let seeds: Vec<u64> = (0..self.evaluation.trials).map(|_| rng.next_u64()).collect();
        let grid = &self.grid;
        let steps = self.evaluation.steps;

        seeds
            .par_iter()
            .enumerate()
            .map(|(i, &seed)| {
                let mut trial_rng = StdRng::seed_from_u64(seed);
                let result = run_trial(table, grid, None, steps, &mut trial_rng)
                    .expect("grid validated in FitnessEvaluator::new");
                if result.stuck {
                    debug!("Trial {}: agent got stuck after {} steps", i + 1, result.steps);
                }
                result
            })
            .collect()
    }

    /// Score `table`. Deterministic for a given RNG state.
    pub fn evaluate<R: Rng + ?Sized>(&self, table: &RuleTable, rng: &mut R) -> FitnessScores {
        FitnessScores::from_trials(&self.trials(table, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Action, Direction};

    fn east_then_south() -> RuleTable {
        RuleTable::from_fn(5, |state, pattern| {
            let direction = if pattern.blocks(Direction::East) {
                Direction::South
            } else {
                Direction::East
            };
            Action::new(direction, state)
        })
        .unwrap()
    }

    fn trial(visit_count: usize, steps: usize, stuck: bool) -> TrialResult {
        TrialResult {
            start: Position::new(0, 0),
            steps,
            visit_count,
            coverage: visit_count as f64 / 400.0,
            efficiency: (visit_count as f64 / steps as f64).min(1.0),
            stuck,
            stop_reason: if stuck {
                StopReason::Stuck
            } else {
                StopReason::Exhausted
            },
        }
    }

    #[test]
    fn test_run_trial_fixed_start() {
        let grid = GridConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let result = run_trial(
            &east_then_south(),
            &grid,
            Some(Position::new(0, 0)),
            19,
            &mut rng,
        )
        .unwrap();

        assert_eq!(result.visit_count, 20);
        assert_eq!(result.steps, 19);
        assert!((result.coverage - 0.05).abs() < 1e-12);
        assert!((result.efficiency - 1.0).abs() < 1e-12);
        assert!(!result.stuck);
    }

    #[test]
    fn test_run_trial_zero_steps() {
        let grid = GridConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let result = run_trial(&east_then_south(), &grid, None, 0, &mut rng).unwrap();
        assert_eq!(result.steps, 0);
        assert_eq!(result.visit_count, 1);
        assert_eq!(result.efficiency, 0.0);
    }

    #[test]
    fn test_run_trial_deterministic() {
        let grid = GridConfig::default();
        let table = RuleTable::random(5, &mut StdRng::seed_from_u64(1));
        let a = run_trial(&table, &grid, None, 300, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = run_trial(&table, &grid, None, 300, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_run_trial_rejects_bad_start() {
        let grid = GridConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let result = run_trial(
            &east_then_south(),
            &grid,
            Some(Position::new(0, 25)),
            10,
            &mut rng,
        );
        assert!(matches!(result, Err(ConfigError::StartOutOfBounds { .. })));
    }

    #[test]
    fn test_combined_formula() {
        let scores = FitnessScores::from_trials(&[trial(200, 400, false), trial(100, 400, false)]);
        assert!((scores.coverage - 0.375).abs() < 1e-12);
        assert!((scores.efficiency - 0.375).abs() < 1e-12);
        assert!((scores.combined - 0.375).abs() < 1e-12);
        assert_eq!(scores.total_visited, 300);
        assert_eq!(scores.stuck_count, 0);
    }

    #[test]
    fn test_stuck_penalty() {
        let free = FitnessScores::from_trials(&[trial(100, 200, false); 5]);
        let some = FitnessScores::from_trials(&[
            trial(100, 200, true),
            trial(100, 200, false),
            trial(100, 200, false),
            trial(100, 200, false),
            trial(100, 200, false),
        ]);
        let all = FitnessScores::from_trials(&[trial(100, 200, true); 5]);

        assert!((some.combined - free.combined * 0.96).abs() < 1e-12);
        assert!((all.combined - free.combined * 0.8).abs() < 1e-12);
        assert!((all.stuck_percentage - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(FitnessScores::from_trials(&[]), FitnessScores::default());
    }

    #[test]
    fn test_evaluator_rejects_zero_counts() {
        let grid = GridConfig::default();
        let zero_trials = EvaluationConfig {
            trials: 0,
            ..Default::default()
        };
        assert!(matches!(
            FitnessEvaluator::new(grid, zero_trials),
            Err(EvolutionConfigError::NoTrials)
        ));
        let zero_steps = EvaluationConfig {
            steps: 0,
            ..Default::default()
        };
        assert!(matches!(
            FitnessEvaluator::new(grid, zero_steps),
            Err(EvolutionConfigError::NoSteps)
        ));
    }

    #[test]
    fn test_evaluate_deterministic() {
        let evaluator = FitnessEvaluator::new(
            GridConfig::default(),
            EvaluationConfig {
                trials: 8,
                steps: 200,
            },
        )
        .unwrap();
        let table = RuleTable::random(5, &mut StdRng::seed_from_u64(4));

        let a = evaluator.evaluate(&table, &mut StdRng::seed_from_u64(17));
        let b = evaluator.evaluate(&table, &mut StdRng::seed_from_u64(17));
        assert_eq!(a, b);
        assert_eq!(a.trials, 8);
        assert!((0.0..=1.0).contains(&a.coverage));
        assert!((0.0..=1.0).contains(&a.efficiency));
        assert!((0.0..=1.0).contains(&a.combined));
    }

    #[test]
    fn test_always_stuck_table() {
        // Every slot pushes north, so the agent runs to the top edge and stalls.
        let table = RuleTable::from_fn(5, |_, _| Action::new(Direction::North, 0)).unwrap();
        let evaluator = FitnessEvaluator::new(
            GridConfig::default(),
            EvaluationConfig {
                trials: 6,
                steps: 800,
            },
        )
        .unwrap();

        let scores = evaluator.evaluate(&table, &mut StdRng::seed_from_u64(2));
        assert_eq!(scores.stuck_count, 6);
        assert!(scores.coverage <= 20.0 / 400.0);
    }

    #[test]
    fn test_score_explanation() {
        let scores = FitnessScores::from_trials(&[trial(100, 200, true), trial(100, 200, false)]);
        let text = scores.to_string();
        assert!(text.starts_with("Program Performance:"));
        assert!(text.contains("- Coverage: 25.0% of the grid was visited"));
        assert!(text.contains("- Total cells visited across all trials: 200"));
        assert!(text.contains("- Got stuck in 1 out of 2 trials (50.0%)"));
    }
}
