//! Generational genetic search over rule tables.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::RuleTable;
use crate::schema::{
    EvaluationConfig, EvolutionConfig, EvolutionConfigError, EvolutionHistory, EvolutionProgress,
    EvolutionStats, GridConfig, PopulationConfig, TerminationReason,
};

use super::fitness::{FitnessEvaluator, FitnessScores};
use super::genome::table_distance;

/// A scored member of a generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTable {
    /// Position in the population that was ranked.
    pub index: usize,
    pub table: RuleTable,
    pub scores: FitnessScores,
}

/// Final outcome of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best table of the final generation.
    pub best: RuleTable,
    pub best_scores: FitnessScores,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Score every table and sort by combined score, best first.
///
/// Ties keep population order. One seed per table is drawn from `rng` before
/// the parallel section, so the ranking is reproducible.
pub fn rank_population<R: Rng + ?Sized>(
    evaluator: &FitnessEvaluator,
    population: &[RuleTable],
    rng: &mut R,
) -> Vec<RankedTable> {
    let seeds: Vec<u64> = population.iter().map(|_| rng.next_u64()).collect();

    let mut ranked: Vec<RankedTable> = population
        .par_iter()
        .zip(seeds.par_iter())
        .enumerate()
        .map(|(index, (table, &seed))| {
            let scores = evaluator.evaluate(table, &mut StdRng::seed_from_u64(seed));
            RankedTable {
                index,
                table: table.clone(),
                scores,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.scores.combined.total_cmp(&a.scores.combined));
    ranked
}

/// Truncation selection: the top `ceil(len * fraction)` entries, at least one.
pub fn select_elite(ranked: &[RankedTable], fraction: f64) -> &[RankedTable] {
    if ranked.is_empty() {
        return ranked;
    }
    // Products like 100 * 0.07 land a hair above the whole number.
    let raw = ranked.len() as f64 * fraction;
    let count = if (raw - raw.round()).abs() < 1e-9 {
        raw.round()
    } else {
        raw.ceil()
    } as usize;
    &ranked[..count.clamp(1, ranked.len())]
}

/// Breed `size` offspring from `elite`.
///
/// Each child crosses two parents drawn uniformly with replacement, then
/// receives one point mutation with probability `mutation_rate`.
pub fn reproduce<R: Rng + ?Sized>(
    elite: &[RankedTable],
    size: usize,
    mutation_rate: f64,
    rng: &mut R,
) -> Vec<RuleTable> {
    if elite.is_empty() {
        return Vec::new();
    }
    let mutation_rate = mutation_rate.clamp(0.0, 1.0);

    (0..size)
        .map(|_| {
            let first = &elite[rng.gen_range(0..elite.len())].table;
            let second = &elite[rng.gen_range(0..elite.len())].table;
            let mut child = first.crossover(second, rng);
            if rng.gen_bool(mutation_rate) {
                child.mutate(rng);
            }
            debug_assert!(child.validate().is_ok());
            child
        })
        .collect()
}

/// Mean pairwise [`table_distance`] across a population.
pub fn population_diversity(population: &[RuleTable]) -> f64 {
    let n = population.len();
    if n < 2 {
        return 0.0;
    }
    let total: f64 = (0..n)
        .into_par_iter()
        .map(|i| {
            population[i + 1..]
                .iter()
                .map(|other| table_distance(&population[i], other))
                .sum::<f64>()
        })
        .sum();
    total / (n * (n - 1) / 2) as f64
}

/// Evolve a table with default grid and selection settings.
///
/// Fails before any simulation if a count is zero.
pub fn evolve<R: Rng + ?Sized>(
    population_size: usize,
    generations: usize,
    trials: usize,
    steps: usize,
    rng: &mut R,
) -> Result<RuleTable, EvolutionConfigError> {
    let config = EvolutionConfig {
        population: PopulationConfig {
            size: population_size,
            max_generations: generations,
        },
        evaluation: EvaluationConfig { trials, steps },
        random_seed: Some(rng.next_u64()),
        ..Default::default()
    };
    let mut engine = EvolutionEngine::new(config)?;
    Ok(engine.run().best)
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: StdRng,
    evaluator: FitnessEvaluator,
    population: Vec<RuleTable>,
    history: EvolutionHistory,
    generation: usize,
    best_fitness: f64,
    total_evaluations: u64,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine, validating the configuration.
    pub fn new(config: EvolutionConfig) -> Result<Self, EvolutionConfigError> {
        config.validate()?;
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let evaluator = FitnessEvaluator::new(config.grid, config.evaluation.clone())?;

        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            evaluator,
            population: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
            best_fitness: f64::NEG_INFINITY,
            total_evaluations: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridConfig {
        &self.config.grid
    }

    /// Generations completed so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn population(&self) -> &[RuleTable] {
        &self.population
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Fill the population with random tables.
    pub fn initialize(&mut self) {
        let max_states = self.config.grid.max_states;
        self.population = (0..self.config.population.size)
            .map(|_| RuleTable::random(max_states, &mut self.rng))
            .collect();
        self.generation = 0;
        self.best_fitness = f64::NEG_INFINITY;
        self.history = EvolutionHistory::default();
    }

    /// Rank the current population.
    pub fn rank(&mut self) -> Vec<RankedTable> {
        self.total_evaluations += self.population.len() as u64;
        rank_population(&self.evaluator, &self.population, &mut self.rng)
    }

    /// Record statistics for a ranked generation; returns (best, mean).
    fn record(&mut self, ranked: &[RankedTable]) -> (f64, f64) {
        let n = ranked.len() as f64;
        let gen_best = ranked.first().map_or(0.0, |r| r.scores.combined);
        let avg = ranked.iter().map(|r| r.scores.combined).sum::<f64>() / n;
        let variance = ranked
            .iter()
            .map(|r| (r.scores.combined - avg).powi(2))
            .sum::<f64>()
            / n;

        self.best_fitness = self.best_fitness.max(gen_best);
        self.history.best_fitness.push(gen_best);
        self.history.avg_fitness.push(avg);
        self.history.fitness_std.push(variance.sqrt());
        self.history
            .diversity
            .push(population_diversity(&self.population));

        (gen_best, avg)
    }

    /// Replace the population with offspring of the ranked generation's elite.
    fn step_generation(&mut self, ranked: &[RankedTable]) {
        let elite = select_elite(ranked, self.config.genetic.elite_fraction);
        self.population = reproduce(
            elite,
            self.config.population.size,
            self.config.genetic.mutation_rate,
            &mut self.rng,
        );
        self.generation += 1;
    }

    fn check_stop(&self, start: &Instant) -> Option<TerminationReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(TerminationReason::Cancelled);
        }
        if let Some(budget) = self.config.time_budget_secs
            && start.elapsed().as_secs_f64() >= budget
        {
            return Some(TerminationReason::TimeBudget);
        }
        None
    }

    /// Run evolution with a progress callback invoked after every ranking.
    ///
    /// Cancellation and the time budget are checked between generations.
    /// The returned best table comes from ranking the final population.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> EvolutionResult
    where
        F: FnMut(&EvolutionProgress),
    {
        let start = Instant::now();
        if self.population.is_empty() {
            self.initialize();
        }

        let total_generations = self.config.population.max_generations;
        info!(
            "Grid size: {} by {}",
            self.config.grid.rows, self.config.grid.columns
        );
        info!(
            "Fitness measured using {} trials and {} steps",
            self.config.evaluation.trials, self.config.evaluation.steps
        );

        let mut stop_reason = TerminationReason::MaxGenerations;
        while self.generation < total_generations {
            if let Some(reason) = self.check_stop(&start) {
                info!("Stopping at generation {}: {:?}", self.generation, reason);
                stop_reason = reason;
                break;
            }

            let ranked = self.rank();
            let (gen_best, avg) = self.record(&ranked);
            info!(
                "Generation {}: average fitness {:.3}, best fitness {:.3}",
                self.generation, avg, gen_best
            );

            callback(&EvolutionProgress {
                generation: self.generation,
                total_generations,
                generation_best: gen_best,
                avg_fitness: avg,
                best_fitness: self.best_fitness,
                elapsed_seconds: start.elapsed().as_secs_f64(),
                history: self.history.clone(),
            });

            self.step_generation(&ranked);
        }

        let ranked = self.rank();
        let final_avg = ranked.iter().map(|r| r.scores.combined).sum::<f64>() / ranked.len() as f64;
        let best = ranked
            .into_iter()
            .next()
            .expect("population is never empty after initialize");
        self.best_fitness = self.best_fitness.max(best.scores.combined);

        let elapsed = start.elapsed().as_secs_f64();
        let stats = EvolutionStats {
            generations: self.generation,
            total_evaluations: self.total_evaluations,
            best_fitness: self.best_fitness,
            final_avg_fitness: final_avg,
            elapsed_seconds: elapsed,
            evaluations_per_second: if elapsed > 0.0 {
                self.total_evaluations as f64 / elapsed
            } else {
                0.0
            },
            stop_reason,
        };
        info!(
            "Evolution finished after {} generations: best {:.3}",
            stats.generations, best.scores.combined
        );

        EvolutionResult {
            best: best.table,
            best_scores: best.scores,
            stats,
            history: self.history.clone(),
        }
    }

    /// Run evolution without progress reporting.
    pub fn run(&mut self) -> EvolutionResult {
        self.run_with_callback(|_| {})
    }
}
