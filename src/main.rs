//! Picobot CLI - evolve, score and run rule programs.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use picobot::{
    compute::{
        Agent, IngestReport, Position, TableMovePolicy,
        evolution::{EvolutionEngine, FitnessEvaluator},
        load_rule_file,
    },
    schema::{EvaluationConfig, EvolutionConfig, GridConfig},
};

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <command> [args]");
    eprintln!();
    eprintln!("Evolve and evaluate Picobot rule programs.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  evolve <config.json> [out.json]  Run the genetic search");
    eprintln!("  score <rules> [trials] [steps]   Score a rule file (default: 20 trials, 800 steps)");
    eprintln!("  run <rules> [steps]              Simulate one random-start trial (default: 800 steps)");
    eprintln!("  --example                        Print an example evolution config");
    eprintln!();
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <config.json>           Grid and evaluation settings for score and run");
    eprintln!();
    eprintln!("Rule files ending in .json hold rule records; anything else is rule text.");
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let mut args: Vec<String> = std::env::args().collect();
    let config_path = take_config_flag(&mut args);

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--example" => print_example_config(),
        "evolve" if args.len() >= 3 => run_evolve(&args[2], args.get(3)),
        "score" if args.len() >= 3 => {
            let config = load_config(config_path.as_deref());
            run_score(&config, &args[2], args.get(3), args.get(4))
        }
        "run" if args.len() >= 3 => {
            let config = load_config(config_path.as_deref());
            run_single(&config, &args[2], args.get(3))
        }
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

/// Remove `--config <path>` from the arguments, returning the path.
fn take_config_flag(args: &mut Vec<String>) -> Option<String> {
    let pos = args.iter().position(|a| a == "--config")?;
    if pos + 1 >= args.len() {
        args.remove(pos);
        return None;
    }
    let path = args.remove(pos + 1);
    args.remove(pos);
    Some(path)
}

fn read_config(path: &str) -> EvolutionConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn load_config(path: Option<&str>) -> EvolutionConfig {
    let config = path.map(read_config).unwrap_or_default();
    config.grid.validate().unwrap_or_else(|e| {
        eprintln!("Invalid grid: {}", e);
        std::process::exit(1);
    });
    config
}

fn parse_count(arg: Option<&String>, default: usize) -> usize {
    arg.and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn load_rules(path: &str, grid: &GridConfig) -> IngestReport {
    let report = load_rule_file(path, grid.max_states).unwrap_or_else(|e| {
        eprintln!("Error loading rules: {}", e);
        std::process::exit(1);
    });
    if !report.is_clean() {
        println!(
            "Filled {} rule(s) with defaults, skipped {} line(s)",
            report.substitutions.len(),
            report.skipped.len()
        );
    }
    report
}

fn run_evolve(config_path: &str, output: Option<&String>) {
    let config = read_config(config_path);

    let mut engine = EvolutionEngine::new(config.clone()).unwrap_or_else(|e| {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    });

    println!("Picobot Evolution");
    println!("=================");
    println!("Grid: {}x{}", config.grid.rows, config.grid.columns);
    println!(
        "Population: {} for {} generations",
        config.population.size, config.population.max_generations
    );
    println!(
        "Fitness measured using {} trials and {} steps",
        config.evaluation.trials, config.evaluation.steps
    );
    println!();

    let result = engine.run_with_callback(|progress| {
        println!(
            "  Generation {}/{}: avg={:.3}, best={:.3} ({:.1}s)",
            progress.generation + 1,
            progress.total_generations,
            progress.avg_fitness,
            progress.generation_best,
            progress.elapsed_seconds
        );
    });

    println!();
    println!("Best program found:");
    println!("{}", result.best);
    println!();
    println!("{}", result.best_scores);
    println!();
    println!(
        "Stopped: {:?} after {} generations, {} evaluations in {:.2}s ({:.1} evals/s)",
        result.stats.stop_reason,
        result.stats.generations,
        result.stats.total_evaluations,
        result.stats.elapsed_seconds,
        result.stats.evaluations_per_second
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&result.best).unwrap_or_else(|e| {
            eprintln!("Error serializing program: {}", e);
            std::process::exit(1);
        });
        fs::write(PathBuf::from(path), json).unwrap_or_else(|e| {
            eprintln!("Error writing program: {}", e);
            std::process::exit(1);
        });
        println!("Program written to {}", path);
    }
}

fn run_score(
    config: &EvolutionConfig,
    rules_path: &str,
    trials: Option<&String>,
    steps: Option<&String>,
) {
    let grid = config.grid;
    let defaults = &config.evaluation;
    let evaluation = EvaluationConfig {
        trials: parse_count(trials, defaults.trials),
        steps: parse_count(steps, defaults.steps),
    };

    let report = load_rules(rules_path, &grid);
    let evaluator = FitnessEvaluator::new(grid, evaluation).unwrap_or_else(|e| {
        eprintln!("Invalid evaluation settings: {}", e);
        std::process::exit(1);
    });

    let start = Instant::now();
    let scores = evaluator.evaluate(&report.table, &mut rand::thread_rng());
    println!("{}", scores);
    println!("Time: {:.2}s", start.elapsed().as_secs_f32());
}

fn run_single(config: &EvolutionConfig, rules_path: &str, steps: Option<&String>) {
    let grid = &config.grid;
    let steps = parse_count(steps, config.evaluation.steps);
    let report = load_rules(rules_path, grid);

    let mut rng = rand::thread_rng();
    let start = Position::random(grid, &mut rng);
    let mut agent = Agent::new(grid, start).unwrap_or_else(|e| {
        eprintln!("Invalid grid: {}", e);
        std::process::exit(1);
    });

    let Ok(outcome) = agent.run(&mut TableMovePolicy::new(&report.table), steps);

    println!("{}", agent.snapshot().render());
    println!(
        "Start ({}, {}), {:?} after {} steps, visited {} of {} cells ({:.1}%)",
        start.row,
        start.col,
        outcome.stop_reason,
        outcome.steps_taken,
        agent.visit_count(),
        grid.cell_count(),
        agent.coverage() * 100.0
    );
}

fn print_example_config() {
    let config = EvolutionConfig {
        random_seed: Some(42),
        ..Default::default()
    };
    let json = serde_json::to_string_pretty(&config).unwrap_or_else(|e| {
        eprintln!("Error serializing config: {}", e);
        std::process::exit(1);
    });
    println!("{}", json);
}
