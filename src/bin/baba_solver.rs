use anyhow::{Context, Result};
use baba_solver::level::Level;
use baba_solver::solver::{solve, SolverOptions};
use baba_solver::utils::format_moves;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Built-in level to solve
    #[clap(short, long, default_value = "floatiest_platforms")]
    level: String,

    /// Path to a TOML level file, used instead of a built-in level
    #[clap(long)]
    level_file: Option<PathBuf>,

    /// Path to a TOML file with solver options
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of iterations
    #[clap(long)]
    iteration_count: Option<u32>,

    /// Depth of the move tree searched per iteration
    #[clap(long)]
    max_turn_depth: Option<u8>,

    /// Depth at which the search fans out into parallel tasks
    #[clap(long)]
    parallelism_depth: Option<u8>,

    /// Deepest turn at which states are cached
    #[clap(long)]
    max_cache_depth: Option<u8>,

    /// Log progress every N simulated moves
    #[clap(long)]
    print_every_n_moves: Option<u64>,

    /// Number of worker threads (default: one per core)
    #[clap(short = 'j', long)]
    threads: Option<usize>,
}

impl Args {
    fn apply_overrides(&self, options: &mut SolverOptions) {
        if let Some(n) = self.iteration_count {
            options.iteration_count = n;
        }
        if let Some(n) = self.max_turn_depth {
            options.max_turn_depth = n;
        }
        if let Some(n) = self.parallelism_depth {
            options.parallelism_depth = n;
        }
        if let Some(n) = self.max_cache_depth {
            options.max_cache_depth = n;
        }
        if let Some(n) = self.print_every_n_moves {
            options.print_every_n_moves = n;
        }
        if self.threads.is_some() {
            options.thread_count = self.threads;
        }
    }

    fn load_level(&self) -> Result<Level> {
        match &self.level_file {
            Some(path) => Level::load(path)
                .with_context(|| format!("Failed to load level from {}", path.display())),
            None => Level::builtin(&self.level).with_context(|| {
                format!("Available levels: {}", Level::BUILTIN_NAMES.join(", "))
            }),
        }
    }
}

fn print_options(options: &SolverOptions) {
    println!("  Iteration count: {}", options.iteration_count);
    println!("  Max move depth: {}", options.max_turn_depth);
    println!("  Parallelism depth: {}", options.parallelism_depth);
    println!("  Max cache depth: {}", options.max_cache_depth);
    match options.thread_count {
        Some(threads) => println!("  Threads: {threads}"),
        None => println!("  Threads: one per core"),
    }
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("baba_solver=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let level = args.load_level()?;
    let mut options = match &args.config {
        Some(path) => SolverOptions::load(path)
            .with_context(|| format!("Failed to load solver options from {}", path.display()))?,
        None => SolverOptions::default(),
    };
    args.apply_overrides(&mut options);

    println!("Solving level \"{}\" with the following config options:", level.name);
    print_options(&options);
    println!("\nInitial state:\n{}\n", level.initial);

    let solution =
        solve(&level.initial, &level.rules, &options).context("Invalid solver options")?;

    for report in &solution.iterations {
        let outcome = if report.won { "won" } else { "no win" };
        println!(
            "\nIteration {} ({outcome}, score {}):",
            report.iteration, report.best_score
        );
        println!("{}", report.stats);
    }

    println!("\n~~~ RESULTS ~~~");
    if solution.won {
        println!("WIN!!! Winning state:");
    } else {
        println!("Did not win... Best state reached:");
    }
    println!("{}", solution.state);
    println!(
        "Moves ({}): {}",
        solution.moves.len(),
        format_moves(&solution.moves)
    );
    Ok(())
}
