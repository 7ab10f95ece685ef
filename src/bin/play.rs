use anyhow::{Context, Result};
use baba_solver::engine::{Direction, GameState, MAX_TURN_COUNT};
use baba_solver::level::Level;
use baba_solver::utils::format_moves;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Play a level from the command line", long_about = None)]
struct Args {
    /// Built-in level to play
    #[clap(short, long, default_value = "floatiest_platforms")]
    level: String,

    /// Path to a TOML level file, used instead of a built-in level
    #[clap(long)]
    level_file: Option<PathBuf>,
}

/// Parses a line such as "r" or "rrdl" into moves.
fn parse_moves(input: &str) -> Option<Vec<Direction>> {
    if input.is_empty() {
        return None;
    }
    input
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(Direction::from_char)
        .collect()
}

fn step(current: &GameState, direction: Direction) -> GameState {
    if usize::from(current.turn()) < MAX_TURN_COUNT {
        return current.apply_move(direction);
    }
    // The state only keeps a bounded history. The full list lives in `main`.
    let mut base = current.clone();
    base.reset_context();
    base.apply_move(direction)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match &args.level_file {
        Some(path) => Level::load(path)
            .with_context(|| format!("Failed to load level from {}", path.display()))?,
        None => Level::builtin(&args.level)?,
    };

    let mut current = level.initial.clone();
    let mut undo_stack: Vec<GameState> = Vec::new();
    let mut moves: Vec<Direction> = Vec::new();
    println!("Welcome to {}!", level.name);

    loop {
        println!("---------------------");
        println!("Moves: {}", moves.len());
        println!("{current}");

        if current.have_won() {
            println!("---------------------");
            println!("🎉 YOU WIN! 🎉");
            println!("Moves ({}): {}", moves.len(), format_moves(&moves));
            println!("---------------------");
            break;
        }
        if !current.all_babas_alive() {
            println!("A Baba fell off the platforms. Enter 'z' to undo.");
        }

        print!("Enter moves (u/r/d/l, e.g. 'rrd'), 'z' to undo, 'q' to quit: ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;
        if read == 0 {
            break;
        }

        match input.trim() {
            "q" => {
                println!("Thanks for playing!");
                break;
            }
            "z" => match undo_stack.pop() {
                Some(previous) => {
                    current = previous;
                    moves.pop();
                    println!("Move undone.");
                }
                None => println!("Nothing to undo."),
            },
            other => match parse_moves(other) {
                Some(directions) => {
                    for direction in directions {
                        let next = step(&current, direction);
                        undo_stack.push(std::mem::replace(&mut current, next));
                        moves.push(direction);
                    }
                }
                None => println!("Invalid input. Use u, r, d or l for moves, 'z' or 'q'."),
            },
        }
    }
    Ok(())
}
