//! # Baba Solver Library
//!
//! This library provides the game logic for a two-Baba level of the puzzle game
//! Baba Is You and a parallel Depth First Search (DFS) solver for it.
//!
//! It is used by two binaries:
//! - `baba_solver`: Loads a level and searches for a sequence of moves that pushes the
//!   key into the door, printing the best state found and the search statistics.
//! - `play`: Allows stepping through a level interactively from the command line.
//!
//! ## Modules
//! - `engine`: Grid cells (`Cell`, `GameObject`), the `Grid`, and `GameState` with the
//!   movement, pushing and "ROCK IS PUSH" rules.
//! - `level`: Built-in levels, TOML level files and the per-level geometry (`LevelRules`).
//! - `heuristics`: Pruning of unwinnable states and scoring of search leaves.
//! - `solver`: `SolverOptions` and the `solve` entry point.
//! - `error`: Error types for level loading and solver configuration.
//! - `utils`: Parsing grids from text layers and formatting numbers and moves.

pub mod engine;
pub mod error;
pub mod heuristics;
pub mod level;
pub mod solver;
pub mod utils;
