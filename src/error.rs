//! Error types for level loading and solver configuration.
//!
//! Only user-supplied input gets a typed error. Broken invariants inside the
//! search (an out-of-bounds grid access, a history overflow) panic instead.

use crate::engine::GameObject;
use thiserror::Error;

/// Errors raised while building a level from files, strings or a grid.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Floor layer is empty")]
    EmptyFloor,

    #[error("Invalid grid size {height}x{width}, each side must be between 1 and {max}")]
    InvalidSize {
        height: usize,
        width: usize,
        max: usize,
    },

    #[error("{layer} row {row} has {found} characters (expected {expected})")]
    RowLength {
        layer: &'static str,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Objects layer has {found} rows but the floor only has {expected}")]
    TooManyRows { expected: usize, found: usize },

    #[error("Unrecognized character '{ch}' in {layer} row {row} col {col}")]
    UnrecognizedChar {
        layer: &'static str,
        ch: char,
        row: usize,
        col: usize,
    },

    #[error("Level has no {0:?}")]
    MissingObject(GameObject),

    #[error("Level has more than one {0:?}")]
    DuplicateObject(GameObject),

    #[error("Baba {index} at ({row}, {col}) is outside the grid")]
    BabaOutOfBounds { index: usize, row: u8, col: u8 },

    #[error("Unknown built-in level '{0}'")]
    UnknownLevel(String),
}

/// Errors raised while loading or validating [`crate::solver::SolverOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
