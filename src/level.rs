//! Level definitions.
//!
//! A [`Level`] bundles the starting [`GameState`] with its [`LevelRules`]: the
//! hand-analysed regions of the board that decide whether a state can still be won and
//! how promising it looks. That geometry cannot be derived from the grid, so it ships
//! with the level, either built in or from a TOML level file.

use crate::engine::{Coordinate, GameState};
use crate::error::LevelError;
use crate::utils::grid_from_layers;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;

/// An inclusive range of rows or columns, written `[first, last]` in level files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Span(pub u8, pub u8);

impl Span {
    pub fn contains(self, value: u8) -> bool {
        self.0 <= value && value <= self.1
    }

    pub fn range(self) -> RangeInclusive<u8> {
        self.0..=self.1
    }
}

/// An inclusive rectangle of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Rect {
    pub rows: Span,
    pub cols: Span,
}

impl Rect {
    pub const fn new(rows: (u8, u8), cols: (u8, u8)) -> Self {
        Rect {
            rows: Span(rows.0, rows.1),
            cols: Span(cols.0, cols.1),
        }
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        self.rows.contains(coord.row) && self.cols.contains(coord.col)
    }

    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.rows
            .range()
            .flat_map(move |row| self.cols.range().map(move |col| Coordinate::new(row, col)))
    }
}

/// Where the rocks must line up to join two platforms, and where the text has to
/// follow them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Bridge {
    /// Rows in which a bridge can be built.
    pub rows: Span,
    /// Columns the rocks must fill to complete a bridge row.
    pub cols: Span,
    /// Columns, right of the bridge, where aligned text counts.
    pub alignment_cols: Span,
    /// Columns past the far platform. Text pushed in there can no longer change rows.
    pub far_lane_cols: Span,
}

/// Level-specific geometry used for pruning and scoring.
///
/// Empty zone lists impose no constraint and a missing bridge skips the bridge
/// milestones, so `LevelRules::default()` suits small hand-made levels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LevelRules {
    /// The "IS" text must stay inside one of these rectangles.
    pub rule_text_zone: Vec<Rect>,
    /// "ROCK" and "PUSH" text can never leave these rectangles once pushed in.
    pub text_exclusion_zones: Vec<Rect>,
    pub bridge: Option<Bridge>,
}

impl LevelRules {
    /// Geometry of "The Floatiest Platforms".
    pub fn floatiest_platforms() -> Self {
        LevelRules {
            rule_text_zone: vec![
                // Upper right platform.
                Rect::new((3, 7), (10, 14)),
                // The strip to its right.
                Rect::new((3, 7), (15, 17)),
            ],
            text_exclusion_zones: vec![
                Rect::new((0, 2), (10, 17)),
                Rect::new((8, 10), (10, 17)),
                Rect::new((3, 7), (7, 9)),
            ],
            bridge: Some(Bridge {
                rows: Span(3, 7),
                cols: Span(7, 9),
                alignment_cols: Span(10, 17),
                far_lane_cols: Span(15, 17),
            }),
        }
    }
}

/// A named starting state together with its rules.
#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub initial: GameState,
    pub rules: LevelRules,
}

#[derive(Debug, Deserialize)]
struct LevelFile {
    name: String,
    babas: [(u8, u8); 2],
    floor: Vec<String>,
    #[serde(default)]
    objects: Vec<String>,
    #[serde(default)]
    rules: LevelRules,
}

const PLATFORMS_FLOOR: [&str; 18] = [
    "..................",
    "..................",
    "..................",
    "..#####...#####...",
    "..#####...#####...",
    "..#####...#####...",
    "..#####...#####...",
    "..#####...#####...",
    "..................",
    "..........#####...",
    "..#####...#####...",
    "..#####...#####...",
    "..#####...#####...",
    "..#####...#####...",
    "..#####...........",
    "..................",
    "..................",
    "..................",
];

// The immovables stand in for the text blocks around the corners of the level.
const FLOATIEST_PLATFORMS_OBJECTS: [&str; 18] = [
    "XXX....XXX",
    "",
    "",
    "",
    "...R.......123",
    "",
    ".....R.....R",
    "",
    "",
    "",
    "",
    "............K",
    "....D",
    "",
    "",
    "...............XXX",
    "XXX............XXX",
    "XXXX...........XXX",
];

const TEST_LEVEL_OBJECTS: [&str; 13] = [
    "",
    "",
    "",
    "",
    "............2",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
    "...KD",
];

impl Level {
    /// Names accepted by [`Level::builtin`].
    pub const BUILTIN_NAMES: [&'static str; 2] = ["floatiest_platforms", "test_level"];

    /// Looks up a built-in level by name.
    pub fn builtin(name: &str) -> Result<Level, LevelError> {
        match name {
            "floatiest_platforms" => Self::floatiest_platforms(),
            "test_level" => Self::test_level(),
            _ => Err(LevelError::UnknownLevel(name.to_string())),
        }
    }

    /// "The Floatiest Platforms": two Babas on separate platforms must get the key
    /// across to the door.
    pub fn floatiest_platforms() -> Result<Level, LevelError> {
        Self::from_layers(
            "Floatiest Platforms",
            &PLATFORMS_FLOOR,
            &FLOATIEST_PLATFORMS_OBJECTS,
            [(5, 4), (5, 12)],
            LevelRules::floatiest_platforms(),
        )
    }

    /// The same platforms with the key one push away from the door.
    pub fn test_level() -> Result<Level, LevelError> {
        Self::from_layers(
            "Test Level",
            &PLATFORMS_FLOOR,
            &TEST_LEVEL_OBJECTS,
            [(12, 2), (5, 12)],
            LevelRules::floatiest_platforms(),
        )
    }

    /// Parses a level from TOML.
    ///
    /// # Examples
    /// ```
    /// use baba_solver::level::Level;
    ///
    /// let level = Level::from_toml_str(r######"
    ///     name = "Corridor"
    ///     babas = [[0, 0], [0, 0]]
    ///     floor = ["####"]
    ///     objects = [".KD"]
    /// "######).unwrap();
    /// assert_eq!(level.name, "Corridor");
    /// assert!(level.rules.bridge.is_none());
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Level, LevelError> {
        let file: LevelFile = toml::from_str(s)?;
        Self::from_layers(&file.name, &file.floor, &file.objects, file.babas, file.rules)
    }

    /// Loads a level from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Level, LevelError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    fn from_layers<S: AsRef<str>>(
        name: &str,
        floor: &[S],
        objects: &[S],
        babas: [(u8, u8); 2],
        rules: LevelRules,
    ) -> Result<Level, LevelError> {
        let grid = grid_from_layers(floor, objects)?;
        let initial = GameState::new(grid, babas.map(|(row, col)| Coordinate::new(row, col)))?;
        Ok(Level {
            name: name.to_string(),
            initial,
            rules,
        })
    }
}
