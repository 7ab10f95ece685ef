//! Core game engine for the Baba Is You solver.
//!
//! This module defines the game's fundamental components:
//! - `GameObject` and `Cell`: the entity categories and the per-cell bitmask holding them.
//! - `Grid`: the level-sized 2D array of cells.
//! - `GameState`: one immutable snapshot of a level (grid, both Babas, turn and move
//!   history) together with the movement and pushing rules that derive the next snapshot.
//! - `StateHasher`: a pass-through hasher for the solver's visited-state cache.
use crate::error::LevelError;
use std::fmt;
use std::hash::{BuildHasherDefault, Hash, Hasher};

/// Maximum number of moves a single state can record in its history.
///
/// The solver resets the history at the start of every iteration, so this bounds the
/// depth of one iteration, not the length of a whole solution.
pub const MAX_TURN_COUNT: usize = 64;

/// Largest supported grid side. Coordinates are stored as `u8` and `0xFF` is reserved
/// for dead Babas when hashing.
pub const MAX_GRID_SIZE: usize = u8::MAX as usize;

/// The entity categories that can occupy a grid cell.
///
/// Each variant owns exactly one bit of a [`Cell`]. Babas are tracked outside the grid,
/// but their bit stays reserved so the assignment never shifts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameObject {
    Baba,
    Immovable,
    Tile,
    Rock,
    Door,
    Key,
    RockText,
    IsText,
    PushText,
}

impl GameObject {
    /// Every category, in bit order.
    pub const ALL: [GameObject; 9] = [
        GameObject::Baba,
        GameObject::Immovable,
        GameObject::Tile,
        GameObject::Rock,
        GameObject::Door,
        GameObject::Key,
        GameObject::RockText,
        GameObject::IsText,
        GameObject::PushText,
    ];

    /// Returns the bit this category occupies in a [`Cell`].
    pub const fn bit(self) -> u16 {
        1 << self as u16
    }

    /// Converts the object to its character representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use baba_solver::engine::GameObject;
    /// assert_eq!(GameObject::Key.to_char(), 'K');
    /// assert_eq!(GameObject::Tile.to_char(), '#');
    /// ```
    pub fn to_char(self) -> char {
        match self {
            GameObject::Baba => 'B',
            GameObject::Immovable => 'X',
            GameObject::Tile => '#',
            GameObject::Rock => 'R',
            GameObject::Door => 'D',
            GameObject::Key => 'K',
            GameObject::RockText => '1',
            GameObject::IsText => '2',
            GameObject::PushText => '3',
        }
    }

    /// Parses a grid object character. Babas are not grid objects, so `'B'` is rejected.
    pub fn from_char(ch: char) -> Option<GameObject> {
        match ch {
            'X' => Some(GameObject::Immovable),
            '#' => Some(GameObject::Tile),
            'R' => Some(GameObject::Rock),
            'D' => Some(GameObject::Door),
            'K' => Some(GameObject::Key),
            '1' => Some(GameObject::RockText),
            '2' => Some(GameObject::IsText),
            '3' => Some(GameObject::PushText),
            _ => None,
        }
    }
}

/// Objects that are pushed regardless of the "ROCK IS PUSH" rule.
const ALWAYS_MOVABLE_OBJECTS: [GameObject; 4] = [
    GameObject::Key,
    GameObject::RockText,
    GameObject::IsText,
    GameObject::PushText,
];

const ALWAYS_MOVABLE_MASK: u16 = GameObject::Key.bit()
    | GameObject::RockText.bit()
    | GameObject::IsText.bit()
    | GameObject::PushText.bit();

// Highest priority first when a cell holds several objects.
const DISPLAY_PRIORITY: [GameObject; 8] = [
    GameObject::Immovable,
    GameObject::Key,
    GameObject::Door,
    GameObject::Rock,
    GameObject::PushText,
    GameObject::IsText,
    GameObject::RockText,
    GameObject::Tile,
];

/// A bitmask of the [`GameObject`]s present in one grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cell(u16);

impl Cell {
    pub const EMPTY: Cell = Cell(0);

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns `true` if nothing is in the cell. Babas are not considered.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, obj: GameObject) -> bool {
        self.0 & obj.bit() != 0
    }

    pub fn without(self, obj: GameObject) -> Cell {
        Cell(self.0 & !obj.bit())
    }

    pub fn insert(&mut self, obj: GameObject) {
        self.0 |= obj.bit();
    }

    pub fn remove(&mut self, obj: GameObject) {
        self.0 &= !obj.bit();
    }

    /// Returns `true` if the cell holds something a Baba would have to push.
    /// Rocks only count while "ROCK IS PUSH" is active.
    pub fn contains_movable(self, rock_is_push_active: bool) -> bool {
        self.0 & ALWAYS_MOVABLE_MASK != 0
            || (rock_is_push_active && self.contains(GameObject::Rock))
    }

    fn display_char(self) -> char {
        DISPLAY_PRIORITY
            .iter()
            .find(|obj| self.contains(**obj))
            .map_or(' ', |obj| obj.to_char())
    }
}

/// A (row, column) position on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub row: u8,
    pub col: u8,
}

impl Coordinate {
    pub const fn new(row: u8, col: u8) -> Self {
        Coordinate { row, col }
    }

    pub fn manhattan_distance(self, other: Coordinate) -> u32 {
        u32::from(self.row.abs_diff(other.row)) + u32::from(self.col.abs_diff(other.col))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One of the four moves the player can make. Both Babas receive the same move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Row and column offsets of one step in this direction.
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Direction::Up => 'U',
            Direction::Right => 'R',
            Direction::Down => 'D',
            Direction::Left => 'L',
        }
    }

    /// Parses `U`, `R`, `D` or `L` (either case).
    pub fn from_char(ch: char) -> Option<Direction> {
        match ch.to_ascii_uppercase() {
            'U' => Some(Direction::Up),
            'R' => Some(Direction::Right),
            'D' => Some(Direction::Down),
            'L' => Some(Direction::Left),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// The level grid, stored row-major. Its dimensions never change after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    height: u8,
    width: u8,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates a grid of empty cells.
    ///
    /// # Errors
    /// Returns [`LevelError::InvalidSize`] if either side is zero or larger than
    /// [`MAX_GRID_SIZE`].
    ///
    /// # Examples
    /// ```
    /// use baba_solver::engine::{Coordinate, GameObject, Grid};
    /// let mut grid = Grid::new(3, 4).unwrap();
    /// grid.insert(Coordinate::new(1, 2), GameObject::Tile);
    /// assert!(grid.get(Coordinate::new(1, 2)).contains(GameObject::Tile));
    /// assert!(grid.get(Coordinate::new(0, 0)).is_empty());
    /// ```
    pub fn new(height: usize, width: usize) -> Result<Self, LevelError> {
        if height == 0 || width == 0 || height > MAX_GRID_SIZE || width > MAX_GRID_SIZE {
            return Err(LevelError::InvalidSize {
                height,
                width,
                max: MAX_GRID_SIZE,
            });
        }
        Ok(Grid {
            height: height as u8,
            width: width as u8,
            cells: vec![Cell::EMPTY; height * width],
        })
    }

    pub fn height(&self) -> usize {
        usize::from(self.height)
    }

    pub fn width(&self) -> usize {
        usize::from(self.width)
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.row < self.height && coord.col < self.width
    }

    /// Returns the neighbouring coordinate in `direction`, or `None` at the grid edge.
    pub fn neighbor(&self, coord: Coordinate, direction: Direction) -> Option<Coordinate> {
        let (delta_row, delta_col) = direction.delta();
        let row = coord.row.checked_add_signed(delta_row)?;
        let col = coord.col.checked_add_signed(delta_col)?;
        let next = Coordinate::new(row, col);
        self.contains(next).then_some(next)
    }

    /// Returns the cell at `coord`.
    ///
    /// # Panics
    /// Panics if `coord` is outside the grid.
    pub fn get(&self, coord: Coordinate) -> Cell {
        self.cells[self.index(coord)]
    }

    /// # Panics
    /// Panics if `coord` is outside the grid.
    pub fn get_mut(&mut self, coord: Coordinate) -> &mut Cell {
        let index = self.index(coord);
        &mut self.cells[index]
    }

    pub fn insert(&mut self, coord: Coordinate, obj: GameObject) {
        self.get_mut(coord).insert(obj);
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Iterates over every coordinate in row-major order.
    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| Coordinate::new(row, col)))
    }

    /// Counts the cells containing `obj`.
    pub fn count(&self, obj: GameObject) -> usize {
        self.cells.iter().filter(|cell| cell.contains(obj)).count()
    }

    fn index(&self, coord: Coordinate) -> usize {
        assert!(
            self.contains(coord),
            "grid access at {coord} outside {}x{} grid",
            self.height,
            self.width
        );
        usize::from(coord.row) * self.width() + usize::from(coord.col)
    }

    fn find_unique(&self, obj: GameObject) -> Result<Option<Coordinate>, LevelError> {
        let mut found = None;
        for coord in self.coordinates() {
            if self.get(coord).contains(obj) {
                if found.is_some() {
                    return Err(LevelError::DuplicateObject(obj));
                }
                found = Some(coord);
            }
        }
        Ok(found)
    }
}

/// One snapshot of a level.
///
/// States are derived from their parent with [`GameState::apply_move`] and never change
/// afterwards, so the solver shares them between search branches behind `Arc`s.
///
/// Equality and hashing only look at the Babas and the grid. Two states reached by
/// different paths, or after a different number of turns, are the same state.
#[derive(Clone, Debug)]
pub struct GameState {
    grid: Grid,
    babas: [Option<Coordinate>; 2],
    door: Coordinate,
    // Derived from the grid, refreshed whenever the objects move.
    key: Coordinate,
    is_text: Option<Coordinate>,
    rock_is_push_active: bool,
    turn: u8,
    moves: [Direction; MAX_TURN_COUNT],
}

impl GameState {
    /// Creates the initial state of a level.
    ///
    /// The grid must hold exactly one door, exactly one key and at most one "IS" text,
    /// and both Babas must be inside the grid. A Baba placed on an empty cell starts dead.
    ///
    /// # Errors
    /// Returns a [`LevelError`] describing the first violated requirement.
    ///
    /// # Examples
    /// ```
    /// use baba_solver::engine::{Coordinate, GameObject, GameState, Grid};
    /// let mut grid = Grid::new(3, 3).unwrap();
    /// for coord in grid.coordinates().collect::<Vec<_>>() {
    ///     grid.insert(coord, GameObject::Tile);
    /// }
    /// grid.insert(Coordinate::new(1, 1), GameObject::Door);
    /// grid.insert(Coordinate::new(1, 1), GameObject::Key);
    /// let state = GameState::new(grid, [Coordinate::new(0, 0), Coordinate::new(2, 2)]).unwrap();
    /// assert!(state.have_won());
    /// ```
    pub fn new(grid: Grid, babas: [Coordinate; 2]) -> Result<Self, LevelError> {
        for (index, baba) in babas.iter().enumerate() {
            if !grid.contains(*baba) {
                return Err(LevelError::BabaOutOfBounds {
                    index,
                    row: baba.row,
                    col: baba.col,
                });
            }
        }
        let door = grid
            .find_unique(GameObject::Door)?
            .ok_or(LevelError::MissingObject(GameObject::Door))?;
        let key = grid
            .find_unique(GameObject::Key)?
            .ok_or(LevelError::MissingObject(GameObject::Key))?;
        let is_text = grid.find_unique(GameObject::IsText)?;

        let mut state = GameState {
            grid,
            babas: babas.map(Some),
            door,
            key,
            is_text,
            rock_is_push_active: false,
            turn: 0,
            moves: [Direction::Up; MAX_TURN_COUNT],
        };
        state.recalculate_state();
        Ok(state)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Both Babas; `None` marks a Baba that fell off the platforms.
    pub fn babas(&self) -> [Option<Coordinate>; 2] {
        self.babas
    }

    pub fn door(&self) -> Coordinate {
        self.door
    }

    pub fn key(&self) -> Coordinate {
        self.key
    }

    pub fn is_text(&self) -> Option<Coordinate> {
        self.is_text
    }

    pub fn rock_is_push_active(&self) -> bool {
        self.rock_is_push_active
    }

    /// Number of moves applied since the last [`GameState::reset_context`].
    pub fn turn(&self) -> u8 {
        self.turn
    }

    /// The moves applied since the last [`GameState::reset_context`], oldest first.
    pub fn moves(&self) -> &[Direction] {
        &self.moves[..usize::from(self.turn)]
    }

    /// Clears the turn counter and the move history, keeping the board.
    pub fn reset_context(&mut self) {
        self.turn = 0;
        self.moves = [Direction::Up; MAX_TURN_COUNT];
    }

    /// Returns a new state with `direction` applied to both Babas.
    ///
    /// `self` is left untouched. A Baba that is dead, would leave the grid, or is blocked
    /// by its push chain stays where it is.
    ///
    /// # Panics
    /// Panics if the move history already holds [`MAX_TURN_COUNT`] moves.
    pub fn apply_move(&self, direction: Direction) -> GameState {
        let turn = usize::from(self.turn);
        assert!(
            turn < MAX_TURN_COUNT,
            "move history is full ({MAX_TURN_COUNT} turns)"
        );

        let mut next = self.clone();
        for index in 0..next.babas.len() {
            next.babas[index] = next.move_baba(next.babas[index], direction);
        }
        next.recalculate_state();
        next.moves[turn] = direction;
        next.turn += 1;
        next
    }

    /// Returns `true` if the key sits on the door.
    pub fn have_won(&self) -> bool {
        self.grid.get(self.door).contains(GameObject::Key)
    }

    pub fn all_babas_alive(&self) -> bool {
        self.babas.iter().all(Option::is_some)
    }

    /// Returns `true` if both Babas are alive and on the same cell.
    pub fn babas_on_same_space(&self) -> bool {
        match self.babas {
            [Some(first), Some(second)] => first == second,
            _ => false,
        }
    }

    /// Hash of the Babas and every cell, ignoring the turn and the move history.
    pub fn state_hash(&self) -> u64 {
        let [first, second] = self.babas.map(pack_coordinate);
        let babas = (u32::from(first) << 16) | u32::from(second);
        self.grid
            .cells()
            .iter()
            .fold(apply_hash(babas, 0), |hash, cell| {
                apply_hash(u32::from(cell.bits()), hash)
            })
    }

    fn move_baba(&mut self, baba: Option<Coordinate>, direction: Direction) -> Option<Coordinate> {
        let baba = baba?;
        let Some(target) = self.grid.neighbor(baba, direction) else {
            return Some(baba);
        };
        // A Baba standing on the key never pushes it, hence the empty previous cell.
        if self.check_cell_and_move_objects(target, direction, Cell::EMPTY) {
            Some(target)
        } else {
            Some(baba)
        }
    }

    /// Returns whether something can enter `coord` from `prev_cell`, pushing whatever is
    /// movable further along `direction` when it can.
    fn check_cell_and_move_objects(
        &mut self,
        coord: Coordinate,
        direction: Direction,
        prev_cell: Cell,
    ) -> bool {
        let cell = self.grid.get(coord);
        if cell.contains(GameObject::Immovable) {
            return false;
        }
        if cell.contains(GameObject::Door) {
            // The key on its own can be pushed into the door. That is the winning move.
            return prev_cell.contains(GameObject::Key)
                && !prev_cell
                    .without(GameObject::Key)
                    .contains_movable(self.rock_is_push_active);
        }
        if !cell.contains_movable(self.rock_is_push_active) {
            return true;
        }

        let Some(next) = self.grid.neighbor(coord, direction) else {
            return false;
        };
        if !self.check_cell_and_move_objects(next, direction, cell) {
            return false;
        }

        for obj in ALWAYS_MOVABLE_OBJECTS {
            if !self.grid.get(coord).contains(obj) {
                continue;
            }
            self.grid.get_mut(coord).remove(obj);
            self.grid.insert(next, obj);
            match obj {
                GameObject::IsText => self.is_text = Some(next),
                GameObject::Key => self.key = next,
                _ => {}
            }
        }
        if self.rock_is_push_active && cell.contains(GameObject::Rock) {
            self.grid.get_mut(coord).remove(GameObject::Rock);
            self.grid.insert(next, GameObject::Rock);
        }
        true
    }

    fn recalculate_state(&mut self) {
        // Babas sharing a cell hold each other up.
        if !self.babas_on_same_space() {
            let grid = &self.grid;
            for baba in self.babas.iter_mut() {
                if baba.is_some_and(|coord| grid.get(coord).is_empty()) {
                    *baba = None;
                }
            }
        }
        self.rock_is_push_active = self.check_rock_is_push_intact();
    }

    fn check_rock_is_push_intact(&self) -> bool {
        let Some(is_text) = self.is_text else {
            return false;
        };
        let rule_along = |before: Direction, after: Direction| {
            match (
                self.grid.neighbor(is_text, before),
                self.grid.neighbor(is_text, after),
            ) {
                (Some(first), Some(last)) => {
                    self.grid.get(first).contains(GameObject::RockText)
                        && self.grid.get(last).contains(GameObject::PushText)
                }
                _ => false,
            }
        };
        rule_along(Direction::Up, Direction::Down) || rule_along(Direction::Left, Direction::Right)
    }
}

impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        self.babas == other.babas && self.grid == other.grid
    }
}

impl Eq for GameState {}

impl Hash for GameState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.state_hash());
    }
}

impl fmt::Display for GameState {
    /// Draws the grid framed by `X`, with Babas shown as `B`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let perimeter = "X".repeat(self.grid.width() + 2);
        writeln!(f, "{perimeter}")?;
        for row in 0..self.grid.height {
            write!(f, "X")?;
            for col in 0..self.grid.width {
                let coord = Coordinate::new(row, col);
                let ch = if self.babas.contains(&Some(coord)) {
                    GameObject::Baba.to_char()
                } else {
                    self.grid.get(coord).display_char()
                };
                write!(f, "{ch}")?;
            }
            writeln!(f, "X")?;
        }
        write!(f, "{perimeter}")
    }
}

fn pack_coordinate(coord: Option<Coordinate>) -> u16 {
    coord.map_or(u16::MAX, |c| (u16::from(c.row) << 8) | u16::from(c.col))
}

fn apply_hash(mut value: u32, hash: u64) -> u64 {
    value = ((value >> 16) ^ value).wrapping_mul(0x045d_9f3b);
    value = ((value >> 16) ^ value).wrapping_mul(0x045d_9f3b);
    value ^= value >> 16;
    hash ^ u64::from(value)
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(hash << 6)
        .wrapping_add(hash >> 2)
}

/// Hasher that keeps the precomputed [`GameState::state_hash`] as is.
#[derive(Default)]
pub struct StateHasher(u64);

impl Hasher for StateHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = apply_hash(u32::from(byte), self.0);
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 ^= n;
    }
}

pub type StateHashBuilder = BuildHasherDefault<StateHasher>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::utils::grid_from_layers;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    fn state(floor: &[&str], objects: &[&str], babas: [(u8, u8); 2]) -> GameState {
        let grid = grid_from_layers(floor, objects).unwrap();
        GameState::new(grid, babas.map(|(row, col)| Coordinate::new(row, col))).unwrap()
    }

    fn coord(row: u8, col: u8) -> Option<Coordinate> {
        Some(Coordinate::new(row, col))
    }

    fn object_counts(state: &GameState) -> Vec<usize> {
        GameObject::ALL
            .iter()
            .map(|obj| state.grid().count(*obj))
            .collect()
    }

    #[test]
    fn test_object_bits_are_distinct() {
        let mut seen = 0u16;
        for obj in GameObject::ALL {
            assert_eq!(obj.bit().count_ones(), 1);
            assert_eq!(seen & obj.bit(), 0, "{obj:?} reuses a bit");
            seen |= obj.bit();
        }
        assert_eq!(seen.count_ones(), 9);
    }

    #[test]
    fn test_cell_operations() {
        let mut cell = Cell::EMPTY;
        cell.insert(GameObject::Tile);
        cell.insert(GameObject::Key);
        assert!(cell.contains(GameObject::Key));
        assert!(!cell.contains(GameObject::Rock));
        assert!(cell.contains_movable(false));
        assert!(!cell.without(GameObject::Key).contains_movable(true));

        let mut rock = Cell::EMPTY;
        rock.insert(GameObject::Rock);
        assert!(rock.contains_movable(true));
        assert!(!rock.contains_movable(false));
        rock.remove(GameObject::Rock);
        assert!(rock.is_empty());
        assert!(cell.without(GameObject::Tile).without(GameObject::Key).is_empty());
    }

    #[test]
    fn test_direction_chars() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_char(direction.to_char()), Some(direction));
        }
        assert_eq!(Direction::from_char('l'), Some(Direction::Left));
        assert_eq!(Direction::from_char('x'), None);
    }

    #[test]
    fn test_new_rejects_malformed_levels() {
        let no_door = grid_from_layers(&["###"], &["K.."]).unwrap();
        assert!(matches!(
            GameState::new(no_door, [Coordinate::new(0, 1), Coordinate::new(0, 2)]),
            Err(LevelError::MissingObject(GameObject::Door))
        ));

        let two_keys = grid_from_layers(&["####"], &["KDK."]).unwrap();
        assert!(matches!(
            GameState::new(two_keys, [Coordinate::new(0, 3), Coordinate::new(0, 3)]),
            Err(LevelError::DuplicateObject(GameObject::Key))
        ));

        let grid = grid_from_layers(&["###"], &["KD."]).unwrap();
        assert!(matches!(
            GameState::new(grid, [Coordinate::new(0, 2), Coordinate::new(1, 0)]),
            Err(LevelError::BabaOutOfBounds { index: 1, .. })
        ));
    }

    #[test]
    fn test_move_out_of_bounds_is_noop() {
        let initial = state(&["###", "###", "###"], &["", "", "DK."], [(0, 0), (0, 2)]);
        let next = initial.apply_move(Direction::Up);
        assert_eq!(next.babas(), [coord(0, 0), coord(0, 2)]);
        assert_eq!(next.turn(), 1);
        assert_eq!(next.moves(), &[Direction::Up]);
        assert_eq!(initial.turn(), 0, "input state must not change");
    }

    #[test]
    fn test_blocked_push_is_noop() {
        // "ROCK IS PUSH" is formed horizontally on the second row.
        let initial = state(&["#####", "#####"], &[".RX..", "123DK"], [(0, 0), (0, 4)]);
        assert!(initial.rock_is_push_active());

        let next = initial.apply_move(Direction::Right);
        assert_eq!(next, initial);
        assert_eq!(next.grid(), initial.grid());
        assert_eq!(next.babas(), initial.babas());
    }

    #[test]
    fn test_rock_pushed_only_while_rule_is_active() {
        let active = state(&["#####", "#####"], &[".R...", "123DK"], [(0, 0), (1, 4)]);
        let pushed = active.apply_move(Direction::Right);
        assert_eq!(pushed.babas()[0], coord(0, 1));
        assert!(pushed.grid().get(Coordinate::new(0, 2)).contains(GameObject::Rock));
        assert!(!pushed.grid().get(Coordinate::new(0, 1)).contains(GameObject::Rock));

        let inactive = state(&["#####", "#####"], &[".R...", "1..DK"], [(0, 0), (1, 4)]);
        assert!(!inactive.rock_is_push_active());
        let walked = inactive.apply_move(Direction::Right);
        assert_eq!(walked.babas()[0], coord(0, 1));
        assert!(walked.grid().get(Coordinate::new(0, 1)).contains(GameObject::Rock));
    }

    #[test]
    fn test_push_chain_moves_every_object() {
        let initial = state(&["######", "######"], &[".1K2..", ".....D"], [(0, 0), (1, 0)]);
        let before = object_counts(&initial);

        let next = initial.apply_move(Direction::Right);
        assert_eq!(next.babas(), [coord(0, 1), coord(1, 1)]);
        assert!(next.grid().get(Coordinate::new(0, 2)).contains(GameObject::RockText));
        assert!(next.grid().get(Coordinate::new(0, 3)).contains(GameObject::Key));
        assert!(next.grid().get(Coordinate::new(0, 4)).contains(GameObject::IsText));
        assert_eq!(next.key(), Coordinate::new(0, 3));
        assert_eq!(next.is_text(), Some(Coordinate::new(0, 4)));
        assert_eq!(object_counts(&next), before);
    }

    #[test]
    fn test_push_chain_blocked_by_edge() {
        let initial = state(&["###", "###"], &[".K1", "D.."], [(0, 0), (1, 2)]);
        let next = initial.apply_move(Direction::Right);
        assert_eq!(next, initial);
    }

    #[test]
    fn test_key_pushed_into_door_wins() {
        let initial = state(&["####", "####"], &[".KD.", ""], [(0, 0), (1, 0)]);
        assert!(!initial.have_won());

        let next = initial.apply_move(Direction::Right);
        assert!(next.have_won());
        assert_eq!(next.key(), next.door());
        assert_eq!(next.babas(), [coord(0, 1), coord(1, 1)]);
    }

    #[test]
    fn test_key_with_text_cannot_enter_door() {
        let mut grid = grid_from_layers(&["####", "####"], &[".KD.", ""]).unwrap();
        grid.insert(Coordinate::new(0, 1), GameObject::PushText);
        let initial = GameState::new(grid, [Coordinate::new(0, 0), Coordinate::new(1, 3)]).unwrap();

        let next = initial.apply_move(Direction::Right);
        assert!(!next.have_won());
        assert_eq!(next.babas()[0], coord(0, 0));
    }

    #[test]
    fn test_door_blocks_babas() {
        let initial = state(&["###", "###"], &[".D.", "..K"], [(0, 0), (1, 0)]);
        let next = initial.apply_move(Direction::Right);
        assert_eq!(next.babas(), [coord(0, 0), coord(1, 1)]);
    }

    #[test]
    fn test_win_is_local_to_the_door() {
        let initial = state(&["###", "###", "###"], &["", ".DK", ""], [(0, 0), (2, 2)]);
        assert!(!initial.have_won());

        let mut grid = grid_from_layers(&["###", "###", "###"], &["", ".D.", ""]).unwrap();
        grid.insert(Coordinate::new(1, 1), GameObject::Key);
        let won = GameState::new(grid, [Coordinate::new(0, 0), Coordinate::new(2, 2)]).unwrap();
        assert!(won.have_won());
    }

    #[test]
    fn test_baba_falls_off_and_stays_dead() {
        let initial = state(&["##.", "#..", "..."], &["", "", "DK."], [(0, 0), (1, 0)]);
        let first = initial.apply_move(Direction::Right);
        assert_eq!(first.babas(), [coord(0, 1), None]);
        assert!(!first.all_babas_alive());

        let second = first.apply_move(Direction::Right);
        assert_eq!(second.babas(), [None, None]);

        let third = second.apply_move(Direction::Left);
        assert_eq!(third.babas(), [None, None]);
        assert!(!third.babas_on_same_space());
    }

    #[test]
    fn test_babas_on_same_space_do_not_fall() {
        let initial = state(&["##.", "..."], &["", "DK"], [(0, 1), (0, 1)]);
        assert!(initial.babas_on_same_space());
        let next = initial.apply_move(Direction::Right);
        assert_eq!(next.babas(), [coord(0, 2), coord(0, 2)]);
        assert!(next.all_babas_alive());
    }

    #[test]
    fn test_rule_recomputed_after_is_text_moves() {
        // "ROCK IS PUSH" reads top to bottom in column 1.
        let initial = state(&["####", "####", "####"], &[".1.K", ".2.D", ".3.."], [(1, 0), (2, 3)]);
        assert!(initial.rock_is_push_active());

        let next = initial.apply_move(Direction::Right);
        assert_eq!(next.is_text(), Some(Coordinate::new(1, 2)));
        assert!(!next.rock_is_push_active());
    }

    #[test]
    fn test_hash_and_eq_ignore_turn_and_moves() {
        let initial = state(&["#####", "#####", "#####"], &["", "", "DK..."], [(1, 1), (1, 3)]);
        let returned = initial
            .apply_move(Direction::Right)
            .apply_move(Direction::Left);
        assert_eq!(returned.turn(), 2);
        assert_eq!(returned, initial);
        assert_eq!(returned.state_hash(), initial.state_hash());

        let mut seen: HashMap<GameState, u8, StateHashBuilder> = HashMap::default();
        seen.insert(initial.clone(), 0);
        assert_eq!(seen.get(&returned), Some(&0));

        let moved = initial.apply_move(Direction::Up);
        assert_ne!(moved, initial);
        assert_ne!(moved.state_hash(), initial.state_hash());
    }

    #[test]
    fn test_reset_context_keeps_board() {
        let initial = state(&["###", "###"], &["", "DK."], [(0, 0), (0, 1)]);
        let mut next = initial.apply_move(Direction::Right);
        let board = next.grid().clone();
        next.reset_context();
        assert_eq!(next.turn(), 0);
        assert!(next.moves().is_empty());
        assert_eq!(next.grid(), &board);
    }

    #[test]
    fn test_display_frames_grid() {
        let initial = state(&["###", "#.#"], &["", "DK."], [(0, 0), (0, 0)]);
        let display = initial.to_string();
        let lines: Vec<&str> = display.lines().collect();
        assert_eq!(lines, vec!["XXXXX", "XB##X", "XDK#X", "XXXXX"]);
    }

    #[test]
    fn test_random_walks_conserve_objects_and_keep_dead_babas_dead() {
        let level = Level::floatiest_platforms().unwrap();
        let counts = object_counts(&level.initial);

        for seed in 0..8 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut current = level.initial.clone();
            for step in 0..300 {
                if step % 60 == 0 {
                    current.reset_context();
                }
                let direction = Direction::ALL[rng.gen_range(0..4)];
                let next = current.apply_move(direction);

                for (before, after) in current.babas().iter().zip(next.babas().iter()) {
                    if before.is_none() {
                        assert!(after.is_none(), "seed {seed}: a dead Baba came back");
                    }
                }
                assert_eq!(object_counts(&next), counts, "seed {seed}: objects changed");
                current = next;
            }
        }
    }
}
