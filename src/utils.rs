use crate::engine::{Coordinate, Direction, GameObject, Grid};
use crate::error::LevelError;
use num_format::{Locale, ToFormattedString};

/// Parses a floor layer and an object layer into a [`Grid`].
///
/// The floor layer defines the grid size: every floor row must have the same number of
/// characters. `'#'` is a tile and `'.'` is empty space.
///
/// The object layer holds at most one object per cell. It may have fewer rows than the
/// floor, and rows may be shorter than the floor width; missing cells hold no object.
/// Valid characters are:
/// - `'X'`: [`GameObject::Immovable`]
/// - `'R'`: [`GameObject::Rock`]
/// - `'D'`: [`GameObject::Door`]
/// - `'K'`: [`GameObject::Key`]
/// - `'1'`, `'2'`, `'3'`: [`GameObject::RockText`], [`GameObject::IsText`], [`GameObject::PushText`]
/// - `'.'`: nothing
///
/// # Examples
/// ```
/// use baba_solver::engine::{Coordinate, GameObject};
/// use baba_solver::utils::grid_from_layers;
///
/// let grid = grid_from_layers(&["##.", "###"], &[".K", "D"]).unwrap();
/// assert_eq!(grid.height(), 2);
/// assert_eq!(grid.width(), 3);
/// assert!(grid.get(Coordinate::new(0, 1)).contains(GameObject::Key));
/// assert!(grid.get(Coordinate::new(0, 1)).contains(GameObject::Tile));
/// assert!(grid.get(Coordinate::new(0, 2)).is_empty());
/// assert!(grid.get(Coordinate::new(1, 0)).contains(GameObject::Door));
///
/// assert!(grid_from_layers(&["##", "#"], &[]).is_err());
/// assert!(grid_from_layers(&["##"], &["Z"]).is_err());
/// ```
pub fn grid_from_layers<S: AsRef<str>>(floor: &[S], objects: &[S]) -> Result<Grid, LevelError> {
    let width = floor
        .first()
        .map(|row| row.as_ref().chars().count())
        .ok_or(LevelError::EmptyFloor)?;
    let mut grid = Grid::new(floor.len(), width)?;

    for (r, row_str) in floor.iter().enumerate() {
        let row_str = row_str.as_ref();
        let found = row_str.chars().count();
        if found != width {
            return Err(LevelError::RowLength {
                layer: "floor",
                row: r,
                expected: width,
                found,
            });
        }
        for (c, ch) in row_str.chars().enumerate() {
            match ch {
                '#' => grid.insert(Coordinate::new(r as u8, c as u8), GameObject::Tile),
                '.' => {}
                _ => {
                    return Err(LevelError::UnrecognizedChar {
                        layer: "floor",
                        ch,
                        row: r,
                        col: c,
                    })
                }
            }
        }
    }

    if objects.len() > grid.height() {
        return Err(LevelError::TooManyRows {
            expected: grid.height(),
            found: objects.len(),
        });
    }
    for (r, row_str) in objects.iter().enumerate() {
        let row_str = row_str.as_ref();
        let found = row_str.chars().count();
        if found > width {
            return Err(LevelError::RowLength {
                layer: "objects",
                row: r,
                expected: width,
                found,
            });
        }
        for (c, ch) in row_str.chars().enumerate() {
            if ch == '.' {
                continue;
            }
            let obj = GameObject::from_char(ch)
                .filter(|obj| *obj != GameObject::Tile)
                .ok_or(LevelError::UnrecognizedChar {
                    layer: "objects",
                    ch,
                    row: r,
                    col: c,
                })?;
            grid.insert(Coordinate::new(r as u8, c as u8), obj);
        }
    }
    Ok(grid)
}

/// Formats the given number with a suffix, e.g. 10,000,000 -> "10M".
pub fn format_with_suffix(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{}B", n / 1_000_000_000)
    } else if n >= 1_000_000 {
        format!("{}M", n / 1_000_000)
    } else if n >= 1_000 {
        format!("{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

/// Formats the given number with commas, e.g. 10000000 -> "10,000,000".
pub fn format_with_commas(n: u64) -> String {
    n.to_formatted_string(&Locale::en)
}

/// Formats a move list as space-separated letters, e.g. "U R R D".
pub fn format_moves(moves: &[Direction]) -> String {
    moves
        .iter()
        .map(|direction| direction.to_char().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
