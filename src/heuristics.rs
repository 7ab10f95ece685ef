//! Pruning and scoring of search states.
//!
//! Both functions read the level geometry from [`LevelRules`]. The regions encode a
//! hand analysis of one level: text pushed into certain areas can never be brought
//! back, and the level is solved by building a rock bridge between two platforms,
//! lining the rule text up with it and then merging the two Babas.

use crate::engine::{Cell, Coordinate, GameObject, GameState};
use crate::level::{Bridge, LevelRules};

/// Score of a state from which the level can no longer be won. Overrides every other term.
pub const UNWINNABLE_SCORE: i64 = -1_000_000;

/// Score of a state with a finished bridge whose text can no longer be lined up with it.
pub const MISALIGNED_TEXT_SCORE: i64 = -1;

const BRIDGE_ROCK_SCORES: [i64; 3] = [100, 1_000, 10_000];
const ALIGNED_TEXT_SCORES: [i64; 3] = [1_000, 10_000, 100_000];
const ALIGNED_ACTIVE_RULE_SCORE: i64 = 1_000_000;
const BABAS_MERGED_SCORE: i64 = 10_000_000;
const KEY_DISTANCE_BASE: i64 = 100;

/// Checks whether the level can still be won from `state`.
///
/// Returns `false` if:
/// - either Baba is dead,
/// - the "IS" text has left every rectangle of `rules.rule_text_zone` (only checked when
///   the zone list is non-empty),
/// - a "ROCK" or "PUSH" text sits inside one of `rules.text_exclusion_zones`.
///
/// A `true` result does not mean a win is reachable, only that none of the known dead
/// ends has been hit.
pub fn check_if_possible_to_win(state: &GameState, rules: &LevelRules) -> bool {
    if !state.all_babas_alive() {
        return false;
    }

    if !rules.rule_text_zone.is_empty() {
        let in_zone = state
            .is_text()
            .is_some_and(|is_text| rules.rule_text_zone.iter().any(|zone| zone.contains(is_text)));
        if !in_zone {
            return false;
        }
    }

    !rules.text_exclusion_zones.iter().any(|zone| {
        zone.coordinates()
            .filter(|coord| state.grid().contains(*coord))
            .any(|coord| holds_rock_or_push_text(state.grid().get(coord)))
    })
}

/// Scores how close `state` is to a win. Higher is better.
///
/// The score is built from staged milestones, each one dwarfing the previous:
/// 1. Rocks in each bridge row: 1, 2 or 3 rocks add 100, 1,000 or 10,000. The last row
///    holding three rocks is the bridge row.
/// 2. With a bridge row, text lined up with it ("IS" anywhere in the row, "ROCK" and
///    "PUSH" in the alignment columns): 1, 2 or 3 pieces add 1,000, 10,000 or 100,000,
///    and 1,000,000 for all three while "ROCK IS PUSH" is active. If the text can no
///    longer reach the bridge row the whole score is [`MISALIGNED_TEXT_SCORE`].
/// 3. Both Babas on the same cell adds 10,000,000.
///
/// A tie-break of `100 - manhattan(key, door)` is added last. States that fail
/// [`check_if_possible_to_win`] score [`UNWINNABLE_SCORE`].
pub fn calculate_score(state: &GameState, rules: &LevelRules) -> i64 {
    if !check_if_possible_to_win(state, rules) {
        return UNWINNABLE_SCORE;
    }

    let mut score = 0;
    if let Some(bridge) = &rules.bridge {
        let mut rock_row = None;
        for row in bridge.rows.range() {
            let rock_count = bridge
                .cols
                .range()
                .filter(|&col| cell_at(state, row, col).contains(GameObject::Rock))
                .count();
            if let Some(bonus) = tier_bonus(&BRIDGE_ROCK_SCORES, rock_count) {
                score += bonus;
            }
            if rock_count == BRIDGE_ROCK_SCORES.len() {
                rock_row = Some(row);
            }
        }

        if let Some(rock_row) = rock_row {
            if !text_can_align(state, bridge, rock_row) {
                return MISALIGNED_TEXT_SCORE;
            }

            let is_text_aligned = state.is_text().is_some_and(|c| c.row == rock_row);
            let aligned_count = usize::from(is_text_aligned)
                + bridge
                    .alignment_cols
                    .range()
                    .filter(|&col| holds_rock_or_push_text(cell_at(state, rock_row, col)))
                    .count();
            if aligned_count == ALIGNED_TEXT_SCORES.len() && state.rock_is_push_active() {
                score += ALIGNED_ACTIVE_RULE_SCORE;
            } else if let Some(bonus) = tier_bonus(&ALIGNED_TEXT_SCORES, aligned_count) {
                score += bonus;
            }
        }
    }

    if state.babas_on_same_space() {
        score += BABAS_MERGED_SCORE;
    }

    score + KEY_DISTANCE_BASE - i64::from(state.key().manhattan_distance(state.door()))
}

/// Checks whether the text can still be lined up with a bridge built in `rock_row`.
///
/// Text in the far lane is stuck in its row: an "IS" there must already be in the
/// bridge row and must not complete the rule yet, and "ROCK" or "PUSH" there must not
/// be in any other bridge row.
fn text_can_align(state: &GameState, bridge: &Bridge, rock_row: u8) -> bool {
    if let Some(is_text) = state.is_text() {
        if bridge.far_lane_cols.contains(is_text.col)
            && (is_text.row != rock_row || state.rock_is_push_active())
        {
            return false;
        }
    }

    !bridge
        .rows
        .range()
        .filter(|&row| row != rock_row)
        .any(|row| {
            bridge
                .far_lane_cols
                .range()
                .any(|col| holds_rock_or_push_text(cell_at(state, row, col)))
        })
}

// Zones come from level files, so cells outside the grid read as empty.
fn cell_at(state: &GameState, row: u8, col: u8) -> Cell {
    let coord = Coordinate::new(row, col);
    if state.grid().contains(coord) {
        state.grid().get(coord)
    } else {
        Cell::EMPTY
    }
}

fn holds_rock_or_push_text(cell: Cell) -> bool {
    cell.contains(GameObject::RockText) || cell.contains(GameObject::PushText)
}

fn tier_bonus(tiers: &[i64], count: usize) -> Option<i64> {
    count.checked_sub(1).and_then(|index| tiers.get(index)).copied()
}
