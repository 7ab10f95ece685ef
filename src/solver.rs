//! Depth-first search for a winning sequence of moves.
//!
//! One iteration runs in two phases. A sequential DFS expands the tree up to
//! `parallelism_depth` and collects the states it reaches there. Each of those states
//! then roots an independent DFS on the rayon pool, down to `max_turn_depth`, where the
//! leaves are scored with [`calculate_score`]. The first win ends the iteration;
//! otherwise the best-scoring leaf becomes the root of the next iteration.
//!
//! Every phase skips states already seen at the same or a lower turn (up to
//! `max_cache_depth`) and prunes states that fail [`check_if_possible_to_win`].

use crate::engine::{Direction, GameState, StateHashBuilder, MAX_TURN_COUNT};
use crate::error::ConfigError;
use crate::heuristics::{calculate_score, check_if_possible_to_win};
use crate::level::LevelRules;
use crate::utils::{format_moves, format_with_commas, format_with_suffix};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tunable search parameters. They trade CPU time and memory against the chance of
/// finding a win.
///
/// Sensible settings keep `parallelism_depth <= max_cache_depth <= max_turn_depth`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverOptions {
    /// Maximum number of iterations. Each one restarts from the previous best leaf.
    pub iteration_count: u32,
    /// Depth of the move tree searched in one iteration.
    pub max_turn_depth: u8,
    /// Depth at which the search fans out into parallel tasks.
    pub parallelism_depth: u8,
    /// States deeper than this are never looked up in or added to the cache.
    pub max_cache_depth: u8,
    /// A progress line is emitted every this many simulated moves.
    pub print_every_n_moves: u64,
    /// Size of a dedicated thread pool. `None` runs on rayon's global pool.
    pub thread_count: Option<usize>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            iteration_count: 4,
            max_turn_depth: 25,
            parallelism_depth: 2,
            max_cache_depth: 20,
            print_every_n_moves: 10_000_000,
            thread_count: None,
        }
    }
}

impl SolverOptions {
    /// Parses options from TOML. Missing keys keep their default value.
    ///
    /// # Examples
    /// ```
    /// use baba_solver::solver::SolverOptions;
    ///
    /// let options = SolverOptions::from_toml_str("max_turn_depth = 12").unwrap();
    /// assert_eq!(options.max_turn_depth, 12);
    /// assert_eq!(options.iteration_count, 4);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let options: SolverOptions = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Rejects options the search cannot run with.
    ///
    /// An unusual depth ordering is allowed but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iteration_count == 0 {
            return Err(ConfigError::Invalid(
                "iteration_count must be at least 1".to_string(),
            ));
        }
        if self.max_turn_depth == 0 || usize::from(self.max_turn_depth) > MAX_TURN_COUNT {
            return Err(ConfigError::Invalid(format!(
                "max_turn_depth must be between 1 and {MAX_TURN_COUNT}, got {}",
                self.max_turn_depth
            )));
        }
        if usize::from(self.parallelism_depth) >= MAX_TURN_COUNT {
            return Err(ConfigError::Invalid(format!(
                "parallelism_depth must be below {MAX_TURN_COUNT}, got {}",
                self.parallelism_depth
            )));
        }
        if self.print_every_n_moves == 0 {
            return Err(ConfigError::Invalid(
                "print_every_n_moves must be at least 1".to_string(),
            ));
        }
        if self.thread_count == Some(0) {
            return Err(ConfigError::Invalid(
                "thread_count must be at least 1".to_string(),
            ));
        }
        if self.parallelism_depth > self.max_cache_depth
            || self.max_cache_depth > self.max_turn_depth
        {
            warn!(
                parallelism_depth = self.parallelism_depth,
                max_cache_depth = self.max_cache_depth,
                max_turn_depth = self.max_turn_depth,
                "Expected parallelism_depth <= max_cache_depth <= max_turn_depth"
            );
        }
        Ok(())
    }
}

/// A periodic progress report from one of the search loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Parallel task index, or `None` for the sequential phase.
    pub task: Option<usize>,
    /// Moves simulated so far by this loop.
    pub moves: u64,
    pub cache_size: usize,
    pub stack_size: usize,
}

/// Receives [`Progress`] reports. Called concurrently from every search task.
pub trait ProgressSink: Sync {
    fn emit(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Sync,
{
    fn emit(&self, progress: Progress) {
        self(progress)
    }
}

/// Logs progress at `INFO` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, progress: Progress) {
        let cache_size = progress.cache_size as u64;
        let line = format!(
            "Calculating move #{} ({}), cache size = {} ({}), stack size = {}",
            progress.moves,
            format_with_suffix(progress.moves),
            cache_size,
            format_with_suffix(cache_size),
            progress.stack_size
        );
        match progress.task {
            Some(task) => info!("Task {task}: {line}"),
            None => info!("{line}"),
        }
    }
}

/// Counters of one search iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Moves simulated, cache hits included.
    pub moves: u64,
    pub cache_hits: u64,
    /// Sum of the final sizes of every visited-state cache of the iteration.
    pub cache_size: u64,
    pub parallel_roots: u64,
    /// States that reached `max_turn_depth` and were scored.
    pub leaves: u64,
    pub elapsed: Duration,
}

impl SearchStats {
    /// Adds the counters of a parallel task. Roots and elapsed time are tracked by the
    /// coordinator only.
    pub fn merge(&mut self, other: &SearchStats) {
        self.moves += other.moves;
        self.cache_hits += other.cache_hits;
        self.cache_size += other.cache_size;
        self.leaves += other.leaves;
    }

    pub fn unique_moves(&self) -> u64 {
        self.moves.saturating_sub(self.cache_hits)
    }

    pub fn nanos_per_move(&self) -> u128 {
        if self.moves == 0 {
            0
        } else {
            self.elapsed.as_nanos() / u128::from(self.moves)
        }
    }
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  Total number of moves simulated (including cache hits): {}",
            format_with_commas(self.moves)
        )?;
        writeln!(f, "  Cache size: {} moves", format_with_commas(self.cache_size))?;
        writeln!(f, "  Number of cache hits: {}", format_with_commas(self.cache_hits))?;
        writeln!(
            f,
            "  Number of unique, non-cached moves: {}",
            format_with_commas(self.unique_moves())
        )?;
        writeln!(
            f,
            "  Number of parallel tree roots: {}",
            format_with_commas(self.parallel_roots)
        )?;
        writeln!(
            f,
            "  Number of tree leaf game states: {}",
            format_with_commas(self.leaves)
        )?;
        writeln!(f, "  Total time: {:.3} seconds", self.elapsed.as_secs_f64())?;
        write!(f, "  Time per move: {} nanoseconds", self.nanos_per_move())
    }
}

/// Summary of one iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationReport {
    /// 1-based.
    pub iteration: u32,
    pub won: bool,
    /// Score of the state the iteration ended on.
    pub best_score: i64,
    pub stats: SearchStats,
}

/// Result of [`solve`].
#[derive(Clone, Debug)]
pub struct Solution {
    /// The winning state, or the best state reached.
    pub state: GameState,
    /// Every move from the initial state to `state`, across all iterations.
    pub moves: Vec<Direction>,
    pub won: bool,
    pub iterations: Vec<IterationReport>,
}

/// Searches for a win from `initial`, logging progress through `tracing`.
///
/// Not finding a win is a normal outcome: the returned [`Solution`] then holds the best
/// state reached. Only invalid `options` produce an error.
///
/// # Examples
/// ```
/// use baba_solver::level::Level;
/// use baba_solver::solver::{solve, SolverOptions};
///
/// let level = Level::test_level().unwrap();
/// let options = SolverOptions { max_turn_depth: 3, max_cache_depth: 3, ..Default::default() };
/// let solution = solve(&level.initial, &level.rules, &options).unwrap();
/// assert!(solution.won);
/// ```
pub fn solve(
    initial: &GameState,
    rules: &LevelRules,
    options: &SolverOptions,
) -> Result<Solution, ConfigError> {
    solve_with_progress(initial, rules, options, &TracingProgress)
}

/// Like [`solve`], sending periodic progress reports to `progress`.
pub fn solve_with_progress(
    initial: &GameState,
    rules: &LevelRules,
    options: &SolverOptions,
    progress: &dyn ProgressSink,
) -> Result<Solution, ConfigError> {
    options.validate()?;
    match options.thread_count {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| ConfigError::Invalid(format!("failed to build thread pool: {e}")))?;
            Ok(pool.install(|| run_iterations(initial, rules, options, progress)))
        }
        None => Ok(run_iterations(initial, rules, options, progress)),
    }
}

fn run_iterations(
    initial: &GameState,
    rules: &LevelRules,
    options: &SolverOptions,
    progress: &dyn ProgressSink,
) -> Solution {
    info!(
        iteration_count = options.iteration_count,
        max_turn_depth = options.max_turn_depth,
        parallelism_depth = options.parallelism_depth,
        max_cache_depth = options.max_cache_depth,
        "Starting search"
    );

    let mut current = initial.clone();
    let mut moves = Vec::new();
    let mut iterations = Vec::new();
    let mut won = false;

    for iteration in 1..=options.iteration_count {
        info!("======== ITERATION {iteration} ========");
        current.reset_context();
        let IterationOutcome {
            state,
            won: iteration_won,
            exhausted,
            stats,
        } = solve_one_iteration(Arc::new(current), rules, options, progress);

        moves.extend_from_slice(state.moves());
        let best_score = calculate_score(&state, rules);
        info!(
            iteration,
            won = iteration_won,
            best_score,
            moves = %format_moves(state.moves()),
            "Iteration finished"
        );
        iterations.push(IterationReport {
            iteration,
            won: iteration_won,
            best_score,
            stats,
        });
        current = Arc::unwrap_or_clone(state);

        if iteration_won {
            won = true;
            break;
        }
        if exhausted {
            warn!("Iteration {iteration} reached no leaf state, stopping early");
            break;
        }
    }

    Solution {
        state: current,
        moves,
        won,
        iterations,
    }
}

/// A move still to be simulated: `direction` applied to `state`.
struct NextMove {
    state: Arc<GameState>,
    direction: Direction,
}

/// Visited states mapped to the lowest turn they were reached at.
type SeenStates = HashMap<Arc<GameState>, u8, StateHashBuilder>;

struct ScoredState {
    score: i64,
    state: Arc<GameState>,
}

struct IterationOutcome {
    state: Arc<GameState>,
    won: bool,
    /// Neither a win nor a leaf was reached.
    exhausted: bool,
    stats: SearchStats,
}

#[derive(Default)]
struct TaskOutcome {
    winner: Option<Arc<GameState>>,
    best_leaf: Option<ScoredState>,
    stats: SearchStats,
}

fn push_moves(stack: &mut Vec<NextMove>, state: &Arc<GameState>) {
    // Left is popped first.
    for direction in Direction::ALL {
        stack.push(NextMove {
            state: Arc::clone(state),
            direction,
        });
    }
}

/// Records `state` in the cache and returns `true` if it was already seen at the same
/// or a lower turn.
fn is_cache_hit(seen: &mut SeenStates, state: &Arc<GameState>, max_cache_depth: u8) -> bool {
    let turn = state.turn();
    if turn > max_cache_depth {
        return false;
    }
    match seen.entry(Arc::clone(state)) {
        Entry::Occupied(mut entry) => {
            if turn >= *entry.get() {
                return true;
            }
            entry.insert(turn);
            false
        }
        Entry::Vacant(entry) => {
            entry.insert(turn);
            false
        }
    }
}

fn solve_one_iteration(
    root: Arc<GameState>,
    rules: &LevelRules,
    options: &SolverOptions,
    progress: &dyn ProgressSink,
) -> IterationOutcome {
    let start = Instant::now();
    info!("Solving with initial state:\n{root}");

    let mut stats = SearchStats::default();
    if root.have_won() {
        info!("Initial state has already won");
        return IterationOutcome {
            state: root,
            won: true,
            exhausted: false,
            stats,
        };
    }

    let mut seen = SeenStates::default();
    seen.insert(Arc::clone(&root), 0);
    let mut stack = Vec::new();
    push_moves(&mut stack, &root);
    let mut parallel_roots = Vec::new();
    let mut winner = None;

    while let Some(NextMove { state, direction }) = stack.pop() {
        stats.moves += 1;
        if stats.moves % options.print_every_n_moves == 0 {
            progress.emit(Progress {
                task: None,
                moves: stats.moves,
                cache_size: seen.len(),
                stack_size: stack.len(),
            });
        }

        let next = Arc::new(state.apply_move(direction));
        if next.have_won() {
            info!("WIN!!! Turn #{}", next.turn());
            winner = Some(next);
            break;
        }
        if is_cache_hit(&mut seen, &next, options.max_cache_depth) {
            stats.cache_hits += 1;
            continue;
        }
        if !check_if_possible_to_win(&next, rules) {
            continue;
        }
        if next.turn() >= options.parallelism_depth {
            parallel_roots.push(next);
            continue;
        }
        push_moves(&mut stack, &next);
    }

    stats.cache_size = seen.len() as u64;
    stats.parallel_roots = parallel_roots.len() as u64;
    let mut best_leaf: Option<ScoredState> = None;

    if winner.is_none() && !parallel_roots.is_empty() {
        let total = parallel_roots.len();
        info!("Finished the sequential portion. Now parallelizing into {total} tasks.");
        let found_winner = AtomicBool::new(false);
        let finished = AtomicUsize::new(0);

        let outcomes: Vec<TaskOutcome> = parallel_roots
            .par_iter()
            .enumerate()
            .map(|(task, task_root)| {
                let outcome =
                    search_subtree(task, task_root, &seen, rules, options, progress, &found_winner);
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                info!(
                    "Task {task} finished ({done}/{total}): Moves={}, Cache={}, Leaves={}",
                    format_with_suffix(outcome.stats.moves),
                    format_with_suffix(outcome.stats.cache_size),
                    format_with_suffix(outcome.stats.leaves)
                );
                outcome
            })
            .collect();

        // Task order, so the earliest task wins ties.
        for outcome in outcomes {
            stats.merge(&outcome.stats);
            if winner.is_none() {
                winner = outcome.winner;
            }
            if let Some(leaf) = outcome.best_leaf {
                if best_leaf.as_ref().map_or(true, |best| leaf.score > best.score) {
                    best_leaf = Some(leaf);
                }
            }
        }
    }
    stats.elapsed = start.elapsed();

    if let Some(state) = winner {
        info!("WIN!!! Winning state:\n{state}\nMoves: {}", format_moves(state.moves()));
        return IterationOutcome {
            state,
            won: true,
            exhausted: false,
            stats,
        };
    }

    match best_leaf {
        Some(leaf) => {
            info!(
                score = leaf.score,
                "Did not win. Best leaf game state:\n{}\nMoves: {}",
                leaf.state,
                format_moves(leaf.state.moves())
            );
            IterationOutcome {
                state: leaf.state,
                won: false,
                exhausted: false,
                stats,
            }
        }
        None => IterationOutcome {
            state: root,
            won: false,
            exhausted: true,
            stats,
        },
    }
}

/// Searches the subtree below `root` with a private copy of the cache.
fn search_subtree(
    task: usize,
    root: &Arc<GameState>,
    shared_seen: &SeenStates,
    rules: &LevelRules,
    options: &SolverOptions,
    progress: &dyn ProgressSink,
    found_winner: &AtomicBool,
) -> TaskOutcome {
    let mut seen = shared_seen.clone();
    let mut stack = Vec::new();
    push_moves(&mut stack, root);
    let mut outcome = TaskOutcome::default();

    while let Some(NextMove { state, direction }) = stack.pop() {
        if found_winner.load(Ordering::Relaxed) {
            debug!(task, "Another task found a win, stopping");
            break;
        }
        outcome.stats.moves += 1;
        if outcome.stats.moves % options.print_every_n_moves == 0 {
            progress.emit(Progress {
                task: Some(task),
                moves: outcome.stats.moves,
                cache_size: seen.len(),
                stack_size: stack.len(),
            });
        }

        let next = Arc::new(state.apply_move(direction));
        if next.have_won() {
            info!("Task {task}: WIN!!! Turn #{}", next.turn());
            found_winner.store(true, Ordering::Relaxed);
            outcome.winner = Some(next);
            break;
        }
        if is_cache_hit(&mut seen, &next, options.max_cache_depth) {
            outcome.stats.cache_hits += 1;
            continue;
        }
        if !check_if_possible_to_win(&next, rules) {
            continue;
        }
        if next.turn() >= options.max_turn_depth {
            outcome.stats.leaves += 1;
            let score = calculate_score(&next, rules);
            if outcome
                .best_leaf
                .as_ref()
                .map_or(true, |best| score > best.score)
            {
                outcome.best_leaf = Some(ScoredState { score, state: next });
            }
            continue;
        }
        push_moves(&mut stack, &next);
    }

    outcome.stats.cache_size = seen.len() as u64;
    debug!(task, moves = outcome.stats.moves, "Task search finished");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Coordinate, GameObject};
    use crate::level::Level;
    use crate::utils::grid_from_layers;
    use std::sync::Mutex;

    fn state(floor: &[&str], objects: &[&str], babas: [(u8, u8); 2]) -> GameState {
        let grid = grid_from_layers(floor, objects).unwrap();
        GameState::new(grid, babas.map(|(row, col)| Coordinate::new(row, col))).unwrap()
    }

    fn options(iteration_count: u32, max_turn_depth: u8, parallelism_depth: u8) -> SolverOptions {
        SolverOptions {
            iteration_count,
            max_turn_depth,
            parallelism_depth,
            max_cache_depth: max_turn_depth,
            print_every_n_moves: 1_000_000,
            thread_count: Some(2),
        }
    }

    fn replay(initial: &GameState, moves: &[Direction]) -> GameState {
        let mut current = initial.clone();
        for (i, direction) in moves.iter().enumerate() {
            if i % MAX_TURN_COUNT == 0 {
                current.reset_context();
            }
            current = current.apply_move(*direction);
        }
        current
    }

    // Highest score over every leaf at `depth`, expanding only states that can still win.
    fn brute_force_best(state: &GameState, rules: &LevelRules, depth: u8) -> Option<i64> {
        let mut best = None;
        for direction in Direction::ALL {
            let next = state.apply_move(direction);
            if !check_if_possible_to_win(&next, rules) {
                continue;
            }
            let score = if next.turn() >= depth {
                Some(calculate_score(&next, rules))
            } else {
                brute_force_best(&next, rules, depth)
            };
            best = best.max(score);
        }
        best
    }

    #[test]
    fn test_default_options() {
        let options = SolverOptions::default();
        assert_eq!(options.iteration_count, 4);
        assert_eq!(options.max_turn_depth, 25);
        assert_eq!(options.parallelism_depth, 2);
        assert_eq!(options.max_cache_depth, 20);
        assert_eq!(options.print_every_n_moves, 10_000_000);
        assert_eq!(options.thread_count, None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_toml() {
        let options = SolverOptions::from_toml_str(
            r######"
            iteration_count = 2
            parallelism_depth = 3
            thread_count = 4
            "######,
        )
        .unwrap();
        assert_eq!(options.iteration_count, 2);
        assert_eq!(options.parallelism_depth, 3);
        assert_eq!(options.thread_count, Some(4));
        assert_eq!(options.max_turn_depth, 25);

        assert!(matches!(
            SolverOptions::from_toml_str("max_depth = 3"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            SolverOptions::from_toml_str("iteration_count = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let options = SolverOptions::from_toml_str(include_str!("../solver.toml")).unwrap();
        assert_eq!(options, SolverOptions::default());
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let invalid = [
            SolverOptions { iteration_count: 0, ..Default::default() },
            SolverOptions { max_turn_depth: 0, ..Default::default() },
            SolverOptions { max_turn_depth: 65, ..Default::default() },
            SolverOptions { parallelism_depth: 64, ..Default::default() },
            SolverOptions { print_every_n_moves: 0, ..Default::default() },
            SolverOptions { thread_count: Some(0), ..Default::default() },
        ];
        for options in invalid {
            assert!(options.validate().is_err(), "{options:?} should be rejected");
        }

        let unordered = SolverOptions {
            parallelism_depth: 10,
            max_cache_depth: 5,
            ..Default::default()
        };
        assert!(unordered.validate().is_ok());
    }

    #[test]
    fn test_trivial_win_returns_root() {
        let mut grid = grid_from_layers(&["###", "###", "###"], &["", ".D."]).unwrap();
        grid.insert(Coordinate::new(1, 1), GameObject::Key);
        let won = GameState::new(grid, [Coordinate::new(0, 0), Coordinate::new(2, 2)]).unwrap();

        let solution = solve(&won, &LevelRules::default(), &options(4, 5, 2)).unwrap();
        assert!(solution.won);
        assert!(solution.moves.is_empty());
        assert_eq!(solution.iterations.len(), 1);
        assert_eq!(solution.iterations[0].stats.moves, 0);
        assert_eq!(solution.state, won);
    }

    #[test]
    fn test_test_level_wins_in_sequential_phase() {
        let level = Level::test_level().unwrap();
        let solution = solve(&level.initial, &level.rules, &options(1, 4, 2)).unwrap();
        assert!(solution.won);
        assert_eq!(solution.moves, vec![Direction::Right]);
        assert!(replay(&level.initial, &solution.moves).have_won());
    }

    #[test]
    fn test_win_found_by_parallel_task() {
        let initial = state(&["#####", "#####"], &["..KD."], [(0, 0), (1, 0)]);
        let solution = solve(&initial, &LevelRules::default(), &options(1, 4, 1)).unwrap();
        assert!(solution.won);
        assert!(solution.iterations[0].stats.parallel_roots > 0);
        assert!(solution.moves.len() >= 2 && solution.moves.len() <= 4);
        let replayed = replay(&initial, &solution.moves);
        assert!(replayed.have_won());
        assert_eq!(replayed, solution.state);
    }

    #[test]
    fn test_best_leaf_matches_brute_force() {
        let level = Level::floatiest_platforms().unwrap();
        let mut options = options(1, 3, 1);
        // No caching, so every leaf is reached.
        options.max_cache_depth = 0;
        let solution = solve(&level.initial, &level.rules, &options).unwrap();

        assert!(!solution.won);
        let expected = brute_force_best(&level.initial, &level.rules, 3).unwrap();
        assert_eq!(solution.iterations[0].best_score, expected);
        assert_eq!(solution.moves.len(), 3);
        assert_eq!(replay(&level.initial, &solution.moves), solution.state);
    }

    #[test]
    fn test_no_win_search_is_deterministic_in_score() {
        let level = Level::floatiest_platforms().unwrap();
        let options = options(1, 4, 2);
        let first = solve(&level.initial, &level.rules, &options).unwrap();
        let second = solve(&level.initial, &level.rules, &options).unwrap();
        assert!(!first.won && !second.won);
        assert_eq!(first.iterations[0].best_score, second.iterations[0].best_score);
        assert_eq!(
            calculate_score(&first.state, &level.rules),
            first.iterations[0].best_score
        );
    }

    #[test]
    fn test_iterations_chain_from_best_leaf() {
        let level = Level::floatiest_platforms().unwrap();
        let solution = solve(&level.initial, &level.rules, &options(2, 2, 1)).unwrap();
        assert!(!solution.won);
        assert_eq!(solution.iterations.len(), 2);
        assert_eq!(solution.moves.len(), 4);
        assert_eq!(replay(&level.initial, &solution.moves), solution.state);
    }

    #[test]
    fn test_exhausted_search_returns_root() {
        // Every move drops a Baba off the tiles.
        let initial = state(&["#.", ".#"], &["D", ".K"], [(0, 0), (1, 1)]);
        let solution = solve(&initial, &LevelRules::default(), &options(3, 3, 1)).unwrap();
        assert!(!solution.won);
        assert!(solution.moves.is_empty());
        assert_eq!(solution.iterations.len(), 1);
        assert_eq!(solution.iterations[0].stats.parallel_roots, 0);
        assert_eq!(solution.state, initial);
    }

    #[test]
    fn test_extreme_depth_settings() {
        let initial = state(&["#.", ".#"], &["D", ".K"], [(0, 0), (1, 1)]);
        let settings = [(64, 63, 64), (1, 0, 0), (6, 10, 2), (64, 2, 64), (64, 0, 64)];
        for (turn, fan_out, cache) in settings {
            let mut options = options(1, turn, fan_out);
            options.max_cache_depth = cache;
            let solution = solve(&initial, &LevelRules::default(), &options).unwrap();
            assert!(!solution.won);
            assert_eq!(solution.state, initial);
        }
    }

    #[test]
    fn test_progress_reports_reach_sink() {
        let level = Level::floatiest_platforms().unwrap();
        let mut options = options(1, 3, 1);
        options.print_every_n_moves = 1;
        let reports = Mutex::new(Vec::new());
        let sink = |progress: Progress| reports.lock().unwrap().push(progress);

        solve_with_progress(&level.initial, &level.rules, &options, &sink).unwrap();
        let reports = reports.into_inner().unwrap();
        assert!(reports.iter().any(|p| p.task.is_none()));
        assert!(reports.iter().any(|p| p.task.is_some()));
        assert!(reports.iter().all(|p| p.moves > 0));
    }

    #[test]
    fn test_cache_keeps_lowest_turn() {
        let level = Level::test_level().unwrap();
        let root = Arc::new(level.initial.clone());
        let mut seen = SeenStates::default();
        seen.insert(Arc::clone(&root), 0);

        // Stepping down and back up reaches the root again at turn 2.
        let there = Arc::new(root.apply_move(Direction::Down));
        let back = Arc::new(there.apply_move(Direction::Up));
        assert_eq!(*back, *root);
        assert!(is_cache_hit(&mut seen, &back, 20));

        assert!(!is_cache_hit(&mut seen, &there, 20));
        assert!(is_cache_hit(&mut seen, &there, 20));
        assert_eq!(seen.len(), 2);

        // Beyond the cache depth nothing is recorded.
        let deep = Arc::new(back.apply_move(Direction::Down));
        assert!(!is_cache_hit(&mut seen, &deep, 2));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_stats_merge_and_display() {
        let mut total = SearchStats {
            moves: 10,
            cache_hits: 2,
            cache_size: 5,
            parallel_roots: 3,
            leaves: 1,
            elapsed: Duration::from_nanos(1_000),
        };
        total.merge(&SearchStats {
            moves: 1_990,
            cache_hits: 8,
            cache_size: 1_000,
            parallel_roots: 99,
            leaves: 4,
            elapsed: Duration::from_secs(1),
        });
        assert_eq!(total.moves, 2_000);
        assert_eq!(total.unique_moves(), 1_990);
        assert_eq!(total.parallel_roots, 3);
        assert_eq!(total.leaves, 5);
        assert_eq!(total.nanos_per_move(), 0);

        let text = total.to_string();
        assert!(text.contains("Total number of moves simulated (including cache hits): 2,000"));
        assert!(text.contains("Cache size: 1,005 moves"));
    }
}
