//! Grid-exploring agent driven by a move policy.
//!
//! The agent perceives which sides of its cell are grid boundary, asks its
//! policy for a move and a next state, and records every cell it enters.
//! A move into a boundary leaves the agent in place but still advances the
//! automaton; enough of those in a row mark the agent as stuck.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::policy::MovePolicy;
use crate::schema::{ConfigError, GridConfig, Pattern};

/// Cell coordinate, row 0 being the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Uniformly random cell of `grid`.
    pub fn random<R: Rng + ?Sized>(grid: &GridConfig, rng: &mut R) -> Self {
        let row = rng.gen_range(0..grid.rows);
        let col = rng.gen_range(0..grid.columns);
        Self { row, col }
    }
}

/// Lifecycle of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Running,
    Stuck,
    Terminated,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// Position changed.
    Moved,
    /// The move pointed into a boundary; position unchanged.
    HitWall,
}

/// Why [`Agent::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Step budget used up.
    Exhausted,
    /// Consecutive wall hits reached the stuck threshold.
    Stuck,
}

/// Steps taken by one [`Agent::run`] call and why it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub steps_taken: usize,
    pub stop_reason: StopReason,
}

/// The simulated robot together with its private visited grid.
#[derive(Debug, Clone)]
pub struct Agent {
    rows: usize,
    columns: usize,
    stuck_threshold: usize,
    position: Position,
    state: usize,
    visited: Vec<bool>,
    visit_count: usize,
    invalid_move_streak: usize,
    steps_taken: usize,
    status: AgentStatus,
}

impl Agent {
    /// Place a fresh agent at `start` in state 0.
    pub fn new(grid: &GridConfig, start: Position) -> Result<Self, ConfigError> {
        grid.validate()?;
        if start.row >= grid.rows || start.col >= grid.columns {
            return Err(ConfigError::StartOutOfBounds {
                row: start.row,
                col: start.col,
                rows: grid.rows,
                columns: grid.columns,
            });
        }

        let mut visited = vec![false; grid.cell_count()];
        visited[start.row * grid.columns + start.col] = true;

        Ok(Self {
            rows: grid.rows,
            columns: grid.columns,
            stuck_threshold: grid.stuck_threshold,
            position: start,
            state: 0,
            visited,
            visit_count: 1,
            invalid_move_streak: 0,
            steps_taken: 0,
            status: AgentStatus::Running,
        })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn state(&self) -> usize {
        self.state
    }

    /// Number of distinct cells visited, the start cell included.
    pub fn visit_count(&self) -> usize {
        self.visit_count
    }

    /// Steps taken over the agent's lifetime.
    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn invalid_move_streak(&self) -> usize {
        self.invalid_move_streak
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Row-major visited flags.
    pub fn visited(&self) -> &[bool] {
        &self.visited
    }

    pub fn is_visited(&self, position: Position) -> bool {
        position.row < self.rows
            && position.col < self.columns
            && self.visited[position.row * self.columns + position.col]
    }

    /// Fraction of the grid visited so far.
    pub fn coverage(&self) -> f64 {
        self.visit_count as f64 / self.visited.len() as f64
    }

    /// Wall pattern at the current position.
    #[inline]
    pub fn perceive(&self) -> Pattern {
        Pattern::at(
            self.position.row,
            self.position.col,
            self.rows,
            self.columns,
        )
    }

    pub fn is_stuck(&self) -> bool {
        self.invalid_move_streak >= self.stuck_threshold
    }

    /// Borrowed read-only view handed to policies.
    pub fn view(&self) -> AgentView<'_> {
        AgentView {
            position: self.position,
            state: self.state,
            rows: self.rows,
            columns: self.columns,
            visit_count: self.visit_count,
            steps_taken: self.steps_taken,
            visited: &self.visited,
        }
    }

    /// Owned copy of the observable state.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            position: self.position,
            state: self.state,
            rows: self.rows,
            columns: self.columns,
            visit_count: self.visit_count,
            steps_taken: self.steps_taken,
            stuck: self.is_stuck(),
            visited: self.visited.clone(),
        }
    }

    /// Ask the policy for one move and apply it.
    pub fn step<P>(&mut self, policy: &mut P) -> Result<StepOutcome, P::Error>
    where
        P: MovePolicy + ?Sized,
    {
        let pattern = self.perceive();
        let action = policy.get_move(self.state, pattern, &self.view())?;

        self.state = action.next_state;
        self.steps_taken += 1;

        if pattern.blocks(action.direction) {
            self.invalid_move_streak += 1;
            if self.is_stuck() {
                self.status = AgentStatus::Stuck;
            }
            return Ok(StepOutcome::HitWall);
        }

        let (dr, dc) = action.direction.delta();
        self.position = Position {
            row: self.position.row.wrapping_add_signed(dr),
            col: self.position.col.wrapping_add_signed(dc),
        };

        let idx = self.position.row * self.columns + self.position.col;
        if !self.visited[idx] {
            self.visited[idx] = true;
            self.visit_count += 1;
        }
        self.invalid_move_streak = 0;

        Ok(StepOutcome::Moved)
    }

    /// Step until `max_steps` are taken or the agent gets stuck.
    pub fn run<P>(&mut self, policy: &mut P, max_steps: usize) -> Result<RunOutcome, P::Error>
    where
        P: MovePolicy + ?Sized,
    {
        let mut steps_taken = 0;
        while steps_taken < max_steps && !self.is_stuck() {
            self.step(policy)?;
            steps_taken += 1;
        }

        let stop_reason = if self.is_stuck() {
            self.status = AgentStatus::Stuck;
            StopReason::Stuck
        } else {
            self.status = AgentStatus::Terminated;
            StopReason::Exhausted
        };

        Ok(RunOutcome {
            steps_taken,
            stop_reason,
        })
    }
}

/// Read-only agent state passed to a [`MovePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct AgentView<'a> {
    pub position: Position,
    pub state: usize,
    pub rows: usize,
    pub columns: usize,
    pub visit_count: usize,
    pub steps_taken: usize,
    pub visited: &'a [bool],
}

impl AgentView<'_> {
    pub fn is_visited(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.columns && self.visited[row * self.columns + col]
    }

    /// Visited cells in row-major order.
    pub fn visited_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.visited
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| Position::new(i / self.columns, i % self.columns))
    }
}

/// Owned observation for visualizers and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub position: Position,
    pub state: usize,
    pub rows: usize,
    pub columns: usize,
    pub visit_count: usize,
    pub steps_taken: usize,
    pub stuck: bool,
    pub visited: Vec<bool>,
}

impl AgentSnapshot {
    /// ASCII dump: `*` border, `P` agent, `.` visited, blank unvisited.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AgentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "*".repeat(self.columns + 2);
        writeln!(f, "{border}")?;
        for row in 0..self.rows {
            let line: String = (0..self.columns)
                .map(|col| {
                    if self.position == Position::new(row, col) {
                        'P'
                    } else if self.visited[row * self.columns + col] {
                        '.'
                    } else {
                        ' '
                    }
                })
                .collect();
            writeln!(f, "*{line}*")?;
        }
        write!(f, "{border}")
    }
}
