//! Configuration types for the Picobot grid and agent.

use serde::{Deserialize, Serialize};

fn default_rows() -> usize {
    20
}
fn default_columns() -> usize {
    20
}
fn default_max_states() -> usize {
    5
}
fn default_stuck_threshold() -> usize {
    10
}

/// Grid and automaton dimensions shared by every simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of rows (north-south extent).
    #[serde(default = "default_rows")]
    pub rows: usize,
    /// Number of columns (east-west extent).
    #[serde(default = "default_columns")]
    pub columns: usize,
    /// Number of automaton states available to a rule table.
    #[serde(default = "default_max_states")]
    pub max_states: usize,
    /// Consecutive wall hits after which an agent counts as stuck.
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            columns: default_columns(),
            max_states: default_max_states(),
            stuck_threshold: default_stuck_threshold(),
        }
    }
}

impl GridConfig {
    /// Total number of cells (rows * columns).
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows < 2 || self.columns < 2 {
            return Err(ConfigError::InvalidDimensions {
                rows: self.rows,
                columns: self.columns,
            });
        }
        if self.max_states == 0 {
            return Err(ConfigError::InvalidStateCount);
        }
        if self.stuck_threshold == 0 {
            return Err(ConfigError::InvalidStuckThreshold);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid must be at least 2x2, got {rows}x{columns}")]
    InvalidDimensions { rows: usize, columns: usize },
    #[error("State count must be non-zero")]
    InvalidStateCount,
    #[error("Stuck threshold must be non-zero")]
    InvalidStuckThreshold,
    #[error("Start position ({row}, {col}) lies outside a {rows}x{columns} grid")]
    StartOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        columns: usize,
    },
}
