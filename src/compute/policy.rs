//! Move policies: where an agent's next action comes from.
//!
//! [`TableMovePolicy`] reads a validated [`RuleTable`] and cannot fail.
//! [`ExternalMovePolicy`] defers to a caller-supplied [`MoveOracle`] (a
//! human, a script, a remote controller) and keeps the automaton state
//! unchanged.

use std::convert::Infallible;

use super::RuleTable;
use super::agent::AgentView;
use crate::schema::{Action, Direction, Pattern};

/// Source of moves for an [`Agent`](super::Agent).
pub trait MovePolicy {
    type Error;

    /// Choose the action for `state` facing `pattern`.
    fn get_move(
        &mut self,
        state: usize,
        pattern: Pattern,
        view: &AgentView<'_>,
    ) -> Result<Action, Self::Error>;
}

/// Policy that looks moves up in a rule table.
#[derive(Debug, Clone, Copy)]
pub struct TableMovePolicy<'a> {
    table: &'a RuleTable,
}

impl<'a> TableMovePolicy<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'a RuleTable {
        self.table
    }
}

impl MovePolicy for TableMovePolicy<'_> {
    type Error = Infallible;

    #[inline]
    fn get_move(
        &mut self,
        state: usize,
        pattern: Pattern,
        _view: &AgentView<'_>,
    ) -> Result<Action, Infallible> {
        Ok(self.table.action(state, pattern))
    }
}

/// Outside decision-maker queried once per step.
pub trait MoveOracle {
    type Error: std::error::Error + 'static;

    /// Return a direction word (`N`, `east`, ...).
    fn next_move(&mut self, pattern: Pattern, view: &AgentView<'_>) -> Result<String, Self::Error>;
}

/// Errors raised by [`ExternalMovePolicy`].
#[derive(Debug, thiserror::Error)]
pub enum ExternalPolicyError<E: std::error::Error + 'static> {
    #[error("Move oracle failed: {0}")]
    Oracle(#[source] E),
    #[error("Move oracle returned unknown direction '{0}'")]
    InvalidMove(String),
}

/// Policy backed by a [`MoveOracle`]. The automaton state never changes.
#[derive(Debug)]
pub struct ExternalMovePolicy<O> {
    oracle: O,
}

impl<O: MoveOracle> ExternalMovePolicy<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn into_inner(self) -> O {
        self.oracle
    }
}

impl<O: MoveOracle> MovePolicy for ExternalMovePolicy<O> {
    type Error = ExternalPolicyError<O::Error>;

    fn get_move(
        &mut self,
        state: usize,
        pattern: Pattern,
        view: &AgentView<'_>,
    ) -> Result<Action, Self::Error> {
        let word = self
            .oracle
            .next_move(pattern, view)
            .map_err(ExternalPolicyError::Oracle)?;
        let direction: Direction = word
            .trim()
            .parse()
            .map_err(|_| ExternalPolicyError::InvalidMove(word.clone()))?;
        Ok(Action::new(direction, state))
    }
}
