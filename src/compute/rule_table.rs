//! Dense rule table: the robot's program.
//!
//! Entries are stored in a flat vector indexed by
//! `state * Pattern::COUNT + pattern.index()`, so a table always holds exactly
//! one action per `(state, pattern)` pair.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{Action, Direction, Pattern, Rule, RuleRecord, ValidationError};

/// Total mapping `(state, pattern) -> (move, next_state)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<RuleRecord>", try_from = "Vec<RuleRecord>")]
pub struct RuleTable {
    max_states: usize,
    actions: Vec<Action>,
}

impl RuleTable {
    /// Build a table by asking `f` for every `(state, pattern)` pair.
    ///
    /// Next states must lie in `0..max_states`. Moves into walls are accepted
    /// and reported by [`RuleTable::validate`], so hand-built or external
    /// tables can still be simulated.
    pub fn from_fn<F>(max_states: usize, f: F) -> Result<Self, ValidationError>
    where
        F: FnMut(usize, Pattern) -> Action,
    {
        if max_states == 0 {
            return Err(ValidationError::EmptyTable);
        }
        let table = Self::build(max_states, f);
        table.check_states()?;
        Ok(table)
    }

    pub(crate) fn build<F>(max_states: usize, mut f: F) -> Self
    where
        F: FnMut(usize, Pattern) -> Action,
    {
        let actions = (0..max_states)
            .flat_map(|state| Pattern::ALL.into_iter().map(move |p| (state, p)))
            .map(|(state, pattern)| f(state, pattern))
            .collect();
        Self {
            max_states,
            actions,
        }
    }

    /// Table where every slot holds the alphabetically first open move and
    /// stays in its own state.
    pub fn filler(max_states: usize) -> Result<Self, ValidationError> {
        Self::from_fn(max_states, |state, pattern| {
            Action::new(pattern.default_move(), state)
        })
    }

    /// Build a table from a complete rule list, rejecting the first invalid
    /// or missing entry. Later rules for the same slot replace earlier ones.
    pub fn from_rules<I>(max_states: usize, rules: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = Rule>,
    {
        if max_states == 0 {
            return Err(ValidationError::EmptyTable);
        }
        let mut slots: Vec<Option<Action>> = vec![None; max_states * Pattern::COUNT];
        for rule in rules {
            rule.check(max_states)?;
            slots[slot_index(rule.state, rule.pattern)] = Some(rule.action);
        }

        let mut actions = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(action) => actions.push(action),
                None => {
                    return Err(ValidationError::IncompleteTable {
                        state: i / Pattern::COUNT,
                        pattern: Pattern::ALL[i % Pattern::COUNT],
                    });
                }
            }
        }

        Ok(Self {
            max_states,
            actions,
        })
    }

    /// Number of automaton states covered.
    pub fn max_states(&self) -> usize {
        self.max_states
    }

    /// Number of entries (`max_states * 9`).
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Check completeness, state ranges and wall safety of every entry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_states == 0 {
            return Err(ValidationError::EmptyTable);
        }
        if self.actions.len() != self.max_states * Pattern::COUNT {
            let first_missing = self.actions.len();
            return Err(ValidationError::IncompleteTable {
                state: first_missing / Pattern::COUNT,
                pattern: Pattern::ALL[first_missing % Pattern::COUNT],
            });
        }
        self.rules().try_for_each(|rule| rule.check(self.max_states))
    }

    fn check_states(&self) -> Result<(), ValidationError> {
        match self.actions.iter().find(|a| a.next_state >= self.max_states) {
            Some(action) => Err(ValidationError::InvalidState {
                state: action.next_state as i64,
                max_states: self.max_states,
            }),
            None => Ok(()),
        }
    }

    /// Look up the action for a `(state, pattern)` pair.
    pub fn lookup(&self, state: usize, pattern: Pattern) -> Result<Action, DomainError> {
        if state >= self.max_states {
            return Err(DomainError::StateOutOfRange {
                state: state as i64,
                max_states: self.max_states,
            });
        }
        Ok(self.actions[slot_index(state, pattern)])
    }

    /// Look up using the raw external encoding of state and pattern.
    pub fn lookup_raw(&self, state: i64, pattern: &str) -> Result<Action, DomainError> {
        let pattern: Pattern = pattern
            .parse()
            .map_err(|_| DomainError::UnknownPattern(pattern.to_string()))?;
        let state = usize::try_from(state).map_err(|_| DomainError::StateOutOfRange {
            state,
            max_states: self.max_states,
        })?;
        self.lookup(state, pattern)
    }

    /// Direct access for the simulator. Panics if `state` is out of range.
    #[inline]
    pub(crate) fn action(&self, state: usize, pattern: Pattern) -> Action {
        self.actions[slot_index(state, pattern)]
    }

    /// Overwrite a single slot. The rule is stored as given, walls included.
    pub fn set(&mut self, rule: Rule) -> Result<(), ValidationError> {
        for state in [rule.state, rule.action.next_state] {
            if state >= self.max_states {
                return Err(ValidationError::InvalidState {
                    state: state as i64,
                    max_states: self.max_states,
                });
            }
        }
        self.actions[slot_index(rule.state, rule.pattern)] = rule.action;
        Ok(())
    }

    pub(crate) fn slot_mut(&mut self, state: usize, pattern: Pattern) -> &mut Action {
        &mut self.actions[slot_index(state, pattern)]
    }

    /// Iterate over all entries in slot order.
    pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.actions.iter().enumerate().map(|(i, action)| Rule {
            state: i / Pattern::COUNT,
            pattern: Pattern::ALL[i % Pattern::COUNT],
            action: *action,
        })
    }

    /// Export as external rule records.
    pub fn to_records(&self) -> Vec<RuleRecord> {
        self.rules().map(RuleRecord::from).collect()
    }

    /// Count of entries whose move is `direction`.
    pub fn count_moves(&self, direction: Direction) -> usize {
        self.actions
            .iter()
            .filter(|a| a.direction == direction)
            .count()
    }
}

#[inline]
pub(crate) fn slot_index(state: usize, pattern: Pattern) -> usize {
    state * Pattern::COUNT + pattern.index()
}

impl fmt::Display for RuleTable {
    /// One rule per line, sorted by state then pattern text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<Rule> = self.rules().collect();
        rules.sort_by(|a, b| {
            a.state
                .cmp(&b.state)
                .then_with(|| a.pattern.as_str().cmp(b.pattern.as_str()))
        });
        for (i, rule) in rules.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{rule}")?;
        }
        Ok(())
    }
}

impl From<RuleTable> for Vec<RuleRecord> {
    fn from(table: RuleTable) -> Self {
        table.to_records()
    }
}

impl TryFrom<Vec<RuleRecord>> for RuleTable {
    type Error = ValidationError;

    /// Strict conversion; the state count is one past the highest state seen.
    ///
    /// A complete table holds nine records per state, so any state at or
    /// beyond the record count is rejected before allocating.
    fn try_from(records: Vec<RuleRecord>) -> Result<Self, Self::Error> {
        let limit = records.len();
        let mut max_states = 0;
        for record in &records {
            for state in [record.state, record.next_state] {
                let count = usize::try_from(state)
                    .ok()
                    .and_then(|s| s.checked_add(1))
                    .filter(|count| *count <= limit)
                    .ok_or(ValidationError::InvalidState {
                        state,
                        max_states: limit,
                    })?;
                max_states = max_states.max(count);
            }
        }
        let rules = records
            .iter()
            .map(|r| r.to_rule(max_states))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rules(max_states, rules)
    }
}

/// Out-of-domain lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("State {state} outside 0..{max_states}")]
    StateOutOfRange { state: i64, max_states: usize },
    #[error("Pattern '{0}' is not one of the nine canonical patterns")]
    UnknownPattern(String),
}
