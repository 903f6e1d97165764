//! Rule vocabulary: moves, wall patterns, and the textual rule format.
//!
//! A rule reads `PATTERN STATE -> MOVE NEXT_STATE`, e.g. `xExx 0 -> S 1`.
//! The pattern lists the walls around the robot in N/E/W/S order, with `x`
//! standing for an open side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four compass moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "S")]
    South,
}

impl Direction {
    /// All directions in pattern order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::West,
        Direction::South,
    ];

    /// Single-letter form used in rule text.
    pub const fn as_char(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::West => 'W',
            Direction::South => 'S',
        }
    }

    /// Row/column offset of a single step.
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
            Direction::South => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    /// Accepts `N`/`North` and friends, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Direction::North),
            "e" | "east" => Ok(Direction::East),
            "w" | "west" => Ok(Direction::West),
            "s" | "south" => Ok(Direction::South),
            _ => Err(ValidationError::InvalidMove(s.to_string())),
        }
    }
}

/// Which of the four neighbouring sides are grid boundary.
///
/// Only the nine arrangements reachable on a grid of at least 2x2 exist:
/// open interior, one of four edges, or one of four corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Pattern {
    Open,
    North,
    NorthEast,
    NorthWest,
    South,
    SouthEast,
    SouthWest,
    East,
    West,
}

impl Pattern {
    /// Number of distinct patterns.
    pub const COUNT: usize = 9;

    /// Every pattern, in table index order.
    pub const ALL: [Pattern; Pattern::COUNT] = [
        Pattern::Open,
        Pattern::North,
        Pattern::NorthEast,
        Pattern::NorthWest,
        Pattern::South,
        Pattern::SouthEast,
        Pattern::SouthWest,
        Pattern::East,
        Pattern::West,
    ];

    /// Dense index in `0..Pattern::COUNT`.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Canonical four-character encoding.
    pub const fn as_str(self) -> &'static str {
        match self {
            Pattern::Open => "xxxx",
            Pattern::North => "Nxxx",
            Pattern::NorthEast => "NExx",
            Pattern::NorthWest => "NxWx",
            Pattern::South => "xxxS",
            Pattern::SouthEast => "xExS",
            Pattern::SouthWest => "xxWS",
            Pattern::East => "xExx",
            Pattern::West => "xxWx",
        }
    }

    /// Pattern seen from `(row, col)` on a `rows` x `columns` grid.
    pub fn at(row: usize, col: usize, rows: usize, columns: usize) -> Pattern {
        let top = row == 0;
        let bottom = !top && row + 1 >= rows;
        let left = col == 0;
        let right = !left && col + 1 >= columns;

        match (top, bottom, left, right) {
            (true, _, true, _) => Pattern::NorthWest,
            (true, _, _, true) => Pattern::NorthEast,
            (true, _, _, _) => Pattern::North,
            (_, true, true, _) => Pattern::SouthWest,
            (_, true, _, true) => Pattern::SouthEast,
            (_, true, _, _) => Pattern::South,
            (_, _, true, _) => Pattern::West,
            (_, _, _, true) => Pattern::East,
            _ => Pattern::Open,
        }
    }

    /// Whether the side in `direction` is a wall.
    pub const fn blocks(self, direction: Direction) -> bool {
        let bytes = self.as_str().as_bytes();
        let slot = match direction {
            Direction::North => 0,
            Direction::East => 1,
            Direction::West => 2,
            Direction::South => 3,
        };
        bytes[slot] != b'x'
    }

    /// Moves that do not run into a wall, in `Direction::ALL` order.
    pub fn open_moves(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| !self.blocks(*d))
    }

    /// Alphabetically first open move (`E` < `N` < `S` < `W`).
    pub fn default_move(self) -> Direction {
        [
            Direction::East,
            Direction::North,
            Direction::South,
            Direction::West,
        ]
        .into_iter()
        .find(|d| !self.blocks(*d))
        .unwrap_or(Direction::East)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidPattern(s.to_string()))
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.as_str().to_string()
    }
}

impl TryFrom<String> for Pattern {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Right-hand side of a rule: where to move and which state to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub direction: Direction,
    pub next_state: usize,
}

impl Action {
    pub const fn new(direction: Direction, next_state: usize) -> Self {
        Self {
            direction,
            next_state,
        }
    }
}

/// A fully typed rule `(state, pattern) -> (move, next_state)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    pub state: usize,
    pub pattern: Pattern,
    pub action: Action,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.pattern, self.state, self.action.direction, self.action.next_state
        )
    }
}

impl FromStr for Rule {
    type Err = ValidationError;

    /// Parse `PATTERN STATE -> MOVE NEXT_STATE`.
    ///
    /// `STATE PATTERN -> MOVE NEXT_STATE` is accepted as well. State range is
    /// not checked here since it depends on the table size.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedRule(line.trim().to_string());

        let (lhs, rhs) = line.split_once("->").ok_or_else(malformed)?;
        let lhs: Vec<&str> = lhs.split_whitespace().collect();
        let rhs: Vec<&str> = rhs.split_whitespace().collect();
        let (&[first, second], &[movement, next]) = (lhs.as_slice(), rhs.as_slice()) else {
            return Err(malformed());
        };

        let (pattern, state) = match first.parse::<i64>() {
            Ok(_) => (second, first),
            Err(_) => (first, second),
        };

        let pattern: Pattern = pattern.parse()?;
        let state = parse_state(state)?;
        let direction: Direction = movement.parse()?;
        let next_state = parse_state(next)?;

        Ok(Rule {
            state,
            pattern,
            action: Action::new(direction, next_state),
        })
    }
}

fn parse_state(token: &str) -> Result<usize, ValidationError> {
    token
        .parse()
        .map_err(|_| ValidationError::MalformedRule(token.to_string()))
}

/// Untyped rule as delivered by an external rule generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub state: i64,
    pub pattern: String,
    #[serde(rename = "move")]
    pub movement: String,
    pub next_state: i64,
}

impl RuleRecord {
    /// Check the record against a table of `max_states` states.
    pub fn to_rule(&self, max_states: usize) -> Result<Rule, ValidationError> {
        let pattern: Pattern = self.pattern.parse()?;
        let direction: Direction = self.movement.parse()?;
        let state = checked_state(self.state, max_states)?;
        let next_state = checked_state(self.next_state, max_states)?;
        let rule = Rule {
            state,
            pattern,
            action: Action::new(direction, next_state),
        };
        rule.check(max_states)?;
        Ok(rule)
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        Self {
            state: rule.state as i64,
            pattern: rule.pattern.as_str().to_string(),
            movement: rule.action.direction.to_string(),
            next_state: rule.action.next_state as i64,
        }
    }
}

fn checked_state(state: i64, max_states: usize) -> Result<usize, ValidationError> {
    match usize::try_from(state) {
        Ok(s) if s < max_states => Ok(s),
        _ => Err(ValidationError::InvalidState { state, max_states }),
    }
}

impl Rule {
    /// Check state range and that the move does not point into a wall.
    pub fn check(&self, max_states: usize) -> Result<(), ValidationError> {
        checked_state(self.state as i64, max_states)?;
        checked_state(self.action.next_state as i64, max_states)?;
        if self.pattern.blocks(self.action.direction) {
            return Err(ValidationError::WallCollision {
                state: self.state,
                pattern: self.pattern,
                direction: self.action.direction,
            });
        }
        Ok(())
    }
}

/// Reasons a rule or rule table is not an acceptable program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No rule for state {state}, pattern {pattern}")]
    IncompleteTable { state: usize, pattern: Pattern },
    #[error("Unknown pattern '{0}'")]
    InvalidPattern(String),
    #[error("Unknown move '{0}'")]
    InvalidMove(String),
    #[error("State {state} outside 0..{max_states}")]
    InvalidState { state: i64, max_states: usize },
    #[error("Rule for state {state}, pattern {pattern} moves {direction} into a wall")]
    WallCollision {
        state: usize,
        pattern: Pattern,
        direction: Direction,
    },
    #[error("Malformed rule '{0}'")]
    MalformedRule(String),
    #[error("Rule table has no states")]
    EmptyTable,
}
