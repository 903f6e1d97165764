//! Lenient ingestion of externally generated rule programs.
//!
//! External generators (people, scripts, language models) routinely emit
//! partial or slightly wrong programs. Ingestion keeps every valid rule and
//! fills each missing or rejected slot with the deterministic default: the
//! alphabetically first open move, staying in the same state. Every fill is
//! reported back and logged so callers can see what was changed.

use std::fs;
use std::path::Path;

use log::warn;

use super::RuleTable;
use super::rule_table::slot_index;
use crate::schema::{Action, Pattern, Rule, RuleRecord, ValidationError};

/// Why a slot was filled with the default action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionReason {
    /// No rule addressed the slot.
    Missing,
    /// Every rule addressing the slot was rejected; holds the last error.
    Rejected(ValidationError),
}

/// A slot whose action was supplied by the default rather than the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub state: usize,
    pub pattern: Pattern,
    pub action: Action,
    pub reason: SubstitutionReason,
}

/// Input that could not be tied to any slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    /// 1-based line for text input, 0-based index for records.
    pub location: usize,
    pub error: ValidationError,
}

/// Complete table plus an account of what ingestion changed.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub table: RuleTable,
    pub substitutions: Vec<Substitution>,
    pub skipped: Vec<SkippedRule>,
}

impl IngestReport {
    /// True when the input described a complete, valid table by itself.
    pub fn is_clean(&self) -> bool {
        self.substitutions.is_empty() && self.skipped.is_empty()
    }
}

/// Errors loading a rule file from disk.
#[derive(Debug, thiserror::Error)]
pub enum RuleFileError {
    #[error("Failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse rule records: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid rule table: {0}")]
    Validation(#[from] ValidationError),
}

/// Collects accepted rules and rejections per slot.
struct SlotBuilder {
    max_states: usize,
    slots: Vec<Option<Action>>,
    rejections: Vec<Option<ValidationError>>,
    skipped: Vec<SkippedRule>,
}

impl SlotBuilder {
    fn new(max_states: usize) -> Result<Self, ValidationError> {
        if max_states == 0 {
            return Err(ValidationError::EmptyTable);
        }
        let len = max_states * Pattern::COUNT;
        Ok(Self {
            max_states,
            slots: vec![None; len],
            rejections: vec![None; len],
            skipped: Vec::new(),
        })
    }

    fn accept(&mut self, rule: Rule) {
        let idx = slot_index(rule.state, rule.pattern);
        self.slots[idx] = Some(rule.action);
        self.rejections[idx] = None;
    }

    /// Reject a rule whose slot is known. An earlier accepted rule stays.
    fn reject(&mut self, state: usize, pattern: Pattern, error: ValidationError) {
        warn!("Rejected rule for state {state}, pattern {pattern}: {error}");
        let idx = slot_index(state, pattern);
        if self.slots[idx].is_none() {
            self.rejections[idx] = Some(error);
        }
    }

    fn skip(&mut self, location: usize, error: ValidationError) {
        warn!("Skipped rule at {location}: {error}");
        self.skipped.push(SkippedRule { location, error });
    }

    fn finish(self) -> Result<IngestReport, ValidationError> {
        let mut substitutions = Vec::new();
        let mut rejections = self.rejections;

        let table = RuleTable::from_fn(self.max_states, |state, pattern| {
            let idx = slot_index(state, pattern);
            if let Some(action) = self.slots[idx] {
                return action;
            }
            let action = Action::new(pattern.default_move(), state);
            let reason = match rejections[idx].take() {
                Some(error) => SubstitutionReason::Rejected(error),
                None => SubstitutionReason::Missing,
            };
            warn!(
                "Filled state {state}, pattern {pattern} with default {} {state}",
                action.direction
            );
            substitutions.push(Substitution {
                state,
                pattern,
                action,
                reason,
            });
            action
        })?;

        Ok(IngestReport {
            table,
            substitutions,
            skipped: self.skipped,
        })
    }
}

/// Ingest rule text, one `PATTERN STATE -> MOVE NEXT_STATE` rule per line.
///
/// Blank lines, `#` comments and lines without `->` are ignored. Lines in
/// `STATE PATTERN -> MOVE NEXT_STATE` order are accepted too. Fails only
/// when `max_states` is zero.
pub fn ingest_text(text: &str, max_states: usize) -> Result<IngestReport, ValidationError> {
    let mut builder = SlotBuilder::new(max_states)?;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || !line.contains("->") {
            continue;
        }
        match line.parse::<Rule>() {
            Ok(rule) if rule.state >= max_states => builder.skip(
                i + 1,
                ValidationError::InvalidState {
                    state: rule.state as i64,
                    max_states,
                },
            ),
            Ok(rule) => match rule.check(max_states) {
                Ok(()) => builder.accept(rule),
                Err(error) => builder.reject(rule.state, rule.pattern, error),
            },
            Err(error) => builder.skip(i + 1, error),
        }
    }

    builder.finish()
}

/// Ingest structured records with the same fill policy as [`ingest_text`].
pub fn ingest_records(
    records: &[RuleRecord],
    max_states: usize,
) -> Result<IngestReport, ValidationError> {
    let mut builder = SlotBuilder::new(max_states)?;

    for (i, record) in records.iter().enumerate() {
        match record.to_rule(max_states) {
            Ok(rule) => builder.accept(rule),
            Err(error) => {
                let slot = record.pattern.parse::<Pattern>().ok().and_then(|pattern| {
                    usize::try_from(record.state)
                        .ok()
                        .filter(|s| *s < max_states)
                        .map(|state| (state, pattern))
                });
                match slot {
                    Some((state, pattern)) => builder.reject(state, pattern, error),
                    None => builder.skip(i, error),
                }
            }
        }
    }

    builder.finish()
}

/// Load a rule program from disk.
///
/// `.json` files hold an array of [`RuleRecord`]s; anything else is read as
/// rule text.
pub fn load_rule_file(
    path: impl AsRef<Path>,
    max_states: usize,
) -> Result<IngestReport, RuleFileError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let report = if is_json {
        let records: Vec<RuleRecord> = serde_json::from_str(&contents)?;
        ingest_records(&records, max_states)?
    } else {
        ingest_text(&contents, max_states)?
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Direction;
    use std::io::Write;

    fn full_text(max_states: usize) -> String {
        RuleTable::filler(max_states).unwrap().to_string()
    }

    #[test]
    fn test_complete_text_is_clean() {
        let text = full_text(2);
        let report = ingest_text(&text, 2).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.table, RuleTable::filler(2).unwrap());
    }

    #[test]
    fn test_missing_slots_filled() {
        let text = "# two rules only\n\nxxxx 0 -> N 1\nxxxx 1 -> W 0\n";
        let report = ingest_text(text, 2).unwrap();

        assert_eq!(report.substitutions.len(), 16);
        assert!(report.skipped.is_empty());
        assert!(
            report
                .substitutions
                .iter()
                .all(|s| s.reason == SubstitutionReason::Missing)
        );
        assert_eq!(
            report.table.lookup(0, Pattern::Open),
            Ok(Action::new(Direction::North, 1))
        );
        assert_eq!(
            report.table.lookup(1, Pattern::SouthEast),
            Ok(Action::new(Direction::North, 1))
        );
        assert!(report.table.validate().is_ok());
    }

    #[test]
    fn test_wall_collision_replaced() {
        let text = "NxWx 0 -> N 0";
        let report = ingest_text(text, 1).unwrap();

        let sub = report
            .substitutions
            .iter()
            .find(|s| s.pattern == Pattern::NorthWest)
            .unwrap();
        assert!(matches!(
            sub.reason,
            SubstitutionReason::Rejected(ValidationError::WallCollision { .. })
        ));
        assert_eq!(sub.action, Action::new(Direction::East, 0));
        assert!(report.table.validate().is_ok());
    }

    #[test]
    fn test_state_first_order_accepted() {
        let report = ingest_text("0 xxxx -> S 0", 1).unwrap();
        assert_eq!(
            report.table.lookup(0, Pattern::Open),
            Ok(Action::new(Direction::South, 0))
        );
        assert_eq!(report.substitutions.len(), 8);
    }

    #[test]
    fn test_later_rule_wins() {
        let text = "xxxx 0 -> S 0\nxxxx 0 -> W 0\nxxxx 0 -> N 0 garbage";
        let report = ingest_text(text, 1).unwrap();
        assert_eq!(
            report.table.lookup(0, Pattern::Open),
            Ok(Action::new(Direction::West, 0))
        );
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].location, 3);
    }

    #[test]
    fn test_rejected_rule_keeps_earlier_valid_rule() {
        let text = "xxxx 0 -> S 0\nxxxx 0 -> N 9";
        let report = ingest_text(text, 1).unwrap();
        assert_eq!(
            report.table.lookup(0, Pattern::Open),
            Ok(Action::new(Direction::South, 0))
        );
        assert!(
            report
                .substitutions
                .iter()
                .all(|sub| sub.pattern != Pattern::Open)
        );
    }

    #[test]
    fn test_out_of_range_lines_skipped() {
        let text = "xxxx 7 -> N 0\nxxxx 0 -> N 9\nNxWW 0 -> S 0";
        let report = ingest_text(text, 2).unwrap();

        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(
            report.skipped[0].error,
            ValidationError::InvalidState { state: 7, .. }
        ));
        assert!(matches!(
            report.skipped[1].error,
            ValidationError::InvalidPattern(_)
        ));
        // Bad next state is tied to its slot and replaced.
        let sub = report
            .substitutions
            .iter()
            .find(|s| s.state == 0 && s.pattern == Pattern::Open)
            .unwrap();
        assert!(matches!(sub.reason, SubstitutionReason::Rejected(_)));
    }

    #[test]
    fn test_zero_states_rejected() {
        assert_eq!(
            ingest_text("", 0).unwrap_err(),
            ValidationError::EmptyTable
        );
    }

    #[test]
    fn test_ingest_records() {
        let records = vec![
            RuleRecord {
                state: 0,
                pattern: "xxxx".to_string(),
                movement: "S".to_string(),
                next_state: 0,
            },
            RuleRecord {
                state: 0,
                pattern: "Nxxx".to_string(),
                movement: "Q".to_string(),
                next_state: 0,
            },
            RuleRecord {
                state: -1,
                pattern: "xxxx".to_string(),
                movement: "N".to_string(),
                next_state: 0,
            },
        ];
        let report = ingest_records(&records, 1).unwrap();

        assert_eq!(
            report.table.lookup(0, Pattern::Open),
            Ok(Action::new(Direction::South, 0))
        );
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].location, 2);
        let sub = report
            .substitutions
            .iter()
            .find(|s| s.pattern == Pattern::North)
            .unwrap();
        assert_eq!(
            sub.reason,
            SubstitutionReason::Rejected(ValidationError::InvalidMove("Q".to_string()))
        );
    }

    #[test]
    fn test_load_text_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", full_text(3)).unwrap();

        let report = load_rule_file(file.path(), 3).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.table.max_states(), 3);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let table = RuleTable::filler(2).unwrap();
        fs::write(&path, serde_json::to_string(&table).unwrap()).unwrap();

        let report = load_rule_file(&path, 2).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.table, table);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_rule_file(dir.path().join("missing.txt"), 2),
            Err(RuleFileError::Io(_))
        ));

        let path = dir.path().join("broken.JSON");
        fs::write(&path, "[{").unwrap();
        assert!(matches!(
            load_rule_file(&path, 2),
            Err(RuleFileError::Json(_))
        ));
    }
}
