//! Allocation committer.
//!
//! Reconciles a plan against the persisted cells of one initiative under
//! fill-only or overwrite policy. The committer decides; the persistence
//! layer writes. Nothing here touches storage.
//!
//! Per plan cell, against the existing (initiative, person, date) cell:
//! - empty or zero: write, `inserted`
//! - non-zero, fill-only: untouched, `skipped`
//! - non-zero, overwrite, same hours: `skipped`
//! - non-zero, overwrite, different hours: write, `updated`

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AllocationError;
use crate::model::hours::{is_zero, same_hours};
use crate::model::{
    check_cell_hours, AllocationCell, AuditEntry, AuditKind, CellWrite, InitiativeId, PersonId,
};

/// One (person, date, hours) entry of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanCell {
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub hours: f64,
}

/// What happened to one plan cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Inserted,
    Updated,
    Skipped,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyAction::Inserted => "inserted",
            ApplyAction::Updated => "updated",
            ApplyAction::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyResultRow {
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub hours: f64,
    pub action: ApplyAction,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplySummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ApplySummary {
    fn record(&mut self, action: ApplyAction) {
        match action {
            ApplyAction::Inserted => self.inserted += 1,
            ApplyAction::Updated => self.updated += 1,
            ApplyAction::Skipped => self.skipped += 1,
        }
    }

    pub fn changed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Decisions plus the writes and audit rows that realize them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyOutcome {
    pub run_id: String,
    pub initiative_id: InitiativeId,
    pub overwrite: bool,
    pub results: Vec<ApplyResultRow>,
    pub writes: Vec<CellWrite>,
    pub audit: Vec<AuditEntry>,
    pub summary: ApplySummary,
}

/// Stateless committer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationCommitter;

impl AllocationCommitter {
    pub fn new() -> Self {
        Self
    }

    /// Decide an action for each plan cell.
    ///
    /// `existing` may contain cells of other initiatives; only those of
    /// `initiative_id` are consulted. Results follow plan order.
    pub fn apply(
        &self,
        initiative_id: InitiativeId,
        plan: &[PlanCell],
        existing: &[AllocationCell],
        overwrite: bool,
    ) -> Result<ApplyOutcome, AllocationError> {
        let mut seen = HashSet::new();
        for cell in plan {
            check_cell_hours("plan.hours", cell.hours)?;
            if !seen.insert((cell.person_id, cell.date)) {
                return Err(AllocationError::DuplicateCell {
                    person_id: cell.person_id,
                    date: cell.date,
                });
            }
        }

        let current: HashMap<(PersonId, NaiveDate), f64> = existing
            .iter()
            .filter(|c| c.initiative_id == initiative_id)
            .map(|c| ((c.person_id, c.date), c.hours))
            .collect();

        let run_id = Uuid::new_v4().to_string();
        let recorded_at = Utc::now();
        let mut results = Vec::with_capacity(plan.len());
        let mut writes = Vec::new();
        let mut audit = Vec::new();
        let mut summary = ApplySummary::default();

        for cell in plan {
            let before = current.get(&(cell.person_id, cell.date)).copied().unwrap_or(0.0);
            let action = decide(before, cell.hours, overwrite);

            if action != ApplyAction::Skipped {
                writes.push(CellWrite {
                    initiative_id,
                    person_id: cell.person_id,
                    date: cell.date,
                    hours: cell.hours,
                });
                audit.push(AuditEntry {
                    run_id: run_id.clone(),
                    kind: AuditKind::AutoAllocate,
                    initiative_id,
                    person_id: cell.person_id,
                    date: cell.date,
                    before_hours: before,
                    after_hours: cell.hours,
                    recorded_at,
                });
            }

            summary.record(action);
            results.push(ApplyResultRow {
                person_id: cell.person_id,
                date: cell.date,
                hours: cell.hours,
                action,
            });
        }

        tracing::info!(
            initiative_id,
            overwrite,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "allocation plan reconciled"
        );

        Ok(ApplyOutcome {
            run_id,
            initiative_id,
            overwrite,
            results,
            writes,
            audit,
            summary,
        })
    }
}

fn decide(before: f64, hours: f64, overwrite: bool) -> ApplyAction {
    if is_zero(before) {
        // Writing zero into an empty cell changes nothing.
        if is_zero(hours) {
            ApplyAction::Skipped
        } else {
            ApplyAction::Inserted
        }
    } else if !overwrite || same_hours(before, hours) {
        ApplyAction::Skipped
    } else {
        ApplyAction::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn plan_cell(person_id: PersonId, d: u32, hours: f64) -> PlanCell {
        PlanCell {
            person_id,
            date: date(d),
            hours,
        }
    }

    #[test]
    fn fill_only_keeps_existing_hours() {
        let existing = vec![AllocationCell::new(1, 7, date(3), 3.0)];
        let outcome = AllocationCommitter::new()
            .apply(1, &[plan_cell(7, 3, 5.0)], &existing, false)
            .unwrap();
        assert_eq!(outcome.results[0].action, ApplyAction::Skipped);
        assert!(outcome.writes.is_empty());
        assert!(outcome.audit.is_empty());
    }

    #[test]
    fn empty_and_zero_cells_are_inserted() {
        let existing = vec![AllocationCell::new(1, 7, date(4), 0.0)];
        let outcome = AllocationCommitter::new()
            .apply(1, &[plan_cell(7, 3, 2.0), plan_cell(7, 4, 1.5)], &existing, false)
            .unwrap();
        assert_eq!(outcome.summary, ApplySummary { inserted: 2, updated: 0, skipped: 0 });
        assert_eq!(outcome.writes.len(), 2);
        assert_eq!(outcome.audit[1].before_hours, 0.0);
        assert_eq!(outcome.audit[1].after_hours, 1.5);
    }

    #[test]
    fn overwrite_updates_only_changed_cells() {
        let existing = vec![
            AllocationCell::new(1, 7, date(3), 3.0),
            AllocationCell::new(1, 7, date(4), 2.0),
        ];
        let outcome = AllocationCommitter::new()
            .apply(1, &[plan_cell(7, 3, 5.0), plan_cell(7, 4, 2.0)], &existing, true)
            .unwrap();
        assert_eq!(outcome.results[0].action, ApplyAction::Updated);
        assert_eq!(outcome.results[1].action, ApplyAction::Skipped);
        assert_eq!(outcome.writes, vec![CellWrite {
            initiative_id: 1,
            person_id: 7,
            date: date(3),
            hours: 5.0,
        }]);
        assert_eq!(outcome.audit[0].run_id, outcome.run_id);
        assert_eq!(outcome.audit[0].kind, AuditKind::AutoAllocate);
    }

    #[test]
    fn cells_of_other_initiatives_are_ignored() {
        let existing = vec![AllocationCell::new(2, 7, date(3), 3.0)];
        let outcome = AllocationCommitter::new()
            .apply(1, &[plan_cell(7, 3, 5.0)], &existing, false)
            .unwrap();
        assert_eq!(outcome.results[0].action, ApplyAction::Inserted);
    }

    #[test]
    fn overwrite_with_zero_clears_a_cell() {
        let existing = vec![AllocationCell::new(1, 7, date(3), 3.0)];
        let outcome = AllocationCommitter::new()
            .apply(1, &[plan_cell(7, 3, 0.0), plan_cell(7, 4, 0.0)], &existing, true)
            .unwrap();
        assert_eq!(outcome.results[0].action, ApplyAction::Updated);
        assert_eq!(outcome.results[1].action, ApplyAction::Skipped);
    }

    #[test]
    fn invalid_plans_are_rejected() {
        let committer = AllocationCommitter::new();
        assert!(matches!(
            committer.apply(1, &[plan_cell(7, 3, -1.0)], &[], false),
            Err(AllocationError::NegativeInput { .. })
        ));
        assert!(matches!(
            committer.apply(1, &[plan_cell(7, 3, 25.0)], &[], false),
            Err(AllocationError::HoursOutOfRange { .. })
        ));
        assert_eq!(
            committer
                .apply(1, &[plan_cell(7, 3, 1.0), plan_cell(7, 3, 2.0)], &[], false)
                .unwrap_err(),
            AllocationError::DuplicateCell { person_id: 7, date: date(3) }
        );
    }

    #[test]
    fn actions_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&ApplyAction::Inserted).unwrap(), "\"inserted\"");
        assert_eq!(ApplyAction::Skipped.to_string(), "skipped");
    }
}
