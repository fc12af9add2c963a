//! Roll-forward adjuster.
//!
//! When a person logs more actual hours on a day than were planned for an
//! initiative, the surplus is taken back from their later planned cells of
//! the same initiative. The overrun day and everything before it is never
//! touched.
//!
//! # Usage
//! ```rust,ignore
//! let adjuster = RollForwardAdjuster::new(AdjustPolicy::default().with_min_days(0));
//! let outcome = adjuster.adjust(&initiative, &cells, person_id, day, 6.0)?;
//! ```

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AllocationError;
use crate::model::hours::{quantize_up, round_hours, DEFAULT_STEP, EPSILON};
use crate::model::{
    check_cell_hours, AllocationCell, AuditEntry, AuditKind, CellWrite, Initiative, PersonId,
};

/// How `min_days` shields the cells right after the overrun day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionMode {
    /// Skip every date up to and including `day + min_days`.
    #[default]
    CalendarDays,
    /// Skip the first `min_days` cells that still hold hours.
    AllocatedDays,
}

/// Adjustment policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustPolicy {
    /// Largest single decrement (default: 0.5)
    #[serde(default = "default_step")]
    pub step_hours: f64,
    /// Protected days after the overrun day (default: 2)
    #[serde(default = "default_min_days")]
    pub min_days: u32,
    #[serde(default)]
    pub protection: ProtectionMode,
}

fn default_step() -> f64 {
    DEFAULT_STEP
}
fn default_min_days() -> u32 {
    2
}

impl Default for AdjustPolicy {
    fn default() -> Self {
        Self {
            step_hours: default_step(),
            min_days: default_min_days(),
            protection: ProtectionMode::default(),
        }
    }
}

impl AdjustPolicy {
    pub fn with_step(mut self, step_hours: f64) -> Self {
        self.step_hours = step_hours;
        self
    }

    pub fn with_min_days(mut self, min_days: u32) -> Self {
        self.min_days = min_days;
        self
    }

    pub fn with_protection(mut self, protection: ProtectionMode) -> Self {
        self.protection = protection;
        self
    }

    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.step_hours.is_nan() || self.step_hours <= 0.0 {
            return Err(AllocationError::InvalidStep(self.step_hours));
        }
        Ok(())
    }
}

/// One reduced cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentRow {
    pub date: NaiveDate,
    pub before_hours: f64,
    pub after_hours: f64,
    pub reduced: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustOutcome {
    pub run_id: String,
    /// Actual minus planned, rounded up to the step grid.
    pub overrun: f64,
    /// Sum of `reduced` over all rows.
    pub absorbed: f64,
    /// Overrun that found no reducible hours.
    pub shortfall: f64,
    pub rows: Vec<AdjustmentRow>,
    pub writes: Vec<CellWrite>,
    pub audit: Vec<AuditEntry>,
}

impl AdjustOutcome {
    fn untouched(run_id: String, overrun: f64) -> Self {
        Self {
            run_id,
            overrun,
            absorbed: 0.0,
            shortfall: overrun,
            rows: Vec::new(),
            writes: Vec::new(),
            audit: Vec::new(),
        }
    }
}

/// Absorbs overruns into future cells.
#[derive(Debug, Clone, Default)]
pub struct RollForwardAdjuster {
    policy: AdjustPolicy,
}

impl RollForwardAdjuster {
    pub fn new(policy: AdjustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AdjustPolicy {
        &self.policy
    }

    /// Absorb `actual_hours - planned` for (`initiative`, `person_id`, `day`).
    ///
    /// `cells` may hold any cells; only those of this initiative and person
    /// are considered. A zero overrun returns an empty outcome.
    pub fn adjust(
        &self,
        initiative: &Initiative,
        cells: &[AllocationCell],
        person_id: PersonId,
        day: NaiveDate,
        actual_hours: f64,
    ) -> Result<AdjustOutcome, AllocationError> {
        self.policy.validate()?;
        initiative.validate()?;
        if !initiative.contains(day) {
            return Err(AllocationError::DayOutsideWindow {
                day,
                start: initiative.start_date,
                end: initiative.end_date,
            });
        }
        check_cell_hours("actual_hours", actual_hours)?;

        let own: BTreeMap<NaiveDate, f64> = cells
            .iter()
            .filter(|c| c.initiative_id == initiative.id && c.person_id == person_id)
            .map(|c| (c.date, c.hours))
            .collect();

        let step = self.policy.step_hours;
        let planned = own.get(&day).copied().unwrap_or(0.0);
        let run_id = Uuid::new_v4().to_string();

        let surplus = round_hours((actual_hours - planned).max(0.0));
        if surplus <= EPSILON {
            tracing::debug!(initiative_id = initiative.id, person_id, %day, "no overrun");
            return Ok(AdjustOutcome::untouched(run_id, 0.0));
        }
        // Cuts stay on the step grid.
        let overrun = quantize_up(surplus, step);

        let candidates = self.candidates(&own, initiative, day);
        let mut remaining = overrun;
        let mut rows = Vec::new();

        for (date, before) in candidates {
            if remaining <= EPSILON {
                break;
            }
            let mut current = before;
            while remaining > EPSILON && current > EPSILON {
                let cut = round_hours(step.min(remaining).min(current));
                current = round_hours(current - cut);
                remaining = round_hours(remaining - cut);
            }
            rows.push(AdjustmentRow {
                date,
                before_hours: before,
                after_hours: current,
                reduced: round_hours(before - current),
            });
        }

        let absorbed = round_hours(rows.iter().map(|r| r.reduced).sum());
        let recorded_at = Utc::now();
        let writes = rows
            .iter()
            .map(|r| CellWrite {
                initiative_id: initiative.id,
                person_id,
                date: r.date,
                hours: r.after_hours,
            })
            .collect();
        let audit = rows
            .iter()
            .map(|r| AuditEntry {
                run_id: run_id.clone(),
                kind: AuditKind::RollForward,
                initiative_id: initiative.id,
                person_id,
                date: r.date,
                before_hours: r.before_hours,
                after_hours: r.after_hours,
                recorded_at,
            })
            .collect();

        tracing::info!(
            initiative_id = initiative.id,
            person_id,
            %day,
            overrun,
            absorbed,
            cells = rows.len(),
            "overrun rolled forward"
        );

        Ok(AdjustOutcome {
            run_id,
            overrun,
            absorbed,
            shortfall: round_hours(overrun - absorbed),
            rows,
            writes,
            audit,
        })
    }

    /// Reducible cells after `day`, ascending, with protection applied.
    fn candidates(
        &self,
        own: &BTreeMap<NaiveDate, f64>,
        initiative: &Initiative,
        day: NaiveDate,
    ) -> Vec<(NaiveDate, f64)> {
        let later = own
            .range(day..)
            .filter(|(&date, &hours)| date > day && initiative.contains(date) && hours > EPSILON)
            .map(|(&date, &hours)| (date, hours));

        match self.policy.protection {
            ProtectionMode::CalendarDays => {
                match day.checked_add_signed(Duration::days(i64::from(self.policy.min_days))) {
                    Some(protected_until) => later.filter(|&(date, _)| date > protected_until).collect(),
                    // Protection runs past the last representable date.
                    None => Vec::new(),
                }
            }
            ProtectionMode::AllocatedDays => later.skip(self.policy.min_days as usize).collect(),
        }
    }
}
