//! Allocation service.
//!
//! Loads a snapshot from an [`AllocationStore`], runs the planner, committer
//! or adjuster over it, and hands the resulting writes back to the store.
//! The service holds no state of its own between calls.

use chrono::NaiveDate;

use crate::adjuster::{AdjustOutcome, AdjustPolicy, RollForwardAdjuster};
use crate::committer::{AllocationCommitter, ApplyOutcome};
use crate::error::{AllocationError, Result};
use crate::model::{AuditEntry, CellWrite, InitiativeId, PersonId, Snapshot};
use crate::planner::{AllocationPlanner, Plan};
use crate::storage::Config;

/// Persistence collaborator.
pub trait AllocationStore {
    /// Fetch everything needed to plan `initiative_id`.
    ///
    /// The people in scope are the team plus `extra_people`; cells and
    /// unavailability are loaded for all of them.
    fn load_snapshot(&self, initiative_id: InitiativeId, extra_people: &[PersonId]) -> Result<Snapshot>;

    /// Persist cell writes and their audit rows. All or nothing.
    fn commit(&self, writes: &[CellWrite], audit: &[AuditEntry]) -> Result<()>;
}

/// Preview, apply, and adjust over a store.
pub struct AllocationService<S> {
    store: S,
    planner: AllocationPlanner,
    committer: AllocationCommitter,
    adjust_policy: AdjustPolicy,
}

impl<S: AllocationStore> AllocationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            planner: AllocationPlanner::default(),
            committer: AllocationCommitter::new(),
            adjust_policy: AdjustPolicy::default(),
        }
    }

    /// Planner, calendar, and adjuster settings from `config`.
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store)
            .with_planner(AllocationPlanner::new(config.planner.clone(), config.calendar.clone()))
            .with_adjust_policy(config.adjuster.clone())
    }

    pub fn with_planner(mut self, planner: AllocationPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_adjust_policy(mut self, policy: AdjustPolicy) -> Self {
        self.adjust_policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Read-only plan for `initiative_id`.
    pub fn preview(&self, initiative_id: InitiativeId, person_ids: Option<&[PersonId]>) -> Result<Plan> {
        let snapshot = self.store.load_snapshot(initiative_id, person_ids.unwrap_or(&[]))?;
        Ok(self.planner.preview(&snapshot, person_ids)?)
    }

    /// Re-plan from fresh data and commit.
    ///
    /// With `expected_fingerprint`, a plan that no longer matches the one the
    /// caller saw fails with `StalePreview` and nothing is written.
    pub fn apply(
        &self,
        initiative_id: InitiativeId,
        person_ids: Option<&[PersonId]>,
        overwrite: bool,
        expected_fingerprint: Option<&str>,
    ) -> Result<ApplyOutcome> {
        let snapshot = self.store.load_snapshot(initiative_id, person_ids.unwrap_or(&[]))?;
        let plan = self.planner.preview(&snapshot, person_ids)?;

        if let Some(expected) = expected_fingerprint {
            if !expected.eq_ignore_ascii_case(&plan.fingerprint) {
                tracing::warn!(
                    initiative_id,
                    expected,
                    actual = %plan.fingerprint,
                    "preview is stale, refusing to apply"
                );
                return Err(AllocationError::StalePreview {
                    expected: expected.to_string(),
                    actual: plan.fingerprint,
                }
                .into());
            }
        }

        let existing: Vec<_> = snapshot.initiative_cells().cloned().collect();
        let outcome = self
            .committer
            .apply(initiative_id, &plan.cells(), &existing, overwrite)?;
        self.store.commit(&outcome.writes, &outcome.audit)?;
        Ok(outcome)
    }

    /// Absorb an overrun and commit the reductions.
    ///
    /// `step` and `min_days` override the service policy for this call.
    pub fn adjust(
        &self,
        initiative_id: InitiativeId,
        person_id: PersonId,
        day: NaiveDate,
        actual_hours: f64,
        step: Option<f64>,
        min_days: Option<u32>,
    ) -> Result<AdjustOutcome> {
        let snapshot = self.store.load_snapshot(initiative_id, &[person_id])?;
        if snapshot.person(person_id).is_none() {
            return Err(AllocationError::UnknownPerson(person_id).into());
        }

        let mut policy = self.adjust_policy.clone();
        if let Some(step) = step {
            policy = policy.with_step(step);
        }
        if let Some(min_days) = min_days {
            policy = policy.with_min_days(min_days);
        }

        let outcome = RollForwardAdjuster::new(policy).adjust(
            &snapshot.initiative,
            &snapshot.cells,
            person_id,
            day,
            actual_hours,
        )?;
        if !outcome.writes.is_empty() {
            self.store.commit(&outcome.writes, &outcome.audit)?;
        }
        Ok(outcome)
    }
}
