//! Role-based auto-allocation planner.
//!
//! Turns an initiative's role demand into a day-by-day hour plan:
//! - resolves the eligible pool (explicit selection or the team)
//! - matches people to demand rows by normalized role code
//! - walks roles in priority order, dates ascending, people by name, and
//!   hands out hours in fixed steps while headroom lasts
//! - when demand is still open and over-capacity is allowed, spreads the rest
//!   over the same unblocked slots and reports it as a warning
//!
//! The planner is a pure function of the snapshot: identical input yields an
//! identical plan, including its fingerprint.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::calendar::{candidate_dates, CalendarRules, EligibilityCalendar};
use crate::capacity::CapacityLedger;
use crate::committer::PlanCell;
use crate::error::AllocationError;
use crate::model::hours::{
    is_zero, quantize_down, quantize_up, round_hours, DEFAULT_DAILY_CAPACITY, DEFAULT_STEP,
    EPSILON, MAX_CELL_HOURS,
};
use crate::model::{InitiativeId, Person, PersonId, RoleCode, Snapshot};

/// Planner configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerConfig {
    /// Hours granted per turn.
    #[serde(default = "default_step")]
    pub step_hours: f64,
    /// Capacity for people without a recorded one.
    #[serde(default = "default_capacity")]
    pub default_daily_capacity: f64,
    /// Spread unmet demand beyond headroom instead of leaving it open.
    #[serde(default = "default_true")]
    pub allow_over_capacity: bool,
    /// Role priority. Roles missing here are planned afterwards in enum order.
    #[serde(default = "default_role_order")]
    pub role_order: Vec<RoleCode>,
}

fn default_step() -> f64 {
    DEFAULT_STEP
}
fn default_capacity() -> f64 {
    DEFAULT_DAILY_CAPACITY
}
fn default_true() -> bool {
    true
}
fn default_role_order() -> Vec<RoleCode> {
    RoleCode::PRIORITY.to_vec()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            step_hours: default_step(),
            default_daily_capacity: default_capacity(),
            allow_over_capacity: true,
            role_order: default_role_order(),
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.step_hours.is_nan() || self.step_hours <= 0.0 || self.step_hours > MAX_CELL_HOURS {
            return Err(AllocationError::InvalidStep(self.step_hours));
        }
        if self.default_daily_capacity < 0.0 {
            return Err(AllocationError::NegativeInput {
                field: "planner.default_daily_capacity".into(),
                value: self.default_daily_capacity,
            });
        }
        if self.default_daily_capacity > MAX_CELL_HOURS {
            return Err(AllocationError::HoursOutOfRange {
                field: "planner.default_daily_capacity".into(),
                value: self.default_daily_capacity,
            });
        }
        Ok(())
    }

    /// Configured order followed by any role it leaves out.
    fn effective_role_order(&self) -> Vec<RoleCode> {
        let mut order: Vec<RoleCode> = Vec::with_capacity(RoleCode::PRIORITY.len());
        for role in self.role_order.iter().chain(RoleCode::PRIORITY.iter()) {
            if !order.contains(role) {
                order.push(*role);
            }
        }
        order
    }
}

/// One proposed (person, role, date, hours) assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewRow {
    pub person_id: PersonId,
    pub person_name: String,
    pub role: RoleCode,
    pub date: NaiveDate,
    pub hours: f64,
}

/// Non-fatal findings of a planning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// Inactive person dropped from the pool
    InactivePerson { person_id: PersonId },
    /// Person whose role code matches no known role
    UnknownRole { person_id: PersonId, role_code: String },
    /// Role has demand but nobody in the pool holds it
    NoEligiblePeople { role: RoleCode },
    /// Role demand only partially covered
    UnmetDemand {
        role: RoleCode,
        planned_hours: f64,
        allocated_hours: f64,
    },
    /// Hours placed beyond the person's headroom
    OverCapacity {
        person_id: PersonId,
        date: NaiveDate,
        over_by: f64,
    },
}

/// Planned versus previewed hours for one role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandGap {
    pub role: RoleCode,
    pub planned_hours: f64,
    pub allocated_hours: f64,
    pub unmet_hours: f64,
}

/// Result of a preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub initiative_id: InitiativeId,
    pub rows: Vec<PreviewRow>,
    pub warnings: Vec<PlanWarning>,
    pub gaps: Vec<DemandGap>,
    /// SHA-256 (hex) over the canonical rows.
    pub fingerprint: String,
}

impl Plan {
    pub fn total_hours(&self) -> f64 {
        round_hours(self.rows.iter().map(|r| r.hours).sum())
    }

    pub fn hours_for_role(&self, role: RoleCode) -> f64 {
        round_hours(self.rows.iter().filter(|r| r.role == role).map(|r| r.hours).sum())
    }

    /// Committer input.
    pub fn cells(&self) -> Vec<PlanCell> {
        self.rows
            .iter()
            .map(|r| PlanCell {
                person_id: r.person_id,
                date: r.date,
                hours: r.hours,
            })
            .collect()
    }

    pub fn has_over_capacity(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, PlanWarning::OverCapacity { .. }))
    }
}

/// Deterministic fingerprint of a set of rows.
pub fn fingerprint(initiative_id: InitiativeId, rows: &[PreviewRow]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("initiative:{initiative_id}\n"));
    for row in rows {
        hasher.update(format!(
            "{}|{}|{}|{:.2}\n",
            row.person_id, row.role, row.date, row.hours
        ));
    }
    hex::encode(hasher.finalize())
}

/// Hours handed out for one role, keyed by (date, index into the role's people).
type RoleAllocation = BTreeMap<(NaiveDate, usize), f64>;

/// Greedy planner over a snapshot.
#[derive(Debug, Clone, Default)]
pub struct AllocationPlanner {
    config: PlannerConfig,
    rules: CalendarRules,
}

impl AllocationPlanner {
    pub fn new(config: PlannerConfig, rules: CalendarRules) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn rules(&self) -> &CalendarRules {
        &self.rules
    }

    /// Build the preview for `snapshot.initiative`.
    ///
    /// `eligible` overrides the team when it is present and non-empty.
    pub fn preview(
        &self,
        snapshot: &Snapshot,
        eligible: Option<&[PersonId]>,
    ) -> Result<Plan, AllocationError> {
        self.config.validate()?;
        snapshot.validate()?;

        let initiative = &snapshot.initiative;
        let step = self.config.step_hours;
        let mut warnings = Vec::new();

        let pool = resolve_pool(snapshot, eligible, &mut warnings)?;
        let by_role = partition_by_role(pool, &mut warnings);

        let calendar = EligibilityCalendar::new(&self.rules, &snapshot.unavailability);
        let dates = candidate_dates(initiative);
        let mut ledger = CapacityLedger::excluding_initiative(&snapshot.cells, initiative.id)
            .with_default_capacity(self.config.default_daily_capacity);

        // Last row wins for a repeated role.
        let demand: BTreeMap<RoleCode, f64> = snapshot
            .role_demand
            .iter()
            .filter(|d| d.initiative_id == initiative.id)
            .map(|d| (d.role, d.planned_hours))
            .collect();

        let mut rows = Vec::new();
        let mut gaps = Vec::new();

        for role in self.config.effective_role_order() {
            let Some(&planned) = demand.get(&role) else {
                continue;
            };
            if planned <= EPSILON {
                continue;
            }

            let people = by_role.get(&role).map(Vec::as_slice).unwrap_or(&[]);
            if people.is_empty() {
                tracing::debug!(%role, planned, "no eligible people for role");
                warnings.push(PlanWarning::NoEligiblePeople { role });
            }

            let slots: Vec<(NaiveDate, usize)> = dates
                .iter()
                .flat_map(|&date| (0..people.len()).map(move |i| (date, i)))
                .filter(|&(date, i)| !calendar.is_blocked(people[i].id, date).blocked)
                .collect();

            let mut allocation = RoleAllocation::new();
            let remaining = fill_within_headroom(
                &slots,
                people,
                &mut ledger,
                &mut allocation,
                quantize_up(planned, step),
                step,
            );

            if remaining > EPSILON && self.config.allow_over_capacity && !slots.is_empty() {
                tracing::warn!(
                    initiative_id = initiative.id,
                    %role,
                    remaining,
                    "headroom exhausted, placing remaining demand over capacity"
                );
                let overflow = fill_over_capacity(&slots, people, &mut ledger, &mut allocation, remaining, step);
                if overflow.remaining > EPSILON {
                    tracing::debug!(%role, remaining = overflow.remaining, "slots saturated at 24h");
                }
                for ((date, i), over_by) in overflow.placed {
                    warnings.push(PlanWarning::OverCapacity {
                        person_id: people[i].id,
                        date,
                        over_by,
                    });
                }
            }

            let allocated: f64 = round_hours(allocation.values().sum());
            let unmet = round_hours((planned - allocated).max(0.0));
            tracing::debug!(%role, planned, allocated, unmet, "role planned");

            if unmet > EPSILON {
                warnings.push(PlanWarning::UnmetDemand {
                    role,
                    planned_hours: planned,
                    allocated_hours: allocated,
                });
            }
            gaps.push(DemandGap {
                role,
                planned_hours: planned,
                allocated_hours: allocated,
                unmet_hours: unmet,
            });

            for ((date, i), hours) in allocation {
                if is_zero(hours) {
                    continue;
                }
                rows.push(PreviewRow {
                    person_id: people[i].id,
                    person_name: people[i].full_name.clone(),
                    role,
                    date,
                    hours,
                });
            }
        }

        let fingerprint = fingerprint(initiative.id, &rows);
        Ok(Plan {
            initiative_id: initiative.id,
            rows,
            warnings,
            gaps,
            fingerprint,
        })
    }
}

/// Explicit selection when given and non-empty, else the team. Inactive
/// people are dropped.
fn resolve_pool<'a>(
    snapshot: &'a Snapshot,
    eligible: Option<&[PersonId]>,
    warnings: &mut Vec<PlanWarning>,
) -> Result<Vec<&'a Person>, AllocationError> {
    let ids: &[PersonId] = match eligible {
        Some(ids) if !ids.is_empty() => ids,
        _ => &snapshot.team,
    };

    let mut seen = BTreeSet::new();
    let mut pool = Vec::new();
    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        let person = snapshot.person(id).ok_or(AllocationError::UnknownPerson(id))?;
        if !person.active {
            warnings.push(PlanWarning::InactivePerson { person_id: id });
            continue;
        }
        pool.push(person);
    }
    Ok(pool)
}

/// Group by normalized role, each group sorted by name then id.
fn partition_by_role<'a>(
    pool: Vec<&'a Person>,
    warnings: &mut Vec<PlanWarning>,
) -> BTreeMap<RoleCode, Vec<&'a Person>> {
    let mut by_role: BTreeMap<RoleCode, Vec<&'a Person>> = BTreeMap::new();
    for person in pool {
        match person.role() {
            Some(role) => by_role.entry(role).or_default().push(person),
            None => warnings.push(PlanWarning::UnknownRole {
                person_id: person.id,
                role_code: person.role_code.clone(),
            }),
        }
    }
    for people in by_role.values_mut() {
        people.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
    }
    by_role
}

/// Headroom pass. Slots are grouped by date; on each date the people take
/// turns receiving one step until the date is saturated. Returns what is
/// still unplaced.
fn fill_within_headroom(
    slots: &[(NaiveDate, usize)],
    people: &[&Person],
    ledger: &mut CapacityLedger,
    allocation: &mut RoleAllocation,
    mut remaining: f64,
    step: f64,
) -> f64 {
    for day_slots in slots.chunk_by(|a, b| a.0 == b.0) {
        loop {
            let mut progressed = false;
            for &(date, i) in day_slots {
                if remaining <= EPSILON {
                    return 0.0;
                }
                let person = people[i];
                let headroom = quantize_down(ledger.headroom_for(person, date), step);
                let grant = round_hours(step.min(headroom).min(remaining));
                if grant <= EPSILON {
                    continue;
                }
                ledger.reserve(person.id, date, grant);
                let cell = allocation.entry((date, i)).or_insert(0.0);
                *cell = round_hours(*cell + grant);
                remaining = round_hours(remaining - grant);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }
    remaining.max(0.0)
}

struct Overflow {
    remaining: f64,
    /// Hours placed beyond headroom per slot.
    placed: BTreeMap<(NaiveDate, usize), f64>,
}

/// Over-capacity pass. Round-robin over every unblocked slot, one step per
/// slot per round, bounded by 24h of committed time per person-day.
fn fill_over_capacity(
    slots: &[(NaiveDate, usize)],
    people: &[&Person],
    ledger: &mut CapacityLedger,
    allocation: &mut RoleAllocation,
    mut remaining: f64,
    step: f64,
) -> Overflow {
    let mut placed: BTreeMap<(NaiveDate, usize), f64> = BTreeMap::new();
    loop {
        let mut progressed = false;
        for &(date, i) in slots {
            if remaining <= EPSILON {
                return Overflow {
                    remaining: 0.0,
                    placed,
                };
            }
            let person = people[i];
            let room = quantize_down(MAX_CELL_HOURS - ledger.committed(person.id, date), step);
            let grant = round_hours(step.min(room).min(remaining));
            if grant <= EPSILON {
                continue;
            }
            ledger.reserve(person.id, date, grant);
            let cell = allocation.entry((date, i)).or_insert(0.0);
            *cell = round_hours(*cell + grant);
            let over = placed.entry((date, i)).or_insert(0.0);
            *over = round_hours(*over + grant);
            remaining = round_hours(remaining - grant);
            progressed = true;
        }
        if !progressed {
            return Overflow {
                remaining: remaining.max(0.0),
                placed,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AllocationCell, Initiative, Methodology, RoleDemand, UnavailabilityWindow};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    /// Mon 2025-03-03 ..= Fri 2025-03-07
    fn week_snapshot() -> Snapshot {
        Snapshot::new(Initiative {
            id: 1,
            name: "Checkout revamp".into(),
            methodology: Methodology::Agile,
            start_date: date(3),
            end_date: date(7),
        })
    }

    fn demand(role: RoleCode, hours: f64) -> RoleDemand {
        RoleDemand {
            initiative_id: 1,
            role,
            planned_hours: hours,
        }
    }

    #[test]
    fn two_developers_cover_ten_hours() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![
            Person::new(1, "Bea", "DEVELOPER"),
            Person::new(2, "Ada", "DEVELOPER"),
        ];
        snapshot.team = vec![1, 2];
        snapshot.role_demand = vec![demand(RoleCode::Developer, 10.0)];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();

        assert_eq!(plan.total_hours(), 10.0);
        assert!(plan.rows.iter().all(|r| r.hours <= 6.5));
        assert!(plan.warnings.is_empty());
        // Name order: Ada first.
        assert_eq!(plan.rows[0].person_name, "Ada");
        assert_eq!(plan.gaps[0].unmet_hours, 0.0);
    }

    #[test]
    fn weekends_and_windows_are_skipped() {
        let mut snapshot = week_snapshot();
        snapshot.initiative.end_date = date(10);
        snapshot.people = vec![Person::new(1, "Ada", "TESTER")];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Tester, 30.0)];
        snapshot.unavailability = vec![UnavailabilityWindow {
            id: 1,
            person_id: 1,
            start_date: date(4),
            end_date: date(5),
            reason: Some("training".into()),
        }];

        let plan = AllocationPlanner::new(
            PlannerConfig {
                allow_over_capacity: false,
                ..PlannerConfig::default()
            },
            CalendarRules::default(),
        )
        .preview(&snapshot, None)
        .unwrap();

        let days: Vec<NaiveDate> = plan.rows.iter().map(|r| r.date).collect();
        assert_eq!(days, vec![date(3), date(6), date(7), date(10)]);
        assert_eq!(plan.total_hours(), 26.0);
        assert!(plan.warnings.iter().any(|w| matches!(
            w,
            PlanWarning::UnmetDemand { role: RoleCode::Tester, .. }
        )));
    }

    #[test]
    fn existing_load_on_other_initiatives_reduces_headroom() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![Person::new(1, "Ada", "BA")];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Ba, 4.0)];
        snapshot.cells = vec![
            AllocationCell::new(99, 1, date(3), 5.0),
            // Own cells do not count against headroom.
            AllocationCell::new(1, 1, date(3), 6.5),
        ];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();
        assert_eq!(plan.rows[0].date, date(3));
        assert_eq!(plan.rows[0].hours, 1.5);
        assert_eq!(plan.rows[1].date, date(4));
        assert_eq!(plan.rows[1].hours, 2.5);
    }

    #[test]
    fn overflow_spreads_beyond_capacity_with_warnings() {
        let mut snapshot = week_snapshot();
        snapshot.initiative.end_date = date(3);
        snapshot.people = vec![Person::new(1, "Ada", "PM").with_daily_capacity(2.0)];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Pm, 3.0)];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();
        assert_eq!(plan.total_hours(), 3.0);
        assert!(plan.has_over_capacity());
        assert!(plan.warnings.contains(&PlanWarning::OverCapacity {
            person_id: 1,
            date: date(3),
            over_by: 1.0,
        }));
    }

    #[test]
    fn roles_follow_priority_order() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![
            Person::new(1, "Tess", "TESTER"),
            Person::new(2, "Pat", "PM"),
            Person::new(3, "Dee", "dev"),
        ];
        snapshot.team = vec![1, 2, 3];
        snapshot.role_demand = vec![
            demand(RoleCode::Tester, 1.0),
            demand(RoleCode::Developer, 1.0),
            demand(RoleCode::Pm, 1.0),
        ];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();
        let roles: Vec<RoleCode> = plan.rows.iter().map(|r| r.role).collect();
        assert_eq!(roles, vec![RoleCode::Pm, RoleCode::Developer, RoleCode::Tester]);
    }

    #[test]
    fn explicit_selection_overrides_team_and_reports_unknown_roles() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![
            Person::new(1, "Ada", "SA"),
            Person::new(2, "Bo", "SA"),
            Person::new(3, "Cy", "JANITOR"),
            Person::new(4, "Di", "SA").inactive(),
        ];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Sa, 1.0)];

        let plan = AllocationPlanner::default()
            .preview(&snapshot, Some(&[2, 3, 4, 2][..]))
            .unwrap();
        assert!(plan.rows.iter().all(|r| r.person_id == 2));
        assert!(plan.warnings.contains(&PlanWarning::UnknownRole {
            person_id: 3,
            role_code: "JANITOR".into(),
        }));
        assert!(plan.warnings.contains(&PlanWarning::InactivePerson { person_id: 4 }));

        // Empty selection falls back to the team.
        let plan = AllocationPlanner::default().preview(&snapshot, Some(&[][..])).unwrap();
        assert!(plan.rows.iter().all(|r| r.person_id == 1));
    }

    #[test]
    fn unknown_selected_person_is_an_error() {
        let snapshot = week_snapshot();
        let err = AllocationPlanner::default()
            .preview(&snapshot, Some(&[42][..]))
            .unwrap_err();
        assert_eq!(err, AllocationError::UnknownPerson(42));
    }

    #[test]
    fn role_without_people_is_silently_unmet() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![Person::new(1, "Ada", "DEVELOPER")];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Designer, 8.0)];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();
        assert!(plan.rows.is_empty());
        assert!(plan.warnings.contains(&PlanWarning::NoEligiblePeople {
            role: RoleCode::Designer
        }));
        assert_eq!(plan.gaps[0].unmet_hours, 8.0);
    }

    #[test]
    fn zero_demand_produces_nothing() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![Person::new(1, "Ada", "DEVELOPER")];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Developer, 0.0)];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();
        assert!(plan.rows.is_empty());
        assert!(plan.gaps.is_empty());
    }

    #[test]
    fn off_grid_demand_rounds_up_to_step() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![Person::new(1, "Ada", "DEVELOPER")];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Developer, 2.2)];

        let plan = AllocationPlanner::default().preview(&snapshot, None).unwrap();
        assert_eq!(plan.total_hours(), 2.5);
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0].date, date(3));
        assert_eq!(plan.gaps[0].unmet_hours, 0.0);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let mut snapshot = week_snapshot();
        snapshot.people = vec![Person::new(1, "Ada", "DEVELOPER")];
        snapshot.team = vec![1];
        snapshot.role_demand = vec![demand(RoleCode::Developer, 3.0)];

        let planner = AllocationPlanner::default();
        let a = planner.preview(&snapshot, None).unwrap();
        let b = planner.preview(&snapshot, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint.len(), 64);

        snapshot.role_demand = vec![demand(RoleCode::Developer, 3.5)];
        let c = planner.preview(&snapshot, None).unwrap();
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn invalid_step_is_rejected() {
        let planner = AllocationPlanner::new(
            PlannerConfig {
                step_hours: 0.0,
                ..PlannerConfig::default()
            },
            CalendarRules::default(),
        );
        assert_eq!(
            planner.preview(&week_snapshot(), None).unwrap_err(),
            AllocationError::InvalidStep(0.0)
        );
    }

    #[test]
    fn partial_role_order_appends_missing_roles() {
        let config = PlannerConfig {
            role_order: vec![RoleCode::Tester],
            ..PlannerConfig::default()
        };
        let order = config.effective_role_order();
        assert_eq!(order[0], RoleCode::Tester);
        assert_eq!(order[1], RoleCode::Pm);
        assert_eq!(order.len(), 6);
    }
}
