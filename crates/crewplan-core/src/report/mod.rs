//! Read-only reports over people, demand, and cells.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::capacity::{CapacityLedger, OverCapacityDay};
use crate::model::hours::{round_hours, DEFAULT_DAILY_CAPACITY, EPSILON};
use crate::model::{AllocationCell, Initiative, Person, PersonId, RoleCode, RoleDemand};
use crate::planner::{DemandGap, Plan};

/// Working days assumed when weekly capacity is derived from daily capacity.
const WORK_DAYS_PER_WEEK: f64 = 5.0;

/// Utilization of one person over one week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UtilizationRow {
    pub person_id: PersonId,
    pub person: String,
    pub allocated_hours: f64,
    pub capacity_hours: f64,
    pub utilization_pct: f64,
}

/// Weekly capacity of a role against demand in a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleCapacityRow {
    pub role: RoleCode,
    pub capacity_hours: f64,
    pub demand_hours: f64,
}

/// Monday of the ISO week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Weekly capacity: the recorded value, else five days of daily capacity.
pub fn weekly_capacity(person: &Person) -> f64 {
    person
        .weekly_capacity_hours
        .unwrap_or_else(|| round_hours(person.capacity_or(DEFAULT_DAILY_CAPACITY) * WORK_DAYS_PER_WEEK))
}

/// Planned versus previewed hours per role, in role priority order.
///
/// Roles with zero demand are left out.
pub fn demand_gaps(role_demand: &[RoleDemand], plan: &Plan) -> Vec<DemandGap> {
    let planned: BTreeMap<RoleCode, f64> = role_demand
        .iter()
        .filter(|d| d.initiative_id == plan.initiative_id)
        .map(|d| (d.role, d.planned_hours))
        .collect();

    RoleCode::PRIORITY
        .iter()
        .filter_map(|&role| {
            let planned_hours = *planned.get(&role)?;
            if planned_hours <= EPSILON {
                return None;
            }
            let allocated_hours = plan.hours_for_role(role);
            Some(DemandGap {
                role,
                planned_hours,
                allocated_hours,
                unmet_hours: round_hours((planned_hours - allocated_hours).max(0.0)),
            })
        })
        .collect()
}

/// Utilization of every active person in the Monday-based week containing
/// `week_start`, ordered by name.
pub fn weekly_utilization(
    people: &[Person],
    cells: &[AllocationCell],
    week_start: NaiveDate,
) -> Vec<UtilizationRow> {
    let monday = monday_of(week_start);
    let sunday = monday + Duration::days(6);

    let mut allocated: BTreeMap<PersonId, f64> = BTreeMap::new();
    for cell in cells.iter().filter(|c| monday <= c.date && c.date <= sunday) {
        *allocated.entry(cell.person_id).or_insert(0.0) += cell.hours;
    }

    let mut active: Vec<&Person> = people.iter().filter(|p| p.active).collect();
    active.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));

    active
        .into_iter()
        .map(|person| {
            let allocated_hours = round_hours(allocated.get(&person.id).copied().unwrap_or(0.0));
            let capacity_hours = weekly_capacity(person);
            let utilization_pct = if capacity_hours > EPSILON {
                (allocated_hours / capacity_hours * 1000.0).round() / 10.0
            } else {
                0.0
            };
            UtilizationRow {
                person_id: person.id,
                person: person.full_name.clone(),
                allocated_hours,
                capacity_hours,
                utilization_pct,
            }
        })
        .collect()
}

/// Weekly capacity of active people per role against the demand of
/// initiatives lying entirely inside `start..=end`.
///
/// One row per role in priority order, zeros included.
pub fn role_capacity_vs_demand(
    people: &[Person],
    initiatives: &[Initiative],
    demands: &[RoleDemand],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<RoleCapacityRow> {
    let mut capacity: BTreeMap<RoleCode, f64> = BTreeMap::new();
    for person in people.iter().filter(|p| p.active) {
        if let Some(role) = person.role() {
            *capacity.entry(role).or_insert(0.0) += weekly_capacity(person);
        }
    }

    let inside: Vec<_> = initiatives
        .iter()
        .filter(|i| start <= i.start_date && i.end_date <= end)
        .map(|i| i.id)
        .collect();
    let mut demand: BTreeMap<RoleCode, f64> = BTreeMap::new();
    for row in demands.iter().filter(|d| inside.contains(&d.initiative_id)) {
        *demand.entry(row.role).or_insert(0.0) += row.planned_hours;
    }

    RoleCode::PRIORITY
        .iter()
        .map(|&role| RoleCapacityRow {
            role,
            capacity_hours: round_hours(capacity.get(&role).copied().unwrap_or(0.0)),
            demand_hours: round_hours(demand.get(&role).copied().unwrap_or(0.0)),
        })
        .collect()
}

/// Over-capacity days of `people` within `start..=end`, summed across
/// initiatives.
pub fn over_capacity_days(
    people: &[Person],
    cells: &[AllocationCell],
    start: NaiveDate,
    end: NaiveDate,
    default_capacity: f64,
) -> Vec<OverCapacityDay> {
    CapacityLedger::from_cells(cells.iter().filter(|c| start <= c.date && c.date <= end))
        .with_default_capacity(default_capacity)
        .over_capacity(people)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Methodology;
    use crate::planner::PreviewRow;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn monday_of_handles_every_weekday() {
        assert_eq!(monday_of(date(3, 3)), date(3, 3));
        assert_eq!(monday_of(date(3, 6)), date(3, 3));
        assert_eq!(monday_of(date(3, 9)), date(3, 3));
        assert_eq!(monday_of(date(3, 1)), date(2, 24));
    }

    #[test]
    fn utilization_uses_weekly_or_derived_capacity() {
        let people = vec![
            Person::new(1, "Ada", "DEVELOPER").with_weekly_capacity(40.0),
            Person::new(2, "Bo", "TESTER"),
            Person::new(3, "Cy", "PM").inactive(),
            Person::new(4, "Di", "BA").with_weekly_capacity(0.0),
        ];
        let cells = vec![
            AllocationCell::new(1, 1, date(3, 3), 6.0),
            AllocationCell::new(2, 1, date(3, 7), 4.0),
            AllocationCell::new(1, 1, date(3, 10), 8.0),
            AllocationCell::new(1, 2, date(3, 4), 6.5),
            AllocationCell::new(1, 4, date(3, 4), 2.0),
        ];
        let rows = weekly_utilization(&people, &cells, date(3, 5));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].person, "Ada");
        assert_eq!(rows[0].allocated_hours, 10.0);
        assert_eq!(rows[0].utilization_pct, 25.0);
        assert_eq!(rows[1].capacity_hours, 32.5);
        assert_eq!(rows[1].utilization_pct, 20.0);
        assert_eq!(rows[2].utilization_pct, 0.0);
    }

    #[test]
    fn utilization_rounds_to_one_decimal() {
        let people = vec![Person::new(1, "Ada", "DEVELOPER").with_weekly_capacity(30.0)];
        let cells = vec![AllocationCell::new(1, 1, date(3, 3), 10.0)];
        let rows = weekly_utilization(&people, &cells, date(3, 3));
        assert_eq!(rows[0].utilization_pct, 33.3);
    }

    #[test]
    fn role_capacity_counts_only_contained_initiatives() {
        let people = vec![
            Person::new(1, "Ada", "DEV"),
            Person::new(2, "Bo", "DEVELOPER").with_weekly_capacity(20.0),
            Person::new(3, "Cy", "TESTER").inactive(),
        ];
        let initiatives = vec![
            Initiative {
                id: 1,
                name: "Inside".into(),
                methodology: Methodology::Agile,
                start_date: date(3, 3),
                end_date: date(3, 14),
            },
            Initiative {
                id: 2,
                name: "Straddles".into(),
                methodology: Methodology::Agile,
                start_date: date(2, 24),
                end_date: date(3, 7),
            },
        ];
        let demands = vec![
            RoleDemand { initiative_id: 1, role: RoleCode::Developer, planned_hours: 30.0 },
            RoleDemand { initiative_id: 2, role: RoleCode::Developer, planned_hours: 99.0 },
            RoleDemand { initiative_id: 1, role: RoleCode::Tester, planned_hours: 8.0 },
        ];
        let rows = role_capacity_vs_demand(&people, &initiatives, &demands, date(3, 1), date(3, 31));
        assert_eq!(rows.len(), RoleCode::PRIORITY.len());
        let dev = rows.iter().find(|r| r.role == RoleCode::Developer).unwrap();
        assert_eq!(dev.capacity_hours, 52.5);
        assert_eq!(dev.demand_hours, 30.0);
        let tester = rows.iter().find(|r| r.role == RoleCode::Tester).unwrap();
        assert_eq!(tester.capacity_hours, 0.0);
        assert_eq!(tester.demand_hours, 8.0);
    }

    #[test]
    fn gaps_compare_demand_with_plan_rows() {
        let plan = Plan {
            initiative_id: 1,
            rows: vec![PreviewRow {
                person_id: 1,
                person_name: "Ada".into(),
                role: RoleCode::Developer,
                date: date(3, 3),
                hours: 6.5,
            }],
            warnings: Vec::new(),
            gaps: Vec::new(),
            fingerprint: String::new(),
        };
        let demand = vec![
            RoleDemand { initiative_id: 1, role: RoleCode::Developer, planned_hours: 10.0 },
            RoleDemand { initiative_id: 1, role: RoleCode::Pm, planned_hours: 0.0 },
            RoleDemand { initiative_id: 2, role: RoleCode::Tester, planned_hours: 5.0 },
        ];
        let gaps = demand_gaps(&demand, &plan);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].allocated_hours, 6.5);
        assert_eq!(gaps[0].unmet_hours, 3.5);
    }

    #[test]
    fn over_capacity_days_respects_range() {
        let people = vec![Person::new(1, "Ada", "DEVELOPER")];
        let cells = vec![
            AllocationCell::new(1, 1, date(3, 3), 5.0),
            AllocationCell::new(2, 1, date(3, 3), 3.0),
            AllocationCell::new(1, 1, date(3, 20), 9.0),
        ];
        let days = over_capacity_days(&people, &cells, date(3, 1), date(3, 7), 6.5);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].excess, 1.5);
    }
}
