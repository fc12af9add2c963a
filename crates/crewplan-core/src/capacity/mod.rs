//! Capacity ledger.
//!
//! Sums committed hours per (person, date) across all initiatives and
//! reports headroom against daily capacity. Capacity is a soft ceiling: the
//! ledger flags over-capacity days but never refuses anything.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::hours::{round_hours, DEFAULT_DAILY_CAPACITY, EPSILON};
use crate::model::{AllocationCell, InitiativeId, Person, PersonId};

/// A day on which committed hours exceed the person's capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverCapacityDay {
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub committed: f64,
    pub capacity: f64,
    pub excess: f64,
}

/// Committed hours per person per day.
#[derive(Debug, Clone)]
pub struct CapacityLedger {
    committed: BTreeMap<(PersonId, NaiveDate), f64>,
    default_capacity: f64,
}

impl Default for CapacityLedger {
    fn default() -> Self {
        Self {
            committed: BTreeMap::new(),
            default_capacity: DEFAULT_DAILY_CAPACITY,
        }
    }
}

impl CapacityLedger {
    /// Index every cell, whatever its initiative.
    pub fn from_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a AllocationCell>,
    {
        let mut ledger = Self::default();
        for cell in cells {
            ledger.reserve(cell.person_id, cell.date, cell.hours);
        }
        ledger
    }

    /// Index every cell except those of `initiative_id`.
    ///
    /// This is the planner's view: an initiative's own cells are what a plan
    /// replaces, so they must not eat into its headroom.
    pub fn excluding_initiative<'a, I>(cells: I, initiative_id: InitiativeId) -> Self
    where
        I: IntoIterator<Item = &'a AllocationCell>,
    {
        Self::from_cells(cells.into_iter().filter(|c| c.initiative_id != initiative_id))
    }

    /// Capacity used for people without one.
    pub fn with_default_capacity(mut self, hours: f64) -> Self {
        self.default_capacity = hours;
        self
    }

    pub fn default_capacity(&self) -> f64 {
        self.default_capacity
    }

    /// Hours already committed by `person_id` on `date`.
    pub fn committed(&self, person_id: PersonId, date: NaiveDate) -> f64 {
        self.committed.get(&(person_id, date)).copied().unwrap_or(0.0)
    }

    /// Remaining hours before `capacity` (or the default) is reached, floored at 0.
    pub fn headroom(&self, person_id: PersonId, date: NaiveDate, capacity: Option<f64>) -> f64 {
        let cap = capacity.unwrap_or(self.default_capacity);
        round_hours((cap - self.committed(person_id, date)).max(0.0))
    }

    /// Headroom for a directory entry.
    pub fn headroom_for(&self, person: &Person, date: NaiveDate) -> f64 {
        self.headroom(person.id, date, person.daily_capacity)
    }

    /// Record hours planned by the current run.
    pub fn reserve(&mut self, person_id: PersonId, date: NaiveDate, hours: f64) {
        let entry = self.committed.entry((person_id, date)).or_insert(0.0);
        *entry = round_hours(*entry + hours);
    }

    /// Every (person, date) of `people` whose committed total exceeds capacity.
    ///
    /// Ordered by person id, then date.
    pub fn over_capacity(&self, people: &[Person]) -> Vec<OverCapacityDay> {
        let capacities: BTreeMap<PersonId, f64> = people
            .iter()
            .map(|p| (p.id, p.capacity_or(self.default_capacity)))
            .collect();

        self.committed
            .iter()
            .filter_map(|(&(person_id, date), &committed)| {
                let capacity = *capacities.get(&person_id)?;
                (committed > capacity + EPSILON).then(|| OverCapacityDay {
                    person_id,
                    date,
                    committed,
                    capacity,
                    excess: round_hours(committed - capacity),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn headroom_sums_across_initiatives() {
        let cells = vec![
            AllocationCell::new(1, 10, date(3), 2.0),
            AllocationCell::new(2, 10, date(3), 1.5),
            AllocationCell::new(2, 11, date(3), 4.0),
        ];
        let ledger = CapacityLedger::from_cells(&cells);
        assert_eq!(ledger.committed(10, date(3)), 3.5);
        assert_eq!(ledger.headroom(10, date(3), None), 3.0);
        assert_eq!(ledger.headroom(10, date(4), None), 6.5);
        assert_eq!(ledger.headroom(11, date(3), Some(8.0)), 4.0);
    }

    #[test]
    fn headroom_floors_at_zero() {
        let cells = vec![AllocationCell::new(1, 10, date(3), 9.0)];
        let ledger = CapacityLedger::from_cells(&cells);
        assert_eq!(ledger.headroom(10, date(3), None), 0.0);
    }

    #[test]
    fn excluding_initiative_ignores_its_cells() {
        let cells = vec![
            AllocationCell::new(1, 10, date(3), 5.0),
            AllocationCell::new(2, 10, date(3), 1.0),
        ];
        let ledger = CapacityLedger::excluding_initiative(&cells, 1);
        assert_eq!(ledger.committed(10, date(3)), 1.0);
    }

    #[test]
    fn reserve_reduces_headroom() {
        let mut ledger = CapacityLedger::default().with_default_capacity(6.5);
        ledger.reserve(10, date(3), 0.5);
        ledger.reserve(10, date(3), 0.5);
        assert_eq!(ledger.headroom(10, date(3), None), 5.5);
    }

    #[test]
    fn over_capacity_flags_only_excess_days() {
        let people = vec![
            Person::new(10, "Ada", "DEVELOPER"),
            Person::new(11, "Bo", "TESTER").with_daily_capacity(4.0),
        ];
        let cells = vec![
            AllocationCell::new(1, 10, date(3), 6.5),
            AllocationCell::new(1, 10, date(4), 5.0),
            AllocationCell::new(2, 10, date(4), 2.5),
            AllocationCell::new(1, 11, date(3), 4.5),
        ];
        let ledger = CapacityLedger::from_cells(&cells);
        let over = ledger.over_capacity(&people);
        assert_eq!(over.len(), 2);
        assert_eq!(over[0].person_id, 10);
        assert_eq!(over[0].date, date(4));
        assert_eq!(over[0].excess, 1.0);
        assert_eq!(over[1].person_id, 11);
        assert_eq!(over[1].excess, 0.5);
    }
}
