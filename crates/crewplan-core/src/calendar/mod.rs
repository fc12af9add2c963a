//! Calendar and eligibility filter.
//!
//! Answers two questions for the planner and the daily huddle view:
//! - is a person blocked on a given date (weekend or unavailability window)
//! - which dates belong to an initiative's window
//!
//! Pure lookups over supplied unavailability data.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{Initiative, PersonId, UnavailabilityWindow};

/// Reason reported for weekend days.
pub const WEEKEND_REASON: &str = "weekend";

/// Which days never receive allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarRules {
    /// 0=Sun ... 6=Sat
    #[serde(default = "default_weekend_days")]
    pub weekend_days: Vec<u8>,
    /// Reason used for windows registered without one.
    #[serde(default = "default_unavailable_reason")]
    pub default_unavailable_reason: String,
}

fn default_weekend_days() -> Vec<u8> {
    vec![0, 6]
}

fn default_unavailable_reason() -> String {
    "unavailable".into()
}

impl Default for CalendarRules {
    fn default() -> Self {
        Self {
            weekend_days: default_weekend_days(),
            default_unavailable_reason: default_unavailable_reason(),
        }
    }
}

impl CalendarRules {
    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        let day = date.weekday().num_days_from_sunday() as u8;
        self.weekend_days.contains(&day)
    }
}

/// Result of an eligibility lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blocked {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl Blocked {
    fn open() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn because(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}

/// A blocked date with its reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockedDay {
    pub date: NaiveDate,
    pub reason: String,
}

/// Eligibility lookups for a set of people.
pub struct EligibilityCalendar<'a> {
    rules: &'a CalendarRules,
    windows: HashMap<PersonId, Vec<&'a UnavailabilityWindow>>,
}

impl<'a> EligibilityCalendar<'a> {
    pub fn new(rules: &'a CalendarRules, windows: &'a [UnavailabilityWindow]) -> Self {
        let mut by_person: HashMap<PersonId, Vec<&'a UnavailabilityWindow>> = HashMap::new();
        for window in windows {
            by_person.entry(window.person_id).or_default().push(window);
        }
        // Earliest window wins when several overlap, so the reported reason is stable.
        for list in by_person.values_mut() {
            list.sort_by_key(|w| (w.start_date, w.end_date, w.id));
        }
        Self {
            rules,
            windows: by_person,
        }
    }

    /// Weekend first, then any covering window, else open.
    pub fn is_blocked(&self, person_id: PersonId, date: NaiveDate) -> Blocked {
        if self.rules.is_weekend(date) {
            return Blocked::because(WEEKEND_REASON);
        }

        let covering = self
            .windows
            .get(&person_id)
            .and_then(|list| list.iter().find(|w| w.covers(date)));

        match covering {
            Some(window) => Blocked::because(
                window
                    .reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(self.rules.default_unavailable_reason.as_str()),
            ),
            None => Blocked::open(),
        }
    }

    /// Blocked dates among `dates`, in the order given.
    pub fn blocked_days(&self, person_id: PersonId, dates: &[NaiveDate]) -> Vec<BlockedDay> {
        dates
            .iter()
            .filter_map(|&date| match self.is_blocked(person_id, date) {
                Blocked {
                    blocked: true,
                    reason: Some(reason),
                } => Some(BlockedDay { date, reason }),
                _ => None,
            })
            .collect()
    }
}

/// Every date in `start..=end`, ascending. Empty when `start > end`.
pub fn each_day(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        current += Duration::days(1);
    }
    days
}

/// Candidate dates of an initiative.
pub fn candidate_dates(initiative: &Initiative) -> Vec<NaiveDate> {
    each_day(initiative.start_date, initiative.end_date)
}
