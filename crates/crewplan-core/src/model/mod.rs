//! Domain records read and written by the allocation core.
//!
//! People, initiatives, role demand, team membership, and unavailability are
//! owned by the surrounding directory and CRUD layers. The core reads them
//! through a [`Snapshot`] and only ever writes [`AllocationCell`]s.

pub mod hours;

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AllocationError;
use hours::{DEFAULT_DAILY_CAPACITY, MAX_CELL_HOURS};

pub type PersonId = i64;
pub type InitiativeId = i64;

/// Fixed role enumeration used to match people against role demand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleCode {
    Pm,
    Sa,
    Ba,
    Designer,
    Developer,
    Tester,
}

impl RoleCode {
    /// Default planning priority.
    pub const PRIORITY: [RoleCode; 6] = [
        RoleCode::Pm,
        RoleCode::Sa,
        RoleCode::Ba,
        RoleCode::Designer,
        RoleCode::Developer,
        RoleCode::Tester,
    ];

    /// Normalize a raw directory value.
    ///
    /// Accepts any case and surrounding whitespace plus the legacy aliases
    /// `DEV` and `BUSINESS_ANALYST`. Returns `None` for unmapped codes.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PM" => Some(RoleCode::Pm),
            "SA" => Some(RoleCode::Sa),
            "BA" | "BUSINESS_ANALYST" => Some(RoleCode::Ba),
            "DESIGNER" => Some(RoleCode::Designer),
            "DEVELOPER" | "DEV" => Some(RoleCode::Developer),
            "TESTER" => Some(RoleCode::Tester),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCode::Pm => "PM",
            RoleCode::Sa => "SA",
            RoleCode::Ba => "BA",
            RoleCode::Designer => "DESIGNER",
            RoleCode::Developer => "DEVELOPER",
            RoleCode::Tester => "TESTER",
        }
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery methodology. Informational only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Methodology {
    Agile,
    Waterfall,
    Hybrid,
}

impl Methodology {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AGILE" => Some(Methodology::Agile),
            "WATERFALL" => Some(Methodology::Waterfall),
            "HYBRID" => Some(Methodology::Hybrid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Methodology::Agile => "AGILE",
            Methodology::Waterfall => "WATERFALL",
            Methodology::Hybrid => "HYBRID",
        }
    }
}

/// A person from the people directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: PersonId,
    pub full_name: String,
    /// Raw role code as stored by the directory; see [`Person::role`].
    pub role_code: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Hours per day; `None` falls back to 6.5.
    #[serde(default)]
    pub daily_capacity: Option<f64>,
    #[serde(default)]
    pub weekly_capacity_hours: Option<f64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Person {
    pub fn new(id: PersonId, full_name: impl Into<String>, role_code: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            role_code: role_code.into(),
            email: None,
            daily_capacity: None,
            weekly_capacity_hours: None,
            active: true,
        }
    }

    pub fn with_daily_capacity(mut self, hours: f64) -> Self {
        self.daily_capacity = Some(hours);
        self
    }

    pub fn with_weekly_capacity(mut self, hours: f64) -> Self {
        self.weekly_capacity_hours = Some(hours);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Normalized role, `None` when the directory value is unmapped.
    pub fn role(&self) -> Option<RoleCode> {
        RoleCode::parse(&self.role_code)
    }

    /// Daily capacity, falling back to `default` when unset.
    pub fn capacity_or(&self, default: f64) -> f64 {
        self.daily_capacity.unwrap_or(default)
    }

    /// Daily capacity with the built-in 6.5h default.
    pub fn capacity(&self) -> f64 {
        self.capacity_or(DEFAULT_DAILY_CAPACITY)
    }
}

/// A time-boxed initiative. All allocation activity stays inside
/// `start_date..=end_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Initiative {
    pub id: InitiativeId,
    pub name: String,
    pub methodology: Methodology,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Initiative {
    /// Fails with `InvalidRange` when the window is inverted.
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.start_date > self.end_date {
            return Err(AllocationError::InvalidRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Total target hours for one role over an initiative's life.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleDemand {
    pub initiative_id: InitiativeId,
    pub role: RoleCode,
    pub planned_hours: f64,
}

/// Planned hours for one (initiative, person, date).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationCell {
    pub initiative_id: InitiativeId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub hours: f64,
}

impl AllocationCell {
    pub fn new(initiative_id: InitiativeId, person_id: PersonId, date: NaiveDate, hours: f64) -> Self {
        Self {
            initiative_id,
            person_id,
            date,
            hours,
        }
    }
}

/// A registered absence. Blocks every date in `start_date..=end_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnavailabilityWindow {
    #[serde(default)]
    pub id: i64,
    pub person_id: PersonId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

impl UnavailabilityWindow {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Everything the core needs for one initiative, already fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub initiative: Initiative,
    #[serde(default)]
    pub role_demand: Vec<RoleDemand>,
    /// Person ids of the initiative's team.
    #[serde(default)]
    pub team: Vec<PersonId>,
    /// Directory entries for every person in scope.
    #[serde(default)]
    pub people: Vec<Person>,
    /// Cells of the people in scope, across all initiatives.
    #[serde(default)]
    pub cells: Vec<AllocationCell>,
    #[serde(default)]
    pub unavailability: Vec<UnavailabilityWindow>,
}

impl Snapshot {
    pub fn new(initiative: Initiative) -> Self {
        Self {
            initiative,
            role_demand: Vec::new(),
            team: Vec::new(),
            people: Vec::new(),
            cells: Vec::new(),
            unavailability: Vec::new(),
        }
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    /// Cells belonging to this snapshot's initiative.
    pub fn initiative_cells(&self) -> impl Iterator<Item = &AllocationCell> {
        let id = self.initiative.id;
        self.cells.iter().filter(move |c| c.initiative_id == id)
    }

    /// Structural checks on the supplied records.
    pub fn validate(&self) -> Result<(), AllocationError> {
        self.initiative.validate()?;

        for demand in &self.role_demand {
            if demand.planned_hours < 0.0 {
                return Err(AllocationError::NegativeInput {
                    field: format!("role_demand.{}", demand.role),
                    value: demand.planned_hours,
                });
            }
        }

        for person in &self.people {
            if let Some(cap) = person.daily_capacity {
                if cap < 0.0 {
                    return Err(AllocationError::NegativeInput {
                        field: format!("people.{}.daily_capacity", person.id),
                        value: cap,
                    });
                }
                if cap > MAX_CELL_HOURS {
                    return Err(AllocationError::HoursOutOfRange {
                        field: format!("people.{}.daily_capacity", person.id),
                        value: cap,
                    });
                }
            }
        }

        for cell in &self.cells {
            check_cell_hours("cells.hours", cell.hours)?;
        }

        for window in &self.unavailability {
            if window.start_date > window.end_date {
                return Err(AllocationError::InvalidRange {
                    start: window.start_date,
                    end: window.end_date,
                });
            }
        }

        Ok(())
    }
}

/// A cell value to persist, produced by the committer or the adjuster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellWrite {
    pub initiative_id: InitiativeId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub hours: f64,
}

/// Which engine produced an audit row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    AutoAllocate,
    RollForward,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::AutoAllocate => "auto_allocate",
            AuditKind::RollForward => "roll_forward",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto_allocate" => Some(AuditKind::AutoAllocate),
            "roll_forward" => Some(AuditKind::RollForward),
            _ => None,
        }
    }
}

/// Before/after record for one written cell.
///
/// Actor identity is attached by the persistence layer, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub run_id: String,
    pub kind: AuditKind,
    pub initiative_id: InitiativeId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub before_hours: f64,
    pub after_hours: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Reject hours outside `0..=24`.
pub fn check_cell_hours(field: &str, hours: f64) -> Result<(), AllocationError> {
    if hours < 0.0 {
        return Err(AllocationError::NegativeInput {
            field: field.to_string(),
            value: hours,
        });
    }
    if hours > MAX_CELL_HOURS || !hours.is_finite() {
        return Err(AllocationError::HoursOutOfRange {
            field: field.to_string(),
            value: hours,
        });
    }
    Ok(())
}
