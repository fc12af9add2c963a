//! # Crewplan Core Library
//!
//! Core allocation logic for crewplan: given an initiative's role demand,
//! its team, and their calendars, propose and commit day-by-day hour
//! allocations; when actual hours overrun the plan, roll the surplus forward
//! into future cells.
//!
//! ## Architecture
//!
//! - **Calendar**: weekend and unavailability lookups
//! - **Capacity**: committed hours and headroom per person-day across initiatives
//! - **Planner**: role-priority greedy allocation producing a fingerprinted preview
//! - **Committer**: fill-only or overwrite reconciliation against persisted cells
//! - **Adjuster**: roll-forward absorption of overruns
//! - **Service**: the three operations over an [`AllocationStore`]
//! - **Storage**: SQLite reference store and TOML configuration
//!
//! The engines are pure over a [`Snapshot`]; only the store does I/O.
//!
//! ## Key Components
//!
//! - [`AllocationPlanner`]: preview generation
//! - [`AllocationCommitter`]: apply decisions
//! - [`RollForwardAdjuster`]: overrun absorption
//! - [`AllocationService`]: preview/apply/adjust against a store
//! - [`AllocationDb`]: SQLite persistence
//! - [`Config`]: configuration management

pub mod adjuster;
pub mod calendar;
pub mod capacity;
pub mod committer;
pub mod error;
pub mod model;
pub mod planner;
pub mod report;
pub mod service;
pub mod storage;

pub use adjuster::{AdjustOutcome, AdjustPolicy, AdjustmentRow, ProtectionMode, RollForwardAdjuster};
pub use calendar::{Blocked, BlockedDay, CalendarRules, EligibilityCalendar};
pub use capacity::{CapacityLedger, OverCapacityDay};
pub use committer::{AllocationCommitter, ApplyAction, ApplyOutcome, ApplyResultRow, ApplySummary, PlanCell};
pub use error::{AllocationError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use model::{
    AllocationCell, AuditEntry, AuditKind, CellWrite, Initiative, InitiativeId, Methodology, Person,
    PersonId, RoleCode, RoleDemand, Snapshot, UnavailabilityWindow,
};
pub use planner::{AllocationPlanner, DemandGap, Plan, PlanWarning, PlannerConfig, PreviewRow};
pub use service::{AllocationService, AllocationStore};
pub use storage::{AllocationDb, Config};
