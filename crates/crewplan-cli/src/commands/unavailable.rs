//! Unavailability commands.

use clap::Subcommand;
use crewplan_core::calendar::each_day;
use crewplan_core::{AllocationDb, Config, EligibilityCalendar, UnavailabilityWindow};

use super::{parse_date, print_json, CliResult};

#[derive(Subcommand)]
pub enum UnavailableAction {
    /// Register an absence (inclusive range)
    Add {
        person: i64,
        start: String,
        end: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List windows
    List {
        #[arg(long)]
        person: Option<i64>,
    },
    /// Blocked days of a person in a range, with reasons
    Blocked { person: i64, start: String, end: String },
}

pub fn run(action: UnavailableAction) -> CliResult {
    let db = AllocationDb::open()?;

    match action {
        UnavailableAction::Add {
            person,
            start,
            end,
            reason,
        } => {
            let window = db.add_unavailability(&UnavailabilityWindow {
                id: 0,
                person_id: person,
                start_date: parse_date(&start)?,
                end_date: parse_date(&end)?,
                reason,
            })?;
            print_json(&window)?;
        }
        UnavailableAction::List { person } => {
            print_json(&db.unavailability(person)?)?;
        }
        UnavailableAction::Blocked { person, start, end } => {
            db.get_person(person)?;
            let config = Config::load()?;
            let windows = db.unavailability(Some(person))?;
            let calendar = EligibilityCalendar::new(&config.calendar, &windows);
            let days = each_day(parse_date(&start)?, parse_date(&end)?);
            print_json(&calendar.blocked_days(person, &days))?;
        }
    }
    Ok(())
}
