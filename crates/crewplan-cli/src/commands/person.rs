//! People directory commands.

use clap::Subcommand;
use crewplan_core::{AllocationDb, Person, RoleCode};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum PersonAction {
    /// Add a person
    Add {
        /// Full name
        name: String,
        /// Role code (PM, SA, BA, DESIGNER, DEVELOPER, TESTER)
        role: String,
        #[arg(long)]
        email: Option<String>,
        /// Hours per day (default 6.5)
        #[arg(long)]
        daily_capacity: Option<f64>,
        /// Hours per week used by utilization reports
        #[arg(long)]
        weekly_capacity: Option<f64>,
        /// Register as inactive
        #[arg(long)]
        inactive: bool,
    },
    /// List people
    List,
    /// Exclude a person from auto-allocation
    Deactivate { id: i64 },
    /// Include a person in auto-allocation again
    Activate { id: i64 },
}

pub fn run(action: PersonAction) -> CliResult {
    let db = AllocationDb::open()?;

    match action {
        PersonAction::Add {
            name,
            role,
            email,
            daily_capacity,
            weekly_capacity,
            inactive,
        } => {
            if RoleCode::parse(&role).is_none() {
                tracing::warn!(%role, "role code is not recognised; auto-allocation will skip this person");
            }
            let mut person = Person::new(0, name, role);
            person.email = email;
            person.daily_capacity = daily_capacity;
            person.weekly_capacity_hours = weekly_capacity;
            person.active = !inactive;
            let person = db.add_person(&person)?;
            print_json(&person)?;
        }
        PersonAction::List => {
            print_json(&db.list_people()?)?;
        }
        PersonAction::Deactivate { id } => {
            db.set_person_active(id, false)?;
            print_json(&db.get_person(id)?)?;
        }
        PersonAction::Activate { id } => {
            db.set_person_active(id, true)?;
            print_json(&db.get_person(id)?)?;
        }
    }
    Ok(())
}
