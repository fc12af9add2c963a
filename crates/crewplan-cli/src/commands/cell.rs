use clap::Subcommand;
use crewplan_core::{AllocationCell, AllocationDb};

use super::{parse_date, print_json, CliResult};

#[derive(Subcommand)]
pub enum CellAction {
    /// Set the hours of one (initiative, person, date) cell
    Set {
        initiative: i64,
        person: i64,
        date: String,
        hours: f64,
    },
    /// List cells
    List {
        #[arg(long)]
        initiative: Option<i64>,
        #[arg(long)]
        person: Option<i64>,
    },
}

pub fn run(action: CellAction) -> CliResult {
    let db = AllocationDb::open()?;

    match action {
        CellAction::Set {
            initiative,
            person,
            date,
            hours,
        } => {
            let cell = AllocationCell::new(initiative, person, parse_date(&date)?, hours);
            db.set_cell(&cell)?;
            print_json(&cell)?;
        }
        CellAction::List { initiative, person } => {
            print_json(&db.cells(initiative, person)?)?;
        }
    }
    Ok(())
}
