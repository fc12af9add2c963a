use clap::Subcommand;

use super::{open_service, parse_date, print_json, CliResult};

#[derive(Subcommand)]
pub enum ActualAction {
    /// Log actual hours and roll any overrun into later cells
    Log {
        initiative: i64,
        person: i64,
        /// Day the hours were worked (YYYY-MM-DD)
        day: String,
        hours: f64,
        /// Decrement size (default from config)
        #[arg(long)]
        step: Option<f64>,
        /// Protected days after `day` (default from config)
        #[arg(long)]
        min_days: Option<u32>,
    },
}

pub fn run(action: ActualAction) -> CliResult {
    let service = open_service()?;

    match action {
        ActualAction::Log {
            initiative,
            person,
            day,
            hours,
            step,
            min_days,
        } => {
            let outcome = service.adjust(initiative, person, parse_date(&day)?, hours, step, min_days)?;
            print_json(&outcome)?;
        }
    }
    Ok(())
}
