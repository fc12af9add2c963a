//! Report commands.

use chrono::Duration;
use clap::Subcommand;
use crewplan_core::report::{
    demand_gaps, monday_of, over_capacity_days, role_capacity_vs_demand, weekly_utilization,
};
use crewplan_core::{AllocationDb, Config};

use super::{open_service, parse_date, print_json, CliResult};

#[derive(Subcommand)]
pub enum ReportAction {
    /// Planned versus previewed hours per role
    Gaps { initiative: i64 },
    /// Utilization of active people for the week containing a date
    Utilization { week: String },
    /// Role capacity versus demand of initiatives inside a range
    Roles { start: String, end: String },
    /// Person-days above capacity in a range
    Overcap { start: String, end: String },
}

pub fn run(action: ReportAction) -> CliResult {
    match action {
        ReportAction::Gaps { initiative } => {
            let service = open_service()?;
            let plan = service.preview(initiative, None)?;
            let demand = service.store().role_demand(initiative)?;
            print_json(&demand_gaps(&demand, &plan))?;
        }
        ReportAction::Utilization { week } => {
            let week = parse_date(&week)?;
            let db = AllocationDb::open()?;
            let monday = monday_of(week);
            let cells = db.cells_between(monday, monday + Duration::days(6))?;
            print_json(&weekly_utilization(&db.list_people()?, &cells, week))?;
        }
        ReportAction::Roles { start, end } => {
            let db = AllocationDb::open()?;
            let rows = role_capacity_vs_demand(
                &db.list_people()?,
                &db.list_initiatives()?,
                &db.all_role_demand()?,
                parse_date(&start)?,
                parse_date(&end)?,
            );
            print_json(&rows)?;
        }
        ReportAction::Overcap { start, end } => {
            let config = Config::load()?;
            let db = AllocationDb::open()?;
            let (start, end) = (parse_date(&start)?, parse_date(&end)?);
            let cells = db.cells_between(start, end)?;
            let days = over_capacity_days(
                &db.list_people()?,
                &cells,
                start,
                end,
                config.planner.default_daily_capacity,
            );
            print_json(&days)?;
        }
    }
    Ok(())
}
