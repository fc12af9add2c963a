//! Initiative, role demand, and team commands.

use clap::Subcommand;
use crewplan_core::{AllocationDb, Initiative, Methodology, RoleCode, ValidationError};
use serde_json::json;

use super::{parse_date, print_json, CliResult};

#[derive(Subcommand)]
pub enum InitiativeAction {
    /// Create an initiative
    Create {
        name: String,
        /// First day (YYYY-MM-DD)
        start: String,
        /// Last day, inclusive (YYYY-MM-DD)
        end: String,
        /// AGILE, WATERFALL, or HYBRID
        #[arg(long, default_value = "AGILE")]
        methodology: String,
    },
    /// List initiatives
    List,
    /// Set the planned hours of one role
    Demand {
        id: i64,
        /// Role code
        role: String,
        /// Total planned hours over the initiative
        hours: f64,
    },
    /// Replace the team with the given people
    Team {
        id: i64,
        /// Person ids; none clears the team
        #[arg(value_delimiter = ',')]
        people: Vec<i64>,
    },
    /// Initiative with its demand, team, and cells
    Show { id: i64 },
    /// Audit trail of allocation writes
    Audit { id: i64 },
}

pub fn run(action: InitiativeAction) -> CliResult {
    let db = AllocationDb::open()?;

    match action {
        InitiativeAction::Create {
            name,
            start,
            end,
            methodology,
        } => {
            let methodology = Methodology::parse(&methodology).ok_or_else(|| ValidationError::InvalidValue {
                field: "methodology".into(),
                message: format!("'{methodology}' is not AGILE, WATERFALL, or HYBRID"),
            })?;
            let initiative = db.create_initiative(&Initiative {
                id: 0,
                name,
                methodology,
                start_date: parse_date(&start)?,
                end_date: parse_date(&end)?,
            })?;
            print_json(&initiative)?;
        }
        InitiativeAction::List => {
            print_json(&db.list_initiatives()?)?;
        }
        InitiativeAction::Demand { id, role, hours } => {
            let role = RoleCode::parse(&role).ok_or_else(|| ValidationError::InvalidValue {
                field: "role".into(),
                message: format!("unknown role code '{role}'"),
            })?;
            db.set_role_demand(id, role, hours)?;
            print_json(&db.role_demand(id)?)?;
        }
        InitiativeAction::Team { id, people } => {
            db.set_team(id, &people)?;
            print_json(&json!({ "initiative_id": id, "team": db.team(id)? }))?;
        }
        InitiativeAction::Show { id } => {
            let initiative = db.get_initiative(id)?;
            print_json(&json!({
                "initiative": initiative,
                "role_demand": db.role_demand(id)?,
                "team": db.team(id)?,
                "cells": db.cells(Some(id), None)?,
            }))?;
        }
        InitiativeAction::Audit { id } => {
            db.get_initiative(id)?;
            print_json(&db.audit(id)?)?;
        }
    }
    Ok(())
}
