//! Auto-allocation commands.

use clap::Subcommand;

use super::{open_service, print_json, selection, CliResult};

#[derive(Subcommand)]
pub enum AllocAction {
    /// Show the plan without writing
    Preview {
        initiative: i64,
        /// Explicit people instead of the team (comma separated)
        #[arg(long, value_delimiter = ',')]
        people: Vec<i64>,
    },
    /// Re-plan and write the cells
    Apply {
        initiative: i64,
        #[arg(long, value_delimiter = ',')]
        people: Vec<i64>,
        /// Replace non-zero cells instead of only filling empty ones
        #[arg(long)]
        overwrite: bool,
        /// Fingerprint of the preview being confirmed
        #[arg(long)]
        fingerprint: Option<String>,
    },
}

pub fn run(action: AllocAction) -> CliResult {
    let service = open_service()?;

    match action {
        AllocAction::Preview { initiative, people } => {
            let plan = service.preview(initiative, selection(&people))?;
            print_json(&plan)?;
        }
        AllocAction::Apply {
            initiative,
            people,
            overwrite,
            fingerprint,
        } => {
            let outcome = service.apply(initiative, selection(&people), overwrite, fingerprint.as_deref())?;
            print_json(&outcome)?;
        }
    }
    Ok(())
}
