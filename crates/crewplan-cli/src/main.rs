use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use crewplan_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "crewplan", version, about = "Role-based staffing planner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// People directory
    Person {
        #[command(subcommand)]
        action: commands::person::PersonAction,
    },
    /// Initiatives, role demand, and teams
    Initiative {
        #[command(subcommand)]
        action: commands::initiative::InitiativeAction,
    },
    /// Unavailability windows
    Unavailable {
        #[command(subcommand)]
        action: commands::unavailable::UnavailableAction,
    },
    /// Manual allocation cell edits
    Cell {
        #[command(subcommand)]
        action: commands::cell::CellAction,
    },
    /// Auto-allocation preview and apply
    Alloc {
        #[command(subcommand)]
        action: commands::alloc::AllocAction,
    },
    /// Actual hours and roll-forward
    Actual {
        #[command(subcommand)]
        action: commands::actual::ActualAction,
    },
    /// Utilization and demand reports
    Report {
        #[command(subcommand)]
        action: commands::report::ReportAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crewplan={0},crewplan_core={0}", config.logging.level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&Config::load_or_default());

    let result = match cli.command {
        Commands::Person { action } => commands::person::run(action),
        Commands::Initiative { action } => commands::initiative::run(action),
        Commands::Unavailable { action } => commands::unavailable::run(action),
        Commands::Cell { action } => commands::cell::run(action),
        Commands::Alloc { action } => commands::alloc::run(action),
        Commands::Actual { action } => commands::actual::run(action),
        Commands::Report { action } => commands::report::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "crewplan", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
