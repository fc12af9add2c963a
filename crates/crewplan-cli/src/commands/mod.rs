pub mod actual;
pub mod alloc;
pub mod cell;
pub mod config;
pub mod initiative;
pub mod person;
pub mod report;
pub mod unavailable;

use chrono::NaiveDate;
use crewplan_core::{AllocationDb, AllocationService, Config, ValidationError};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a `YYYY-MM-DD` argument.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| ValidationError::InvalidValue {
        field: "date".into(),
        message: format!("'{raw}' is not a YYYY-MM-DD date: {e}"),
    })
}

/// `None` for an empty selection so the team is used.
pub fn selection(people: &[i64]) -> Option<&[i64]> {
    (!people.is_empty()).then_some(people)
}

/// Service over the default database, configured from `config.toml`.
pub fn open_service() -> Result<AllocationService<AllocationDb>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = AllocationDb::open()?;
    Ok(AllocationService::from_config(db, &config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert_eq!(parse_date("2025-03-03").unwrap(), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert!(parse_date("03/03/2025").is_err());
    }

    #[test]
    fn empty_selection_means_team() {
        assert_eq!(selection(&[]), None);
        assert_eq!(selection(&[1, 2]), Some(&[1, 2][..]));
    }
}
