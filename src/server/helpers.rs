//! Shared helpers for MCP tool implementations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::parse_ticktick_date;
use crate::error::{Result, TickTickError};
use crate::format::ResponseFormat;

/// Render a service result, or its error, in the requested format.
pub fn respond<T, F>(format: ResponseFormat, result: Result<T>, markdown: F) -> String
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match result {
        Ok(value) => format.render(&value, markdown),
        Err(e) => {
            log::debug!("Tool failed: {}", e);
            format.error(&e)
        }
    }
}

/// Like `respond` for operations that only succeed or fail.
pub fn confirm(format: ResponseFormat, result: Result<()>, message: &str) -> String {
    match result {
        Ok(()) => format.message(message),
        Err(e) => format.error(&e),
    }
}

/// Parse a calendar day given as `YYYY-MM-DD` or any accepted timestamp.
pub fn parse_day(field: &str, input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_ticktick_date(input).map(|d| d.date_naive()))
        .ok_or_else(|| {
            TickTickError::Validation(format!(
                "{} '{}' is not a valid date (use YYYY-MM-DD)",
                field, input
            ))
        })
}

pub fn parse_optional_day(field: &str, input: Option<&str>) -> Result<Option<NaiveDate>> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_day(field, s))
        .transpose()
}

pub fn parse_instant(field: &str, input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_ticktick_date(s).ok_or_else(|| {
                TickTickError::Validation(format!("{} '{}' is not a valid date", field, s))
            })
        })
        .transpose()
}

/// Drop blank optional strings so `""` reads as "not given".
pub fn non_empty(input: &Option<String>) -> Option<&str> {
    input.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        assert_eq!(parse_day("date", "2026-04-02").unwrap(), expected);
        assert_eq!(parse_day("date", "2026-04-02T10:00:00.000+0000").unwrap(), expected);
        assert!(matches!(
            parse_day("date", "tomorrow").unwrap_err(),
            TickTickError::Validation(_)
        ));
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(parse_optional_day("from", Some("  ")).unwrap(), None);
        assert_eq!(parse_instant("due", None).unwrap(), None);
    }

    #[test]
    fn test_respond_renders_error() {
        let result: Result<Vec<u8>> = Err(TickTickError::V2Required("Habits".to_string()));
        let out = respond(ResponseFormat::Markdown, result, |_| String::new());
        assert!(out.starts_with("**Error**: Habits requires v2"));
    }
}
