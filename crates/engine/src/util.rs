//! Internal helpers for validation and formatting.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use crate::{EngineError, ResultEngine, expenses::MAX_DESCRIPTION_LEN, Person};

pub(crate) const MAX_TEAM_NAME_LEN: usize = 100;

/// Trim and validate a team name.
pub(crate) fn normalize_team_name(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(
            "team name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(EngineError::InvalidInput(format!(
            "team name must be at most {MAX_TEAM_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim and validate an expense description.
pub(crate) fn normalize_description(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(
            "description must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::InvalidInput(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn ensure_non_negative_amount(amount_minor: i64, label: &str) -> ResultEngine<()> {
    if amount_minor < 0 {
        return Err(EngineError::InvalidInput(format!(
            "{label} must be >= 0"
        )));
    }
    Ok(())
}

pub(crate) fn validate_person(person: &Person, label: &str) -> ResultEngine<()> {
    if person.name.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} name must not be empty"
        )));
    }
    if !person.email.contains('@') {
        return Err(EngineError::InvalidInput(format!(
            "{label} email is invalid"
        )));
    }
    Ok(())
}

/// Render integer cents as a decimal string (`1234` -> `"12.34"`).
///
/// Presentation-only; all arithmetic stays in minor units.
pub(crate) fn format_minor(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_name_is_trimmed() {
        assert_eq!(normalize_team_name("  Platform  ").unwrap(), "Platform");
    }

    #[test]
    fn oversized_team_name_is_rejected() {
        let name = "x".repeat(MAX_TEAM_NAME_LEN + 1);
        assert!(normalize_team_name(&name).is_err());
    }

    #[test]
    fn oversized_description_is_rejected() {
        let description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(normalize_description(&description).is_err());
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_minor(0), "0.00");
        assert_eq!(format_minor(5), "0.05");
        assert_eq!(format_minor(123456), "1234.56");
        assert_eq!(format_minor(-250), "-2.50");
    }
}
