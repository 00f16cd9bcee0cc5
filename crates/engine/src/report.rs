//! CSV rendering of expense listings.
//!
//! Pure presentation over already-computed data; the export carries no
//! invariants of its own.

use crate::{EngineError, Expense, ResultEngine, util::format_minor};

const HEADER: [&str; 13] = [
    "id",
    "team_id",
    "description",
    "amount",
    "category",
    "ai_suggested_category",
    "incurred_on",
    "status",
    "submitted_by_name",
    "submitted_by_email",
    "approved_by_email",
    "decided_at",
    "is_duplicate",
];

fn render_error(err: impl std::fmt::Display) -> EngineError {
    EngineError::InvalidInput(format!("csv render failed: {err}"))
}

/// Render expenses as a CSV document with a header row.
pub fn expenses_to_csv(expenses: &[Expense]) -> ResultEngine<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(render_error)?;

    for expense in expenses {
        let amount = format_minor(expense.amount_minor);
        let incurred_on = expense.incurred_on.to_string();
        let decided_at = expense
            .decision
            .as_ref()
            .map(|decision| decision.decided_at.to_rfc3339())
            .unwrap_or_default();

        writer
            .write_record([
                expense.id.as_str(),
                expense.team_id.as_str(),
                expense.description.as_str(),
                amount.as_str(),
                expense.category.as_str(),
                expense
                    .ai_suggested_category
                    .map(|category| category.as_str())
                    .unwrap_or(""),
                incurred_on.as_str(),
                expense.status.as_str(),
                expense.submitted_by.name.as_str(),
                expense.submitted_by.email.as_str(),
                expense
                    .decision
                    .as_ref()
                    .map(|decision| decision.email.as_str())
                    .unwrap_or(""),
                decided_at.as_str(),
                if expense.is_duplicate { "true" } else { "false" },
            ])
            .map_err(render_error)?;
    }

    let bytes = writer.into_inner().map_err(render_error)?;
    String::from_utf8(bytes).map_err(render_error)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Category, Person};

    #[test]
    fn renders_header_and_rows() {
        let expense = Expense::new(
            "team-1".to_string(),
            "Team lunch".to_string(),
            2350,
            Category::Meals,
            NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            Person {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        )
        .unwrap();

        let csv = expenses_to_csv(&[expense]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,team_id,description"));
        let row = lines.next().unwrap();
        assert!(row.contains("Team lunch"));
        assert!(row.contains("23.50"));
        assert!(row.contains("meals"));
    }

    #[test]
    fn empty_listing_is_just_the_header() {
        let csv = expenses_to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
