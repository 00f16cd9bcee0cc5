//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{Category, EngineError, ExpenseStatus, Person, TeamMember};

/// Approve/reject action recorded on an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    pub fn target_status(self) -> ExpenseStatus {
        match self {
            Self::Approve => ExpenseStatus::Approved,
            Self::Reject => ExpenseStatus::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl TryFrom<&str> for DecisionAction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(EngineError::InvalidInput(format!(
                "invalid decision action: {other}"
            ))),
        }
    }
}

/// Create a team.
#[derive(Clone, Debug)]
pub struct CreateTeamCmd {
    pub name: String,
    pub budget_minor: i64,
    pub members: Vec<TeamMember>,
}

/// Patch a team's editable fields. `None` leaves the field unchanged.
#[derive(Clone, Debug, Default)]
pub struct UpdateTeamCmd {
    pub name: Option<String>,
    pub budget_minor: Option<i64>,
    pub members: Option<Vec<TeamMember>>,
}

/// Create an expense (always `pending`).
#[derive(Clone, Debug)]
pub struct CreateExpenseCmd {
    pub team_id: String,
    pub description: String,
    pub amount_minor: i64,
    pub category: Category,
    pub incurred_on: NaiveDate,
    pub submitted_by: Person,
}

/// Record an approve/reject decision on an expense.
#[derive(Clone, Debug)]
pub struct DecideExpenseCmd {
    pub expense_id: String,
    pub action: DecisionAction,
    pub approver: Person,
    pub decided_at: DateTime<Utc>,
}

impl DecideExpenseCmd {
    #[must_use]
    pub fn new(expense_id: impl Into<String>, action: DecisionAction, approver: Person) -> Self {
        Self {
            expense_id: expense_id.into(),
            action,
            approver,
            decided_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn decided_at(mut self, decided_at: DateTime<Utc>) -> Self {
        self.decided_at = decided_at;
        self
    }
}

/// Patch an expense's fields and/or move it back to `pending`.
///
/// Approve/reject decisions go through [`DecideExpenseCmd`]; mixing a field
/// edit with a decision is rejected by the engine.
#[derive(Clone, Debug, Default)]
pub struct UpdateExpenseCmd {
    pub expense_id: String,
    pub description: Option<String>,
    pub amount_minor: Option<i64>,
    pub category: Option<Category>,
    pub incurred_on: Option<NaiveDate>,
    /// Only `Some(ExpenseStatus::Pending)` is accepted here: a status edit
    /// without re-approval, clearing any previous decision.
    pub status: Option<ExpenseStatus>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(expense_id: impl Into<String>) -> Self {
        Self {
            expense_id: expense_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn incurred_on(mut self, incurred_on: NaiveDate) -> Self {
        self.incurred_on = Some(incurred_on);
        self
    }

    #[must_use]
    pub fn status(mut self, status: ExpenseStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Apply the same decision to a batch of expenses.
#[derive(Clone, Debug)]
pub struct BulkDecisionCmd {
    pub expense_ids: Vec<String>,
    pub action: DecisionAction,
    pub approver: Person,
    pub decided_at: DateTime<Utc>,
}

impl BulkDecisionCmd {
    #[must_use]
    pub fn new(expense_ids: Vec<String>, action: DecisionAction, approver: Person) -> Self {
        Self {
            expense_ids,
            action,
            approver,
            decided_at: Utc::now(),
        }
    }
}
