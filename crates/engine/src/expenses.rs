//! Expense primitives.
//!
//! An `Expense` belongs to exactly one team (immutable after creation) and
//! moves through `pending` → `approved`/`rejected`; decision states can be
//! re-entered. Only `approved` expenses count against the team budget.
//!
//! The `ai_suggested_category`, `is_duplicate` and `duplicate_reason` fields
//! are advisory annotations: they never affect budget accounting.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Category, EngineError, ResultEngine};

pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this status counts the expense against the team budget.
    pub fn counts_against_budget(self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Whether this status carries an approval decision.
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl TryFrom<&str> for ExpenseStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidInput(format!(
                "invalid expense status: {other}"
            ))),
        }
    }
}

/// Identity attached to submissions and decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

/// Decision metadata, present iff the expense is approved or rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub name: String,
    pub email: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub team_id: String,
    pub description: String,
    pub amount_minor: i64,
    pub category: Category,
    pub ai_suggested_category: Option<Category>,
    pub incurred_on: NaiveDate,
    pub status: ExpenseStatus,
    pub submitted_by: Person,
    pub decision: Option<Decision>,
    pub is_duplicate: bool,
    pub duplicate_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        team_id: String,
        description: String,
        amount_minor: i64,
        category: Category,
        incurred_on: NaiveDate,
        submitted_by: Person,
    ) -> ResultEngine<Self> {
        if amount_minor < 0 {
            return Err(EngineError::InvalidInput(
                "amount_minor must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            team_id,
            description,
            amount_minor,
            category,
            ai_suggested_category: None,
            incurred_on,
            status: ExpenseStatus::Pending,
            submitted_by,
            decision: None,
            is_duplicate: false,
            duplicate_reason: None,
            created_at: Utc::now(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub team_id: String,
    pub description: String,
    pub amount_minor: i64,
    pub category: String,
    pub ai_suggested_category: Option<String>,
    pub incurred_on: Date,
    pub status: String,
    pub submitted_by_name: String,
    pub submitted_by_email: String,
    pub approved_by_name: Option<String>,
    pub approved_by_email: Option<String>,
    pub decided_at: Option<DateTimeUtc>,
    pub is_duplicate: bool,
    pub duplicate_reason: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teams::Entity",
        from = "Column::TeamId",
        to = "super::teams::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Teams,
}

impl Related<super::teams::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teams.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.clone()),
            team_id: ActiveValue::Set(expense.team_id.clone()),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.amount_minor),
            category: ActiveValue::Set(expense.category.as_str().to_string()),
            ai_suggested_category: ActiveValue::Set(
                expense.ai_suggested_category.map(|c| c.as_str().to_string()),
            ),
            incurred_on: ActiveValue::Set(expense.incurred_on),
            status: ActiveValue::Set(expense.status.as_str().to_string()),
            submitted_by_name: ActiveValue::Set(expense.submitted_by.name.clone()),
            submitted_by_email: ActiveValue::Set(expense.submitted_by.email.clone()),
            approved_by_name: ActiveValue::Set(
                expense.decision.as_ref().map(|d| d.name.clone()),
            ),
            approved_by_email: ActiveValue::Set(
                expense.decision.as_ref().map(|d| d.email.clone()),
            ),
            decided_at: ActiveValue::Set(expense.decision.as_ref().map(|d| d.decided_at)),
            is_duplicate: ActiveValue::Set(expense.is_duplicate),
            duplicate_reason: ActiveValue::Set(expense.duplicate_reason.clone()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let decision = match (model.approved_by_name, model.approved_by_email, model.decided_at) {
            (Some(name), Some(email), Some(decided_at)) => Some(Decision {
                name,
                email,
                decided_at,
            }),
            _ => None,
        };

        Ok(Self {
            id: model.id,
            team_id: model.team_id,
            description: model.description,
            amount_minor: model.amount_minor,
            category: Category::try_from(model.category.as_str())?,
            ai_suggested_category: model
                .ai_suggested_category
                .as_deref()
                .and_then(|c| Category::try_from(c).ok()),
            incurred_on: model.incurred_on,
            status: ExpenseStatus::try_from(model.status.as_str())?,
            submitted_by: Person {
                name: model.submitted_by_name,
                email: model.submitted_by_email,
            },
            decision,
            is_duplicate: model.is_duplicate,
            duplicate_reason: model.duplicate_reason,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_expense_starts_pending_without_decision() {
        let expense = Expense::new(
            "team".to_string(),
            "Taxi".to_string(),
            1500,
            Category::Travel,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            Person {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        )
        .unwrap();

        assert_eq!(expense.status, ExpenseStatus::Pending);
        assert!(expense.decision.is_none());
        assert!(!expense.is_duplicate);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let result = Expense::new(
            "team".to_string(),
            "Refund".to_string(),
            -1,
            Category::Other,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            Person {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn only_approved_counts_against_budget() {
        assert!(ExpenseStatus::Approved.counts_against_budget());
        assert!(!ExpenseStatus::Pending.counts_against_budget());
        assert!(!ExpenseStatus::Rejected.counts_against_budget());
    }
}
