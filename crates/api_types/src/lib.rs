use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Travel,
    Meals,
    OfficeSupplies,
    Software,
    Equipment,
    Marketing,
    Utilities,
    Other,
}

impl Category {
    /// Returns the canonical category string used by the engine/database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Meals => "meals",
            Self::OfficeSupplies => "office_supplies",
            Self::Software => "software",
            Self::Equipment => "equipment",
            Self::Marketing => "marketing",
            Self::Utilities => "utilities",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

pub mod team {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MemberRole {
        Admin,
        Member,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub name: String,
        pub email: String,
        pub role: MemberRole,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TeamNew {
        pub name: String,
        /// Budget in integer cents.
        pub budget_minor: i64,
        #[serde(default)]
        pub members: Vec<MemberView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TeamCreated {
        pub id: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TeamUpdate {
        pub name: Option<String>,
        pub budget_minor: Option<i64>,
        pub members: Option<Vec<MemberView>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AlertStatusView {
        pub eighty_percent_sent: bool,
        pub hundred_percent_sent: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TeamView {
        pub id: String,
        pub name: String,
        pub budget_minor: i64,
        pub current_spending_minor: i64,
        pub members: Vec<MemberView>,
        pub alerts: AlertStatusView,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TeamListResponse {
        pub teams: Vec<TeamView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetStatusView {
        pub team_id: String,
        pub team_name: String,
        pub budget_minor: i64,
        pub current_spending_minor: i64,
        pub remaining_minor: i64,
        pub utilization_percent: f64,
        pub is_over_budget: bool,
        pub is_near_budget: bool,
        pub alert_status: AlertStatusView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecomputeResponse {
        pub team_id: String,
        pub current_spending_minor: i64,
    }
}

pub mod expense {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PersonView {
        pub name: String,
        pub email: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub team_id: String,
        pub description: String,
        /// Amount in integer cents.
        pub amount_minor: i64,
        pub category: Category,
        pub incurred_on: NaiveDate,
        pub submitted_by: PersonView,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct DecisionView {
        pub name: String,
        pub email: String,
        pub decided_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: String,
        pub team_id: String,
        pub description: String,
        pub amount_minor: i64,
        pub category: Category,
        pub ai_suggested_category: Option<Category>,
        pub incurred_on: NaiveDate,
        pub status: ExpenseStatus,
        pub submitted_by: PersonView,
        pub approved_by: Option<DecisionView>,
        pub is_duplicate: bool,
        pub duplicate_reason: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    /// Patch body for `PATCH /expenses/{id}`.
    ///
    /// A decided `status` (`approved`/`rejected`) requires `approver` and
    /// tolerates no other field in the same request; `status: pending` is a
    /// plain status edit and may accompany field edits.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub description: Option<String>,
        pub amount_minor: Option<i64>,
        pub category: Option<Category>,
        pub incurred_on: Option<NaiveDate>,
        pub status: Option<ExpenseStatus>,
        pub approver: Option<PersonView>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseList {
        pub team_id: Option<String>,
        pub status: Option<ExpenseStatus>,
        pub category: Option<Category>,
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub search: Option<String>,
        /// `asc` or `desc` (default).
        pub order: Option<String>,
        pub limit: Option<u64>,
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkDecision {
        pub expense_ids: Vec<String>,
        /// `approve` or `reject`.
        pub action: String,
        pub approver: PersonView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkDecisionResponse {
        pub updated: u64,
    }
}

pub mod insights {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryBreakdownView {
        pub category: Category,
        pub total_minor: i64,
        pub count: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TeamInsightsView {
        pub team_id: String,
        pub total_approved_minor: i64,
        pub pending_count: i64,
        pub approved_count: i64,
        pub rejected_count: i64,
        pub by_category: Vec<CategoryBreakdownView>,
        pub top_category: Option<Category>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TeamForecastView {
        pub team_id: String,
        pub monthly_run_rate_minor: i64,
        pub projected_month_end_minor: i64,
        pub remaining_minor: i64,
        pub months_to_exhaustion: Option<f64>,
    }
}
