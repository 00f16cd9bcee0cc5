//! Core engine for team expense tracking.
//!
//! Expenses move through `pending` → `approved`/`rejected`; every transition
//! that changes whether an expense counts against the budget adjusts the
//! owning team's cached spending aggregate inside one DB transaction, held
//! under a per-team lock, and decides whether a one-time budget-threshold
//! alert must fire. The advisory (AI) integration and notification dispatch
//! live behind best-effort adapters and never participate in the consistency
//! contract.

pub use advisory::{
    AdvisoryAdapter, AdvisoryConfig, AdvisoryError, AdvisoryProvider, CategorySuggestion,
    DuplicateCandidate, DuplicateVerdict, HttpAdvisoryProvider,
};
pub use categories::Category;
pub use commands::{
    BulkDecisionCmd, CreateExpenseCmd, CreateTeamCmd, DecideExpenseCmd, DecisionAction,
    UpdateExpenseCmd, UpdateTeamCmd,
};
pub use error::EngineError;
pub use expenses::{Decision, Expense, ExpenseStatus, MAX_DESCRIPTION_LEN, Person};
pub use notify::{
    AlertKind, BudgetAlertNote, DecisionNote, NoopNotifier, Notifier, NotifyError,
    WebhookNotifier,
};
pub use ops::{
    BudgetStatus, CategoryBreakdown, Engine, EngineBuilder, ExpenseListFilter, ExpensePage,
    SortOrder, TeamForecast, TeamInsights, utilization,
};
pub use report::expenses_to_csv;
pub use teams::{MemberRole, Team, TeamMember};

mod advisory;
mod categories;
mod commands;
mod error;
mod expenses;
mod notify;
mod ops;
mod report;
mod team_members;
mod teams;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
