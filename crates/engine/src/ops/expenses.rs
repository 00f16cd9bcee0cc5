//! Expense lifecycle operations.
//!
//! Status transitions and the ledger delta they imply:
//!
//! | from     | to       | ledger effect |
//! |----------|----------|---------------|
//! | pending  | approved | `+amount`     |
//! | pending  | rejected | none          |
//! | approved | rejected | `-amount`     |
//! | approved | pending  | `-amount`     |
//! | rejected | approved | `+amount`     |
//! | rejected | pending  | none          |
//! | any      | same     | none (no-op)  |
//!
//! The delta is always computed from the status the expense had before the
//! write ("was it counted against the budget before"), so repeated writes of
//! the same target status never double-apply. Status, ledger delta and alert
//! latch commit in one transaction under the team lock; submitter
//! notifications go out after the commit, best-effort.

use base64::Engine as _;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    Category, CreateExpenseCmd, DecideExpenseCmd, EngineError, Expense, ExpenseStatus,
    ResultEngine, UpdateExpenseCmd,
    advisory::DuplicateCandidate,
    expenses,
    notify::DecisionNote,
    util::{ensure_non_negative_amount, format_minor, normalize_description, validate_person},
};

use super::{Engine, with_tx};

/// Window considered by duplicate detection.
const DUPLICATE_WINDOW_DAYS: i64 = 30;
/// Most recent candidates handed to the provider.
const DUPLICATE_CANDIDATE_LIMIT: u64 = 50;

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Filters for listing expenses.
///
/// `from`/`to` bound the incurred date, both inclusive.
#[derive(Clone, Debug, Default)]
pub struct ExpenseListFilter {
    pub team_id: Option<String>,
    pub status: Option<ExpenseStatus>,
    pub category: Option<Category>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring match on the description.
    pub search: Option<String>,
    pub order: SortOrder,
}

impl ExpenseListFilter {
    fn validate(&self) -> ResultEngine<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(EngineError::InvalidInput(
                "invalid range: from must be <= to".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(&self, mut query: Select<expenses::Entity>) -> Select<expenses::Entity> {
        if let Some(team_id) = &self.team_id {
            query = query.filter(expenses::Column::TeamId.eq(team_id.clone()));
        }
        if let Some(status) = self.status {
            query = query.filter(expenses::Column::Status.eq(status.as_str()));
        }
        if let Some(category) = self.category {
            query = query.filter(expenses::Column::Category.eq(category.as_str()));
        }
        if let Some(from) = self.from {
            query = query.filter(expenses::Column::IncurredOn.gte(from));
        }
        if let Some(to) = self.to {
            query = query.filter(expenses::Column::IncurredOn.lte(to));
        }
        if let Some(search) = &self.search {
            query = query.filter(expenses::Column::Description.contains(search.clone()));
        }
        query
    }
}

/// One page of expenses plus the opaque cursor for the next one.
#[derive(Clone, Debug)]
pub struct ExpensePage {
    pub expenses: Vec<Expense>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ExpensesCursor {
    incurred_on: NaiveDate,
    expense_id: String,
}

impl ExpensesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidInput("invalid expenses cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidInput("invalid expenses cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidInput("invalid expenses cursor".to_string()))
    }
}

/// Signed amount to apply to the team aggregate for a status/amount change.
fn ledger_delta(
    previous_status: ExpenseStatus,
    previous_amount: i64,
    new_status: ExpenseStatus,
    new_amount: i64,
) -> i64 {
    let before = if previous_status.counts_against_budget() {
        previous_amount
    } else {
        0
    };
    let after = if new_status.counts_against_budget() {
        new_amount
    } else {
        0
    };
    after - before
}

impl Engine {
    pub(super) async fn require_expense_model(
        &self,
        db_tx: &DatabaseTransaction,
        expense_id: &str,
    ) -> ResultEngine<expenses::Model> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// Create an expense in `pending` state.
    ///
    /// The advisory adapter is consulted before anything is written; its
    /// unavailability leaves the annotations empty and never blocks creation.
    pub async fn create_expense(&self, cmd: CreateExpenseCmd) -> ResultEngine<Expense> {
        let description = normalize_description(&cmd.description)?;
        ensure_non_negative_amount(cmd.amount_minor, "amount_minor")?;
        validate_person(&cmd.submitted_by, "submitter")?;

        // Fail fast on a missing team before paying for the advisory call;
        // re-checked inside the insert transaction.
        let team = crate::teams::Entity::find_by_id(cmd.team_id.clone())
            .one(&self.database)
            .await?;
        if team.is_none() {
            return Err(EngineError::KeyNotFound("team not exists".to_string()));
        }

        let mut expense = Expense::new(
            cmd.team_id.clone(),
            description,
            cmd.amount_minor,
            cmd.category,
            cmd.incurred_on,
            cmd.submitted_by,
        )?;

        if let Some(advisory) = &self.advisory {
            if let Some(suggestion) = advisory
                .suggest_category(&expense.description, expense.amount_minor)
                .await
            {
                expense.ai_suggested_category = Some(suggestion.category);
            }

            let candidates = self.duplicate_candidates(&cmd.team_id).await?;
            if let Some(verdict) = advisory
                .detect_duplicate(&expense.description, expense.amount_minor, &candidates)
                .await
                && verdict.is_duplicate
            {
                expense.is_duplicate = true;
                expense.duplicate_reason =
                    (!verdict.reason.is_empty()).then_some(verdict.reason);
            }
        }

        let entry: expenses::ActiveModel = (&expense).into();
        with_tx!(self, |db_tx| {
            self.require_team_model(&db_tx, &cmd.team_id).await?;
            entry.insert(&db_tx).await?;
            Ok(expense)
        })
    }

    /// Same-team expenses from the trailing duplicate window, newest first.
    async fn duplicate_candidates(&self, team_id: &str) -> ResultEngine<Vec<DuplicateCandidate>> {
        let cutoff = Utc::now().date_naive() - ChronoDuration::days(DUPLICATE_WINDOW_DAYS);
        let models = expenses::Entity::find()
            .filter(expenses::Column::TeamId.eq(team_id.to_string()))
            .filter(expenses::Column::IncurredOn.gte(cutoff))
            .order_by_desc(expenses::Column::IncurredOn)
            .limit(DUPLICATE_CANDIDATE_LIMIT)
            .all(&self.database)
            .await?;

        Ok(models
            .into_iter()
            .map(|model| DuplicateCandidate {
                description: model.description,
                amount_minor: model.amount_minor,
                incurred_on: model.incurred_on,
            })
            .collect())
    }

    /// Return a single expense.
    pub async fn expense(&self, expense_id: &str) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        Expense::try_from(model)
    }

    /// List expenses, filtered and cursor-paginated, ordered by
    /// `(incurred_on, id)`.
    pub async fn list_expenses(
        &self,
        filter: &ExpenseListFilter,
        cursor: Option<&str>,
        limit: u64,
    ) -> ResultEngine<ExpensePage> {
        filter.validate()?;
        let limit = if limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };

        let mut query = filter.apply(expenses::Entity::find());
        query = match filter.order {
            SortOrder::Descending => query
                .order_by_desc(expenses::Column::IncurredOn)
                .order_by_desc(expenses::Column::Id),
            SortOrder::Ascending => query
                .order_by_asc(expenses::Column::IncurredOn)
                .order_by_asc(expenses::Column::Id),
        };

        if let Some(cursor) = cursor {
            let cursor = ExpensesCursor::decode(cursor)?;
            let condition = match filter.order {
                SortOrder::Descending => Condition::any()
                    .add(expenses::Column::IncurredOn.lt(cursor.incurred_on))
                    .add(
                        Condition::all()
                            .add(expenses::Column::IncurredOn.eq(cursor.incurred_on))
                            .add(expenses::Column::Id.lt(cursor.expense_id)),
                    ),
                SortOrder::Ascending => Condition::any()
                    .add(expenses::Column::IncurredOn.gt(cursor.incurred_on))
                    .add(
                        Condition::all()
                            .add(expenses::Column::IncurredOn.eq(cursor.incurred_on))
                            .add(expenses::Column::Id.gt(cursor.expense_id)),
                    ),
            };
            query = query.filter(condition);
        }

        // Fetch one extra row to know whether a next page exists.
        let models = query.limit(limit + 1).all(&self.database).await?;
        let has_more = models.len() as u64 > limit;

        let mut result = Vec::with_capacity(models.len().min(limit as usize));
        for model in models.into_iter().take(limit as usize) {
            result.push(Expense::try_from(model)?);
        }

        let next_cursor = if has_more {
            result
                .last()
                .map(|expense| {
                    ExpensesCursor {
                        incurred_on: expense.incurred_on,
                        expense_id: expense.id.clone(),
                    }
                    .encode()
                })
                .transpose()?
        } else {
            None
        };

        Ok(ExpensePage {
            expenses: result,
            next_cursor,
        })
    }

    /// Record an approve/reject decision.
    pub async fn decide_expense(&self, cmd: DecideExpenseCmd) -> ResultEngine<Expense> {
        let (expense, _changed) = self.decide_expense_inner(&cmd).await?;
        Ok(expense)
    }

    /// Decision transition shared by the single and bulk paths.
    ///
    /// Returns the updated expense and whether anything changed; same-status
    /// writes are no-ops with no ledger effect and no notification.
    pub(super) async fn decide_expense_inner(
        &self,
        cmd: &DecideExpenseCmd,
    ) -> ResultEngine<(Expense, bool)> {
        validate_person(&cmd.approver, "approver")?;

        let team_id = self.expense(&cmd.expense_id).await?.team_id;
        let guard = self.lock_team(&team_id).await;

        let (updated, changed) = with_tx!(self, |db_tx| {
            let model = self.require_expense_model(&db_tx, &cmd.expense_id).await?;
            let mut expense = Expense::try_from(model)?;

            let previous_status = expense.status;
            let target_status = cmd.action.target_status();
            if previous_status == target_status {
                Ok::<_, crate::EngineError>((expense, false))
            } else {
                expense.status = target_status;
                expense.decision = Some(crate::Decision {
                    name: cmd.approver.name.clone(),
                    email: cmd.approver.email.clone(),
                    decided_at: cmd.decided_at,
                });

                let active: expenses::ActiveModel = (&expense).into();
                active.update(&db_tx).await?;

                let delta = ledger_delta(
                    previous_status,
                    expense.amount_minor,
                    target_status,
                    expense.amount_minor,
                );
                if delta != 0 {
                    self.apply_delta_with_alerts(&db_tx, &expense.team_id, delta)
                        .await?;
                }

                Ok((expense, true))
            }
        })?;
        drop(guard);

        if changed {
            self.notify_decision(&updated).await;
        }

        Ok((updated, changed))
    }

    async fn notify_decision(&self, expense: &Expense) {
        let note = DecisionNote {
            description: expense.description.clone(),
            amount_minor: expense.amount_minor,
            amount: format_minor(expense.amount_minor),
            category: expense.category,
            incurred_on: expense.incurred_on,
            status: expense.status,
        };
        if let Err(err) = self
            .notifier()
            .expense_decision(&expense.submitted_by.email, note)
            .await
        {
            tracing::warn!(
                "failed to notify {} about expense {}: {err}",
                expense.submitted_by.email,
                expense.id
            );
        }
    }

    /// Patch an expense's fields and/or move it back to `pending`.
    ///
    /// Editing the amount of an approved expense re-deltas the team aggregate
    /// by the difference; a `pending` status edit releases the full amount
    /// and clears the recorded decision.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        if let Some(status) = cmd.status
            && status.is_decided()
        {
            return Err(EngineError::InvalidTransition(
                "approval decisions require an approver identity".to_string(),
            ));
        }
        let description = cmd
            .description
            .as_deref()
            .map(normalize_description)
            .transpose()?;
        if let Some(amount_minor) = cmd.amount_minor {
            ensure_non_negative_amount(amount_minor, "amount_minor")?;
        }

        let team_id = self.expense(&cmd.expense_id).await?.team_id;
        let _guard = self.lock_team(&team_id).await;

        with_tx!(self, |db_tx| {
            let model = self.require_expense_model(&db_tx, &cmd.expense_id).await?;
            let mut expense = Expense::try_from(model)?;

            let previous_status = expense.status;
            let previous_amount = expense.amount_minor;

            if let Some(description) = description.clone() {
                expense.description = description;
            }
            if let Some(amount_minor) = cmd.amount_minor {
                expense.amount_minor = amount_minor;
            }
            if let Some(category) = cmd.category {
                expense.category = category;
            }
            if let Some(incurred_on) = cmd.incurred_on {
                expense.incurred_on = incurred_on;
            }
            if cmd.status == Some(ExpenseStatus::Pending) {
                expense.status = ExpenseStatus::Pending;
                expense.decision = None;
            }

            let active: expenses::ActiveModel = (&expense).into();
            active.update(&db_tx).await?;

            let delta = ledger_delta(
                previous_status,
                previous_amount,
                expense.status,
                expense.amount_minor,
            );
            if delta != 0 {
                self.apply_delta_with_alerts(&db_tx, &expense.team_id, delta)
                    .await?;
            }

            Ok(expense)
        })
    }

    /// Delete an expense, releasing its amount from the team aggregate first
    /// if it was approved.
    pub async fn delete_expense(&self, expense_id: &str) -> ResultEngine<()> {
        let team_id = self.expense(expense_id).await?.team_id;
        let _guard = self.lock_team(&team_id).await;

        with_tx!(self, |db_tx| {
            let model = self.require_expense_model(&db_tx, expense_id).await?;
            let expense = Expense::try_from(model)?;

            if expense.status.counts_against_budget() {
                self.apply_spending_delta(&db_tx, &expense.team_id, -expense.amount_minor)
                    .await?;
            }

            expenses::Entity::delete_by_id(expense_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
