//! Bulk decision coordinator: the same approve/reject applied to a batch of
//! expenses.
//!
//! The whole batch is refused when any id does not resolve (checked before
//! any mutation). Per-item write conflicts are retried a bounded number of
//! times; an item that still conflicts is skipped and logged rather than
//! failing the rest of the batch.

use std::collections::BTreeSet;

use sea_orm::{QueryFilter, QuerySelect, prelude::*};

use crate::{
    BulkDecisionCmd, DecideExpenseCmd, EngineError, ResultEngine,
    util::validate_person,
    expenses,
};

use super::Engine;

const ITEM_RETRY_LIMIT: u32 = 3;

impl Engine {
    /// Apply the same decision to every expense in the batch.
    ///
    /// Returns the number of expenses whose status actually changed;
    /// same-status no-ops are not counted and not notified.
    pub async fn bulk_decision(&self, cmd: BulkDecisionCmd) -> ResultEngine<u64> {
        if cmd.expense_ids.is_empty() {
            return Err(EngineError::InvalidInput(
                "expense_ids must not be empty".to_string(),
            ));
        }
        validate_person(&cmd.approver, "approver")?;

        // Atomic existence check: any unresolved id fails the batch with no
        // partial effect.
        let distinct: BTreeSet<&String> = cmd.expense_ids.iter().collect();
        let found: BTreeSet<String> = expenses::Entity::find()
            .filter(expenses::Column::Id.is_in(distinct.iter().map(|id| id.as_str())))
            .select_only()
            .column(expenses::Column::Id)
            .into_tuple::<String>()
            .all(&self.database)
            .await?
            .into_iter()
            .collect();

        if let Some(missing) = distinct.iter().find(|id| !found.contains(id.as_str())) {
            return Err(EngineError::KeyNotFound(format!(
                "expense {missing} not exists"
            )));
        }

        let mut updated = 0u64;
        for expense_id in &cmd.expense_ids {
            let decide = DecideExpenseCmd {
                expense_id: expense_id.clone(),
                action: cmd.action,
                approver: cmd.approver.clone(),
                decided_at: cmd.decided_at,
            };

            let mut attempts = 0;
            loop {
                attempts += 1;
                match self.decide_expense_inner(&decide).await {
                    Ok((_, changed)) => {
                        if changed {
                            updated += 1;
                        }
                        break;
                    }
                    Err(EngineError::WriteConflict(err)) if attempts < ITEM_RETRY_LIMIT => {
                        tracing::debug!(
                            "bulk decision retrying expense {expense_id} after conflict: {err}"
                        );
                    }
                    Err(EngineError::WriteConflict(err)) => {
                        tracing::warn!(
                            "bulk decision skipped expense {expense_id} after {attempts} conflicts: {err}"
                        );
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(updated)
    }
}
