//! Budget ledger: keeps a team's `current_spending_minor` consistent with its
//! approved expenses, and gates the one-time threshold alerts.
//!
//! All writes here run inside the caller's DB transaction while the caller
//! holds the team lock. The `version` column adds a storage-layer
//! compare-and-swap so an out-of-process writer (admin tooling) cannot cause
//! a silent lost update.

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    EngineError, ExpenseStatus, ResultEngine,
    notify::{AlertKind, BudgetAlertNote},
    team_members, teams,
};

use super::{Engine, with_tx};

/// Conditional-update retries before giving up with `WriteConflict`.
const CAS_RETRY_LIMIT: u32 = 3;

pub(super) const EIGHTY_PERCENT: f64 = 80.0;
pub(super) const HUNDRED_PERCENT: f64 = 100.0;

/// Percentage of budget consumed.
///
/// A zero budget is defined as 0% utilization: zero-budget teams never
/// report over-budget and never alert.
pub fn utilization(spending_minor: i64, budget_minor: i64) -> f64 {
    if budget_minor > 0 {
        spending_minor as f64 / budget_minor as f64 * 100.0
    } else {
        0.0
    }
}

/// At most one alert per evaluation; the 100% alert wins over the 80% one.
/// Thresholds are inclusive. Latched alerts never fire again.
pub(super) fn evaluate_alert(
    utilization_percent: f64,
    eighty_percent_sent: bool,
    hundred_percent_sent: bool,
) -> Option<AlertKind> {
    if utilization_percent >= HUNDRED_PERCENT && !hundred_percent_sent {
        Some(AlertKind::HundredPercent)
    } else if utilization_percent >= EIGHTY_PERCENT && !eighty_percent_sent {
        Some(AlertKind::EightyPercent)
    } else {
        None
    }
}

impl Engine {
    /// Adds `delta_minor` to the team's cached spending, clamped at zero.
    ///
    /// Single atomic read-modify-write: the row is re-read and the update is
    /// conditioned on the `version` stamp, retried on conflict. Returns the
    /// updated spending.
    pub(super) async fn apply_spending_delta(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
        delta_minor: i64,
    ) -> ResultEngine<i64> {
        for _ in 0..CAS_RETRY_LIMIT {
            let team = self.require_team_model(db_tx, team_id).await?;
            // Clamp at zero: drift from historical inconsistency must not
            // produce a negative aggregate.
            let new_spending = (team.current_spending_minor + delta_minor).max(0);

            let update = teams::Entity::update_many()
                .col_expr(teams::Column::CurrentSpendingMinor, Expr::value(new_spending))
                .col_expr(teams::Column::Version, Expr::value(team.version + 1))
                .filter(teams::Column::Id.eq(team_id.to_string()))
                .filter(teams::Column::Version.eq(team.version))
                .exec(db_tx)
                .await?;

            if update.rows_affected == 1 {
                return Ok(new_spending);
            }
            tracing::debug!("spending update lost the race for team {team_id}, retrying");
        }

        Err(EngineError::WriteConflict(format!(
            "team {team_id} spending update exhausted {CAS_RETRY_LIMIT} attempts"
        )))
    }

    /// Ledger entry point for status transitions: applies the delta, then
    /// evaluates the threshold alerts (only when the aggregate grew).
    pub(super) async fn apply_delta_with_alerts(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
        delta_minor: i64,
    ) -> ResultEngine<i64> {
        let spending = self.apply_spending_delta(db_tx, team_id, delta_minor).await?;
        if delta_minor > 0 {
            self.evaluate_and_dispatch_alert(db_tx, team_id).await?;
        }
        Ok(spending)
    }

    /// Evaluates the alert gate and, when a threshold was crossed, dispatches
    /// the alert and sets its latch.
    ///
    /// Dispatch and latch write are one unit: the latch is only written after
    /// the dispatcher reported success, in the same transaction as the ledger
    /// delta. A failed dispatch leaves the latch unset, so the alert stays
    /// eligible at the next evaluation.
    async fn evaluate_and_dispatch_alert(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
    ) -> ResultEngine<()> {
        let team = self.require_team_model(db_tx, team_id).await?;
        let utilization_percent = utilization(team.current_spending_minor, team.budget_minor);
        let Some(kind) = evaluate_alert(
            utilization_percent,
            team.eighty_percent_sent,
            team.hundred_percent_sent,
        ) else {
            return Ok(());
        };

        let recipients: Vec<String> = team_members::Entity::find()
            .filter(team_members::Column::TeamId.eq(team_id.to_string()))
            .order_by_asc(team_members::Column::Position)
            .all(db_tx)
            .await?
            .into_iter()
            .map(|member| member.email)
            .collect();

        let note = BudgetAlertNote {
            team_name: team.name.clone(),
            budget_minor: team.budget_minor,
            current_spending_minor: team.current_spending_minor,
            utilization_percent,
            kind,
        };

        match self.notifier().budget_alert(&recipients, note).await {
            Ok(()) => {
                let latch_column = match kind {
                    AlertKind::EightyPercent => teams::Column::EightyPercentSent,
                    AlertKind::HundredPercent => teams::Column::HundredPercentSent,
                };
                teams::Entity::update_many()
                    .col_expr(latch_column, Expr::value(true))
                    .filter(teams::Column::Id.eq(team_id.to_string()))
                    .exec(db_tx)
                    .await?;
                tracing::info!(
                    "dispatched {kind:?} alert for team {} at {utilization_percent:.1}%",
                    team.name
                );
                Ok(())
            }
            Err(err) => {
                // The transition still commits; the unlatched alert will be
                // re-evaluated on the next aggregate increase.
                tracing::warn!(
                    "failed to dispatch {kind:?} alert for team {}: {err}",
                    team.name
                );
                Ok(())
            }
        }
    }

    /// Recomputes the cached aggregate from the approved expense records and
    /// overwrites it. Authoritative recovery path when drift is suspected.
    pub(super) async fn recompute_spending_tx(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
    ) -> ResultEngine<i64> {
        let backend = self.database.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
             FROM expenses \
             WHERE team_id = ? AND status = ?",
            vec![
                team_id.into(),
                ExpenseStatus::Approved.as_str().into(),
            ],
        );
        let row = db_tx.query_one(stmt).await?;
        let recomputed: i64 = row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0);

        teams::Entity::update_many()
            .col_expr(teams::Column::CurrentSpendingMinor, Expr::value(recomputed))
            .col_expr(
                teams::Column::Version,
                Expr::col(teams::Column::Version).add(1),
            )
            .filter(teams::Column::Id.eq(team_id.to_string()))
            .exec(db_tx)
            .await?;

        Ok(recomputed)
    }

    /// Public reconciliation operation: recompute a team's spending from its
    /// approved expenses and persist the result.
    pub async fn recompute_team_spending(&self, team_id: &str) -> ResultEngine<i64> {
        let _guard = self.lock_team(team_id).await;
        with_tx!(self, |db_tx| {
            self.require_team_model(&db_tx, team_id).await?;
            self.recompute_spending_tx(&db_tx, team_id).await
        })
    }

    /// Clears both alert latches. Administrative action, not exposed over
    /// HTTP.
    pub async fn reset_alert_latches(&self, team_id: &str) -> ResultEngine<()> {
        let _guard = self.lock_team(team_id).await;
        with_tx!(self, |db_tx| {
            self.require_team_model(&db_tx, team_id).await?;
            let active = teams::ActiveModel {
                id: ActiveValue::Set(team_id.to_string()),
                eighty_percent_sent: ActiveValue::Set(false),
                hundred_percent_sent: ActiveValue::Set(false),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_is_a_percentage() {
        assert_eq!(utilization(800_00, 1000_00), 80.0);
        assert!((utilization(1100_00, 1000_00) - 110.0).abs() < 1e-9);
    }

    #[test]
    fn zero_budget_is_zero_utilization() {
        assert_eq!(utilization(0, 0), 0.0);
        assert_eq!(utilization(500_00, 0), 0.0);
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(evaluate_alert(80.0, false, false), Some(AlertKind::EightyPercent));
        assert_eq!(evaluate_alert(100.0, false, false), Some(AlertKind::HundredPercent));
        assert_eq!(evaluate_alert(79.999, false, false), None);
    }

    #[test]
    fn hundred_percent_wins_over_eighty() {
        assert_eq!(
            evaluate_alert(120.0, false, false),
            Some(AlertKind::HundredPercent)
        );
    }

    #[test]
    fn latched_alerts_never_fire_again() {
        assert_eq!(evaluate_alert(85.0, true, false), None);
        assert_eq!(evaluate_alert(150.0, true, true), None);
        // 100% latched but 80% still pending.
        assert_eq!(
            evaluate_alert(150.0, false, true),
            Some(AlertKind::EightyPercent)
        );
    }
}
