//! Notification dispatch seam.
//!
//! Notifications are best-effort: a failed dispatch is logged and never rolls
//! back committed state. The one exception is the budget-alert latch
//! contract, handled by the ledger: the latch is only set when the alert
//! dispatch reported success.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::{Category, ExpenseStatus};

/// Which budget threshold an alert announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    EightyPercent,
    HundredPercent,
}

impl AlertKind {
    pub fn threshold_percent(self) -> f64 {
        match self {
            Self::EightyPercent => 80.0,
            Self::HundredPercent => 100.0,
        }
    }
}

/// Payload for an expense approved/rejected notification.
#[derive(Clone, Debug, Serialize)]
pub struct DecisionNote {
    pub description: String,
    pub amount_minor: i64,
    pub amount: String,
    pub category: Category,
    pub incurred_on: NaiveDate,
    pub status: ExpenseStatus,
}

/// Payload for a budget-threshold alert.
#[derive(Clone, Debug, Serialize)]
pub struct BudgetAlertNote {
    pub team_name: String,
    pub budget_minor: i64,
    pub current_spending_minor: i64,
    pub utilization_percent: f64,
    pub kind: AlertKind,
}

#[derive(Debug, Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell a submitter their expense was approved or rejected.
    async fn expense_decision(&self, recipient: &str, note: DecisionNote)
    -> Result<(), NotifyError>;

    /// Tell every team member a budget threshold was crossed.
    async fn budget_alert(
        &self,
        recipients: &[String],
        note: BudgetAlertNote,
    ) -> Result<(), NotifyError>;
}

/// Dispatcher that drops everything. Default for tests and for deployments
/// without a notification endpoint.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn expense_decision(
        &self,
        recipient: &str,
        note: DecisionNote,
    ) -> Result<(), NotifyError> {
        tracing::debug!(
            "dropping decision note for {recipient}: {} {}",
            note.status.as_str(),
            note.amount
        );
        Ok(())
    }

    async fn budget_alert(
        &self,
        recipients: &[String],
        note: BudgetAlertNote,
    ) -> Result<(), NotifyError> {
        tracing::debug!(
            "dropping {:?} alert for team {} ({} recipients)",
            note.kind,
            note.team_name,
            recipients.len()
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookEnvelope<'a, T: Serialize> {
    event: &'a str,
    recipients: &'a [String],
    #[serde(flatten)]
    payload: T,
}

/// Posts notification payloads as JSON to a configured webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post<T: Serialize>(&self, envelope: WebhookEnvelope<'_, T>) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| NotifyError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn expense_decision(
        &self,
        recipient: &str,
        note: DecisionNote,
    ) -> Result<(), NotifyError> {
        let recipients = [recipient.to_string()];
        self.post(WebhookEnvelope {
            event: "expense_decision",
            recipients: &recipients,
            payload: note,
        })
        .await
    }

    async fn budget_alert(
        &self,
        recipients: &[String],
        note: BudgetAlertNote,
    ) -> Result<(), NotifyError> {
        self.post(WebhookEnvelope {
            event: "budget_alert",
            recipients,
            payload: note,
        })
        .await
    }
}
