use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::advisory::AdvisoryAdapter;
use crate::notify::{NoopNotifier, Notifier};

mod bulk;
mod expenses;
mod insights;
mod ledger;
mod teams;

pub use expenses::{ExpenseListFilter, ExpensePage, SortOrder};
pub use insights::{CategoryBreakdown, TeamForecast, TeamInsights};
pub use ledger::utilization;
pub use teams::BudgetStatus;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Per-team async locks.
///
/// Every mutation of a team's spending aggregate or alert latches holds that
/// team's lock for the whole read-update-write-persist span; operations on
/// different teams proceed in parallel.
#[derive(Default)]
struct TeamLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TeamLocks {
    fn for_team(&self, team_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(team_id.to_string()).or_default().clone()
    }
}

pub struct Engine {
    database: DatabaseConnection,
    advisory: Option<Arc<AdvisoryAdapter>>,
    notifier: Arc<dyn Notifier>,
    team_locks: TeamLocks,
    insight_caches: insights::InsightCaches,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) async fn lock_team(&self, team_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.team_locks.for_team(team_id).lock_owned().await
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    advisory: Option<Arc<AdvisoryAdapter>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Attach the advisory adapter. Without one, expenses are created with no
    /// advisory annotations.
    pub fn advisory(mut self, advisory: AdvisoryAdapter) -> EngineBuilder {
        self.advisory = Some(Arc::new(advisory));
        self
    }

    /// Attach the notification dispatcher. Defaults to [`NoopNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> crate::ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            advisory: self.advisory,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            team_locks: TeamLocks::default(),
            insight_caches: insights::InsightCaches::default(),
        })
    }
}
