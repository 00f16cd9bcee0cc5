//! Advisory spending insights and budget forecasts.
//!
//! Pure aggregation over already-committed expense data, cached for a short
//! TTL per team. Nothing here participates in the consistency contract; a
//! stale answer is acceptable by design of the endpoints.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, Statement, TransactionTrait};

use crate::{Category, ExpenseStatus, ResultEngine};

use super::{Engine, with_tx};

const CACHE_TTL: Duration = Duration::from_secs(300);
const RUN_RATE_WINDOW_DAYS: i64 = 90;

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub total_minor: i64,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TeamInsights {
    pub team_id: String,
    pub total_approved_minor: i64,
    pub pending_count: i64,
    pub approved_count: i64,
    pub rejected_count: i64,
    /// Approved spend per category, largest first.
    pub by_category: Vec<CategoryBreakdown>,
    pub top_category: Option<Category>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TeamForecast {
    pub team_id: String,
    /// Average approved spend per 30 days over the trailing window.
    pub monthly_run_rate_minor: i64,
    /// Current month's spend projected to month end at the month-to-date pace.
    pub projected_month_end_minor: i64,
    pub remaining_minor: i64,
    /// `None` when the run rate is zero.
    pub months_to_exhaustion: Option<f64>,
}

struct TtlCache<T> {
    entries: std::sync::Mutex<HashMap<String, (Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < CACHE_TTL)
            .map(|(_, value)| value.clone())
    }

    fn put(&self, key: String, value: T) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // Drop expired entries opportunistically so the map stays bounded.
        entries.retain(|_, (stored, _)| stored.elapsed() < CACHE_TTL);
        entries.insert(key, (Instant::now(), value));
    }
}

pub(super) struct InsightCaches {
    insights: TtlCache<TeamInsights>,
    forecast: TtlCache<TeamForecast>,
}

impl Default for InsightCaches {
    fn default() -> Self {
        Self {
            insights: TtlCache::new(),
            forecast: TtlCache::new(),
        }
    }
}

impl Engine {
    /// Spending insights for a team: status counts and approved spend per
    /// category. Served from a short-lived cache.
    pub async fn team_insights(&self, team_id: &str) -> ResultEngine<TeamInsights> {
        if let Some(cached) = self.insight_caches.insights.get(team_id) {
            return Ok(cached);
        }

        let backend = self.database.get_database_backend();
        let insights = with_tx!(self, |db_tx| {
            self.require_team_model(&db_tx, team_id).await?;

            let mut pending_count = 0;
            let mut approved_count = 0;
            let mut rejected_count = 0;
            let status_rows = db_tx
                .query_all(Statement::from_sql_and_values(
                    backend,
                    "SELECT status, COUNT(*) AS cnt \
                     FROM expenses WHERE team_id = ? GROUP BY status",
                    vec![team_id.into()],
                ))
                .await?;
            for row in status_rows {
                let status: String = row.try_get("", "status")?;
                let count: i64 = row.try_get("", "cnt")?;
                match ExpenseStatus::try_from(status.as_str())? {
                    ExpenseStatus::Pending => pending_count = count,
                    ExpenseStatus::Approved => approved_count = count,
                    ExpenseStatus::Rejected => rejected_count = count,
                }
            }

            let mut by_category = Vec::new();
            let mut total_approved_minor = 0;
            let category_rows = db_tx
                .query_all(Statement::from_sql_and_values(
                    backend,
                    "SELECT category, COALESCE(SUM(amount_minor), 0) AS total, COUNT(*) AS cnt \
                     FROM expenses WHERE team_id = ? AND status = ? \
                     GROUP BY category ORDER BY total DESC",
                    vec![team_id.into(), ExpenseStatus::Approved.as_str().into()],
                ))
                .await?;
            for row in category_rows {
                let category: String = row.try_get("", "category")?;
                let total_minor: i64 = row.try_get("", "total")?;
                let count: i64 = row.try_get("", "cnt")?;
                total_approved_minor += total_minor;
                by_category.push(CategoryBreakdown {
                    category: Category::try_from(category.as_str())?,
                    total_minor,
                    count,
                });
            }

            Ok::<_, crate::EngineError>(TeamInsights {
                team_id: team_id.to_string(),
                total_approved_minor,
                pending_count,
                approved_count,
                rejected_count,
                top_category: by_category.first().map(|entry| entry.category),
                by_category,
            })
        })?;

        self.insight_caches
            .insights
            .put(team_id.to_string(), insights.clone());
        Ok(insights)
    }

    /// Budget forecast for a team, extrapolated from the trailing 90 days of
    /// approved spend. Served from a short-lived cache.
    pub async fn team_forecast(&self, team_id: &str) -> ResultEngine<TeamForecast> {
        if let Some(cached) = self.insight_caches.forecast.get(team_id) {
            return Ok(cached);
        }

        let today = Utc::now().date_naive();
        let backend = self.database.get_database_backend();
        let forecast = with_tx!(self, |db_tx| {
            let team = self.require_team_model(&db_tx, team_id).await?;

            let window_start = today - chrono::Duration::days(RUN_RATE_WINDOW_DAYS);
            let trailing_minor: i64 = db_tx
                .query_one(Statement::from_sql_and_values(
                    backend,
                    "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
                     FROM expenses \
                     WHERE team_id = ? AND status = ? AND incurred_on >= ?",
                    vec![
                        team_id.into(),
                        ExpenseStatus::Approved.as_str().into(),
                        window_start.into(),
                    ],
                ))
                .await?
                .and_then(|row| row.try_get("", "sum").ok())
                .unwrap_or(0);

            let month_start = today.with_day(1).unwrap_or(today);
            let month_to_date_minor: i64 = db_tx
                .query_one(Statement::from_sql_and_values(
                    backend,
                    "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
                     FROM expenses \
                     WHERE team_id = ? AND status = ? AND incurred_on >= ?",
                    vec![
                        team_id.into(),
                        ExpenseStatus::Approved.as_str().into(),
                        month_start.into(),
                    ],
                ))
                .await?
                .and_then(|row| row.try_get("", "sum").ok())
                .unwrap_or(0);

            let monthly_run_rate_minor = trailing_minor * 30 / RUN_RATE_WINDOW_DAYS;
            let projected_month_end_minor =
                project_month_end(month_to_date_minor, today);
            let remaining_minor = team.budget_minor - team.current_spending_minor;
            let months_to_exhaustion = if monthly_run_rate_minor > 0 && remaining_minor > 0 {
                Some(remaining_minor as f64 / monthly_run_rate_minor as f64)
            } else {
                None
            };

            Ok::<_, crate::EngineError>(TeamForecast {
                team_id: team_id.to_string(),
                monthly_run_rate_minor,
                projected_month_end_minor,
                remaining_minor,
                months_to_exhaustion,
            })
        })?;

        self.insight_caches
            .forecast
            .put(team_id.to_string(), forecast.clone());
        Ok(forecast)
    }
}

fn days_in_month(date: NaiveDate) -> i64 {
    let next_month = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    match (next_month, date.with_day(1)) {
        (Some(next), Some(first)) => (next - first).num_days(),
        _ => 30,
    }
}

fn project_month_end(month_to_date_minor: i64, today: NaiveDate) -> i64 {
    let elapsed = today.day() as i64;
    if elapsed == 0 {
        return month_to_date_minor;
    }
    month_to_date_minor * days_in_month(today) / elapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_end_projection_scales_by_elapsed_days() {
        let mid_month = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(project_month_end(1500, mid_month), 3000);

        let last_day = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        assert_eq!(project_month_end(1500, last_day), 1500);
    }

    #[test]
    fn days_in_month_handles_year_end() {
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2026, 12, 10).unwrap()), 31);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()), 28);
    }

    #[test]
    fn cache_returns_value_within_ttl() {
        let cache: TtlCache<i64> = TtlCache::new();
        cache.put("team".to_string(), 42);
        assert_eq!(cache.get("team"), Some(42));
        assert_eq!(cache.get("other"), None);
    }
}
