//! Spending insights and forecast endpoints (advisory, short-term cached).

use api_types::insights::{CategoryBreakdownView, TeamForecastView, TeamInsightsView};
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{ServerError, map_category_view, server::ServerState};

pub async fn team_insights(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<TeamInsightsView>, ServerError> {
    let insights = state.engine.team_insights(&id).await?;
    Ok(Json(TeamInsightsView {
        team_id: insights.team_id,
        total_approved_minor: insights.total_approved_minor,
        pending_count: insights.pending_count,
        approved_count: insights.approved_count,
        rejected_count: insights.rejected_count,
        by_category: insights
            .by_category
            .into_iter()
            .map(|entry| CategoryBreakdownView {
                category: map_category_view(entry.category),
                total_minor: entry.total_minor,
                count: entry.count,
            })
            .collect(),
        top_category: insights.top_category.map(map_category_view),
    }))
}

pub async fn team_forecast(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<TeamForecastView>, ServerError> {
    let forecast = state.engine.team_forecast(&id).await?;
    Ok(Json(TeamForecastView {
        team_id: forecast.team_id,
        monthly_run_rate_minor: forecast.monthly_run_rate_minor,
        projected_month_end_minor: forecast.projected_month_end_minor,
        remaining_minor: forecast.remaining_minor,
        months_to_exhaustion: forecast.months_to_exhaustion,
    }))
}
