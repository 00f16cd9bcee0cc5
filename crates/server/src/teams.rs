//! Team API endpoints

use api_types::expense::{ExpenseList, ExpenseListResponse};
use api_types::team::{
    AlertStatusView, BudgetStatusView, MemberRole, MemberView, RecomputeResponse, TeamCreated,
    TeamListResponse, TeamNew, TeamUpdate, TeamView,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{ServerError, expenses, server::ServerState};
use engine::{CreateTeamCmd, Team, TeamMember, UpdateTeamCmd};

fn map_role(role: MemberRole) -> engine::MemberRole {
    match role {
        MemberRole::Admin => engine::MemberRole::Admin,
        MemberRole::Member => engine::MemberRole::Member,
    }
}

fn map_role_view(role: engine::MemberRole) -> MemberRole {
    match role {
        engine::MemberRole::Admin => MemberRole::Admin,
        engine::MemberRole::Member => MemberRole::Member,
    }
}

fn map_members(members: Vec<MemberView>) -> Vec<TeamMember> {
    members
        .into_iter()
        .map(|member| TeamMember {
            name: member.name,
            email: member.email,
            role: map_role(member.role),
        })
        .collect()
}

fn map_team_view(team: Team) -> TeamView {
    TeamView {
        id: team.id,
        name: team.name,
        budget_minor: team.budget_minor,
        current_spending_minor: team.current_spending_minor,
        members: team
            .members
            .into_iter()
            .map(|member| MemberView {
                name: member.name,
                email: member.email,
                role: map_role_view(member.role),
            })
            .collect(),
        alerts: AlertStatusView {
            eighty_percent_sent: team.eighty_percent_sent,
            hundred_percent_sent: team.hundred_percent_sent,
        },
        created_at: team.created_at,
    }
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<TeamNew>,
) -> Result<(StatusCode, Json<TeamCreated>), ServerError> {
    let id = state
        .engine
        .create_team(CreateTeamCmd {
            name: payload.name,
            budget_minor: payload.budget_minor,
            members: map_members(payload.members),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TeamCreated { id })))
}

pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<TeamListResponse>, ServerError> {
    let teams = state.engine.list_teams().await?;
    Ok(Json(TeamListResponse {
        teams: teams.into_iter().map(map_team_view).collect(),
    }))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<TeamView>, ServerError> {
    let team = state.engine.team(&id).await?;
    Ok(Json(map_team_view(team)))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<TeamUpdate>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .update_team(
            &id,
            UpdateTeamCmd {
                name: payload.name,
                budget_minor: payload.budget_minor,
                members: payload.members.map(map_members),
            },
        )
        .await?;

    Ok(StatusCode::OK)
}

pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_team(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn budget_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<BudgetStatusView>, ServerError> {
    let status = state.engine.team_budget_status(&id).await?;
    Ok(Json(BudgetStatusView {
        team_id: status.team_id,
        team_name: status.team_name,
        budget_minor: status.budget_minor,
        current_spending_minor: status.current_spending_minor,
        remaining_minor: status.remaining_minor,
        utilization_percent: status.utilization_percent,
        is_over_budget: status.is_over_budget,
        is_near_budget: status.is_near_budget,
        alert_status: AlertStatusView {
            eighty_percent_sent: status.eighty_percent_sent,
            hundred_percent_sent: status.hundred_percent_sent,
        },
    }))
}

pub async fn team_expenses(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Query(payload): Query<ExpenseList>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    // Guarantee a 404 for unknown teams rather than an empty listing.
    state.engine.team_budget_status(&id).await?;

    let filter = expenses::build_filter(&payload, Some(id))?;
    let page = state
        .engine
        .list_expenses(
            &filter,
            payload.cursor.as_deref(),
            payload.limit.unwrap_or(0),
        )
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: page
            .expenses
            .into_iter()
            .map(expenses::map_expense_view)
            .collect(),
        next_cursor: page.next_cursor,
    }))
}

pub async fn recompute(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<RecomputeResponse>, ServerError> {
    let current_spending_minor = state.engine.recompute_team_spending(&id).await?;
    Ok(Json(RecomputeResponse {
        team_id: id,
        current_spending_minor,
    }))
}
