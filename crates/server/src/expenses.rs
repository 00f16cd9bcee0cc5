//! Expense API endpoints

use api_types::expense::{
    BulkDecision, BulkDecisionResponse, DecisionView, ExpenseList, ExpenseListResponse,
    ExpenseNew, ExpenseUpdate, ExpenseView, PersonView,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::{ServerError, map_category, map_category_view, map_status, map_status_view, server::ServerState};
use engine::{
    BulkDecisionCmd, CreateExpenseCmd, DecideExpenseCmd, DecisionAction, Expense,
    ExpenseListFilter, SortOrder, UpdateExpenseCmd,
};

fn map_person(person: PersonView) -> engine::Person {
    engine::Person {
        name: person.name,
        email: person.email,
    }
}

pub(crate) fn map_expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        team_id: expense.team_id,
        description: expense.description,
        amount_minor: expense.amount_minor,
        category: map_category_view(expense.category),
        ai_suggested_category: expense.ai_suggested_category.map(map_category_view),
        incurred_on: expense.incurred_on,
        status: map_status_view(expense.status),
        submitted_by: PersonView {
            name: expense.submitted_by.name,
            email: expense.submitted_by.email,
        },
        approved_by: expense.decision.map(|decision| DecisionView {
            name: decision.name,
            email: decision.email,
            decided_at: decision.decided_at,
        }),
        is_duplicate: expense.is_duplicate,
        duplicate_reason: expense.duplicate_reason,
        created_at: expense.created_at,
    }
}

pub(crate) fn build_filter(
    payload: &ExpenseList,
    forced_team_id: Option<String>,
) -> Result<ExpenseListFilter, ServerError> {
    let order = match payload.order.as_deref() {
        None | Some("desc") => SortOrder::Descending,
        Some("asc") => SortOrder::Ascending,
        Some(other) => {
            return Err(ServerError::Generic(format!(
                "invalid order: {other} (expected asc or desc)"
            )));
        }
    };

    Ok(ExpenseListFilter {
        team_id: forced_team_id.or_else(|| payload.team_id.clone()),
        status: payload.status.map(map_status),
        category: payload.category.map(map_category),
        from: payload.from,
        to: payload.to,
        search: payload.search.clone(),
        order,
    })
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let expense = state
        .engine
        .create_expense(CreateExpenseCmd {
            team_id: payload.team_id,
            description: payload.description,
            amount_minor: payload.amount_minor,
            category: map_category(payload.category),
            incurred_on: payload.incurred_on,
            submitted_by: map_person(payload.submitted_by),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(map_expense_view(expense))))
}

pub async fn list(
    State(state): State<ServerState>,
    Query(payload): Query<ExpenseList>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let filter = build_filter(&payload, None)?;
    let page = state
        .engine
        .list_expenses(
            &filter,
            payload.cursor.as_deref(),
            payload.limit.unwrap_or(0),
        )
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: page.expenses.into_iter().map(map_expense_view).collect(),
        next_cursor: page.next_cursor,
    }))
}

pub async fn export(
    State(state): State<ServerState>,
    Query(payload): Query<ExpenseList>,
) -> Result<impl IntoResponse, ServerError> {
    let filter = build_filter(&payload, None)?;
    let page = state
        .engine
        .list_expenses(
            &filter,
            payload.cursor.as_deref(),
            payload.limit.unwrap_or(0),
        )
        .await?;

    let csv = engine::expenses_to_csv(&page.expenses)?;
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv,
    ))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(&id).await?;
    Ok(Json(map_expense_view(expense)))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = match payload.status {
        Some(status @ (api_types::ExpenseStatus::Approved | api_types::ExpenseStatus::Rejected)) => {
            let Some(approver) = payload.approver else {
                return Err(ServerError::Generic(
                    "approver is required for approval decisions".to_string(),
                ));
            };
            if payload.description.is_some()
                || payload.amount_minor.is_some()
                || payload.category.is_some()
                || payload.incurred_on.is_some()
            {
                return Err(ServerError::Generic(
                    "field edits cannot be combined with an approval decision".to_string(),
                ));
            }

            let action = match status {
                api_types::ExpenseStatus::Approved => DecisionAction::Approve,
                _ => DecisionAction::Reject,
            };
            state
                .engine
                .decide_expense(DecideExpenseCmd::new(id, action, map_person(approver)))
                .await?
        }
        other => {
            let cmd = UpdateExpenseCmd {
                expense_id: id,
                description: payload.description,
                amount_minor: payload.amount_minor,
                category: payload.category.map(map_category),
                incurred_on: payload.incurred_on,
                status: other.map(map_status),
            };
            state.engine.update_expense(cmd).await?
        }
    };

    Ok(Json(map_expense_view(expense)))
}

pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_expense(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_decision(
    State(state): State<ServerState>,
    Json(payload): Json<BulkDecision>,
) -> Result<Json<BulkDecisionResponse>, ServerError> {
    let action = DecisionAction::try_from(payload.action.as_str())?;
    let updated = state
        .engine
        .bulk_decision(BulkDecisionCmd::new(
            payload.expense_ids,
            action,
            map_person(payload.approver),
        ))
        .await?;

    Ok(Json(BulkDecisionResponse { updated }))
}
