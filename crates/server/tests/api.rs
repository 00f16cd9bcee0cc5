use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use migration::MigratorTrait;
use server::{ServerState, router};

async fn test_router() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = engine::Engine::builder()
        .database(db)
        .build()
        .await
        .unwrap();

    router(ServerState {
        engine: Arc::new(engine),
    })
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).to_string(),
        ))
    };
    (status, value)
}

async fn create_team(router: &Router, name: &str, budget_minor: i64) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/teams",
        Some(json!({
            "name": name,
            "budget_minor": budget_minor,
            "members": [
                {"name": "Ada", "email": "ada@example.com", "role": "admin"},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_expense(router: &Router, team_id: &str, amount_minor: i64) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/expenses",
        Some(json!({
            "team_id": team_id,
            "description": "Conference tickets",
            "amount_minor": amount_minor,
            "category": "travel",
            "incurred_on": "2026-06-15",
            "submitted_by": {"name": "Ada", "email": "ada@example.com"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn team_crud_roundtrip() {
    let router = test_router().await;

    let team_id = create_team(&router, "Platform", 100_000).await;

    let (status, body) = send(&router, "GET", &format!("/teams/{team_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Platform");
    assert_eq!(body["budget_minor"], 100_000);
    assert_eq!(body["current_spending_minor"], 0);
    assert_eq!(body["alerts"]["eighty_percent_sent"], false);

    let (status, _) = send(
        &router,
        "PATCH",
        &format!("/teams/{team_id}"),
        Some(json!({"budget_minor": 200_000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, "GET", &format!("/teams/{team_id}"), None).await;
    assert_eq!(body["budget_minor"], 200_000);

    let (status, _) = send(&router, "GET", "/teams/no-such-team", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expense_approval_flow_updates_budget_status() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 100_000).await;
    let expense_id = create_expense(&router, &team_id, 20_000).await;

    let (status, body) = send(
        &router,
        "PATCH",
        &format!("/expenses/{expense_id}"),
        Some(json!({
            "status": "approved",
            "approver": {"name": "Grace", "email": "grace@example.com"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["approved_by"]["email"], "grace@example.com");

    let (status, body) = send(
        &router,
        "GET",
        &format!("/teams/{team_id}/budget-status"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_spending_minor"], 20_000);
    assert_eq!(body["remaining_minor"], 80_000);
    assert_eq!(body["is_over_budget"], false);
}

#[tokio::test]
async fn decisions_without_an_approver_are_rejected() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 100_000).await;
    let expense_id = create_expense(&router, &team_id, 20_000).await;

    let (status, _) = send(
        &router,
        "PATCH",
        &format!("/expenses/{expense_id}"),
        Some(json!({"status": "approved"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Mixing field edits into a decision is refused too.
    let (status, _) = send(
        &router,
        "PATCH",
        &format!("/expenses/{expense_id}"),
        Some(json!({
            "status": "approved",
            "approver": {"name": "Grace", "email": "grace@example.com"},
            "amount_minor": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_decision_reports_updated_count() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 1_000_000).await;
    let first = create_expense(&router, &team_id, 10_000).await;
    let second = create_expense(&router, &team_id, 15_000).await;

    let (status, body) = send(
        &router,
        "POST",
        "/expenses/bulk-decision",
        Some(json!({
            "expense_ids": [first, second],
            "action": "approve",
            "approver": {"name": "Grace", "email": "grace@example.com"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);

    let (_, body) = send(
        &router,
        "GET",
        &format!("/teams/{team_id}/budget-status"),
        None,
    )
    .await;
    assert_eq!(body["current_spending_minor"], 25_000);
}

#[tokio::test]
async fn bulk_decision_with_unknown_id_fails_with_404() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 1_000_000).await;
    let known = create_expense(&router, &team_id, 10_000).await;

    let (status, _) = send(
        &router,
        "POST",
        "/expenses/bulk-decision",
        Some(json!({
            "expense_ids": [known, "ghost"],
            "action": "approve",
            "approver": {"name": "Grace", "email": "grace@example.com"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn teams_with_expenses_cannot_be_deleted_over_http() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 100_000).await;
    let expense_id = create_expense(&router, &team_id, 10_000).await;

    let (status, _) = send(&router, "DELETE", &format!("/teams/{team_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, "DELETE", &format!("/expenses/{expense_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, "DELETE", &format!("/teams/{team_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn expense_listing_filters_by_status() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 1_000_000).await;
    let first = create_expense(&router, &team_id, 10_000).await;
    let _second = create_expense(&router, &team_id, 15_000).await;

    let (_, _) = send(
        &router,
        "PATCH",
        &format!("/expenses/{first}"),
        Some(json!({
            "status": "approved",
            "approver": {"name": "Grace", "email": "grace@example.com"},
        })),
    )
    .await;

    let (status, body) = send(
        &router,
        "GET",
        &format!("/expenses?team_id={team_id}&status=approved"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expenses"].as_array().unwrap().len(), 1);
    assert_eq!(body["expenses"][0]["id"], first.as_str());

    let (status, body) = send(
        &router,
        "GET",
        &format!("/teams/{team_id}/expenses"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expenses"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn csv_export_renders_a_table() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 1_000_000).await;
    create_expense(&router, &team_id, 10_000).await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/expenses/export?team_id={team_id}"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/csv"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("id,team_id,description"));
    assert!(text.contains("Conference tickets"));
}

#[tokio::test]
async fn insights_and_forecast_answer_for_existing_teams() {
    let router = test_router().await;
    let team_id = create_team(&router, "Platform", 1_000_000).await;
    let expense_id = create_expense(&router, &team_id, 10_000).await;
    let (_, _) = send(
        &router,
        "PATCH",
        &format!("/expenses/{expense_id}"),
        Some(json!({
            "status": "approved",
            "approver": {"name": "Grace", "email": "grace@example.com"},
        })),
    )
    .await;

    let (status, body) = send(
        &router,
        "GET",
        &format!("/teams/{team_id}/insights"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved_count"], 1);
    assert_eq!(body["total_approved_minor"], 10_000);
    assert_eq!(body["top_category"], "travel");

    let (status, body) = send(
        &router,
        "GET",
        &format!("/teams/{team_id}/forecast"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["remaining_minor"].is_i64());

    let (status, _) = send(&router, "GET", "/teams/ghost/insights", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
