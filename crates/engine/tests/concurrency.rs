//! Lost-update safety: concurrent approvals against one team must leave the
//! aggregate equal to the sum of all applied deltas.

use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::Database;
use uuid::Uuid;

use engine::{
    Category, CreateExpenseCmd, CreateTeamCmd, DecideExpenseCmd, DecisionAction, Engine, Person,
};
use migration::MigratorTrait;

const TASKS: usize = 8;
const AMOUNT_MINOR: i64 = 1_000;

async fn engine_with_file_db() -> (Engine, std::path::PathBuf) {
    let root =
        std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();

    (engine, path)
}

fn person(name: &str) -> Person {
    Person {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_lose_no_deltas() {
    let (engine, path) = engine_with_file_db().await;
    let engine = Arc::new(engine);

    // Budget sized so no threshold is crossed while the tasks race.
    let team_id = engine
        .create_team(CreateTeamCmd {
            name: "Racing".to_string(),
            budget_minor: TASKS as i64 * AMOUNT_MINOR * 2,
            members: Vec::new(),
        })
        .await
        .unwrap();

    let mut expense_ids = Vec::new();
    for n in 0..TASKS {
        let expense = engine
            .create_expense(CreateExpenseCmd {
                team_id: team_id.clone(),
                description: format!("Expense {n}"),
                amount_minor: AMOUNT_MINOR,
                category: Category::Other,
                incurred_on: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
                submitted_by: person("Ada"),
            })
            .await
            .unwrap();
        expense_ids.push(expense.id);
    }

    let mut handles = Vec::new();
    for expense_id in expense_ids {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .decide_expense(DecideExpenseCmd::new(
                    expense_id,
                    DecisionAction::Approve,
                    person("Grace"),
                ))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let status = engine.team_budget_status(&team_id).await.unwrap();
    assert_eq!(status.current_spending_minor, TASKS as i64 * AMOUNT_MINOR);

    // The recomputed truth agrees with the incrementally maintained cache.
    let recomputed = engine.recompute_team_spending(&team_id).await.unwrap();
    assert_eq!(recomputed, TASKS as i64 * AMOUNT_MINOR);

    let _ = std::fs::remove_file(&path);
}
