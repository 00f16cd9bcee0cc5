use axum::{
    Router,
    routing::{get, post},
};

use std::sync::Arc;

use crate::{expenses, insights, teams};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/expenses", post(expenses::create).get(expenses::list))
        .route("/expenses/export", get(expenses::export))
        .route("/expenses/bulk-decision", post(expenses::bulk_decision))
        .route(
            "/expenses/{id}",
            get(expenses::get_one)
                .patch(expenses::update)
                .delete(expenses::remove),
        )
        .route("/teams", post(teams::create).get(teams::list))
        .route(
            "/teams/{id}",
            get(teams::get_one).patch(teams::update).delete(teams::remove),
        )
        .route("/teams/{id}/budget-status", get(teams::budget_status))
        .route("/teams/{id}/expenses", get(teams::team_expenses))
        .route("/teams/{id}/recompute", post(teams::recompute))
        .route("/teams/{id}/insights", get(insights::team_insights))
        .route("/teams/{id}/forecast", get(insights::team_forecast))
        .with_state(state)
}

pub async fn run(engine: Engine) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
