use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod expenses;
mod insights;
mod server;
mod teams;

pub mod types {
    pub mod team {
        pub use api_types::team::{
            AlertStatusView, BudgetStatusView, MemberRole, MemberView, RecomputeResponse,
            TeamCreated, TeamListResponse, TeamNew, TeamUpdate, TeamView,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            BulkDecision, BulkDecisionResponse, DecisionView, ExpenseList, ExpenseListResponse,
            ExpenseNew, ExpenseUpdate, ExpenseView, PersonView,
        };
    }

    pub mod insights {
        pub use api_types::insights::{CategoryBreakdownView, TeamForecastView, TeamInsightsView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::TeamNotEmpty(_) => StatusCode::CONFLICT,
        EngineError::WriteConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidInput(_) | EngineError::InvalidTransition(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

// Enum mappings between the wire types and the engine, shared by handlers.

pub(crate) fn map_category(category: api_types::Category) -> engine::Category {
    match category {
        api_types::Category::Travel => engine::Category::Travel,
        api_types::Category::Meals => engine::Category::Meals,
        api_types::Category::OfficeSupplies => engine::Category::OfficeSupplies,
        api_types::Category::Software => engine::Category::Software,
        api_types::Category::Equipment => engine::Category::Equipment,
        api_types::Category::Marketing => engine::Category::Marketing,
        api_types::Category::Utilities => engine::Category::Utilities,
        api_types::Category::Other => engine::Category::Other,
    }
}

pub(crate) fn map_category_view(category: engine::Category) -> api_types::Category {
    match category {
        engine::Category::Travel => api_types::Category::Travel,
        engine::Category::Meals => api_types::Category::Meals,
        engine::Category::OfficeSupplies => api_types::Category::OfficeSupplies,
        engine::Category::Software => api_types::Category::Software,
        engine::Category::Equipment => api_types::Category::Equipment,
        engine::Category::Marketing => api_types::Category::Marketing,
        engine::Category::Utilities => api_types::Category::Utilities,
        engine::Category::Other => api_types::Category::Other,
    }
}

pub(crate) fn map_status(status: api_types::ExpenseStatus) -> engine::ExpenseStatus {
    match status {
        api_types::ExpenseStatus::Pending => engine::ExpenseStatus::Pending,
        api_types::ExpenseStatus::Approved => engine::ExpenseStatus::Approved,
        api_types::ExpenseStatus::Rejected => engine::ExpenseStatus::Rejected,
    }
}

pub(crate) fn map_status_view(status: engine::ExpenseStatus) -> api_types::ExpenseStatus {
    match status {
        engine::ExpenseStatus::Pending => api_types::ExpenseStatus::Pending,
        engine::ExpenseStatus::Approved => api_types::ExpenseStatus::Approved,
        engine::ExpenseStatus::Rejected => api_types::ExpenseStatus::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn team_not_empty_maps_to_409() {
        let res = ServerError::from(EngineError::TeamNotEmpty("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        let res = ServerError::from(EngineError::InvalidInput("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn write_conflict_maps_to_503() {
        let res = ServerError::from(EngineError::WriteConflict("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
