use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use vidgen_core::Generation;

use crate::input::{self, ValidationError};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    NotFound,
    Store(StoreError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            Self::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message: err.message,
                    field: Some(err.field),
                },
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    message: "Generation not found".to_string(),
                    field: None,
                },
            ),
            Self::Store(err) => {
                tracing::error!(%err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: "internal server error".to_string(),
                        field: None,
                    },
                )
            }
        };
        (code, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/generations",
            get(list_generations).post(create_generation),
        )
        .route("/generations/:id", get(get_generation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_generations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Generation>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn get_generation(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Generation>, ApiError> {
    // A non-numeric id can never match a row.
    let Ok(id) = raw_id.parse::<i32>() else {
        return Err(ApiError::NotFound);
    };
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn create_generation(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Generation>), ApiError> {
    let Json(body) = body.map_err(|rejection| ValidationError {
        field: String::new(),
        message: rejection.body_text(),
    })?;
    let input = input::parse_create(&body)?;

    let generation = state.store.create(input).await?;
    tracing::info!(id = generation.id, "generation created");
    state.simulator.spawn(generation.id);

    Ok((StatusCode::CREATED, Json(generation)))
}
