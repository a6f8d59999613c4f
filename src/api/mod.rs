//! JSON handlers for forecasts, autocomplete and reverse geocoding

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::ForecastError;
use crate::models::{DataRequest, ForecastBundle, ResolvedLocation, Suggestion};
use crate::pipeline::ForecastService;

type ApiResult<T> = Result<Json<T>, ForecastError>;

#[derive(Debug, Deserialize)]
pub struct AutocompleteParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeParams {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<Suggestion>,
}

impl IntoResponse for ForecastError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "detail": self.user_message() }))).into_response()
    }
}

pub fn router(service: Arc<ForecastService>) -> Router {
    Router::new()
        .route("/data", post(get_data))
        .route("/autocomplete", get(autocomplete))
        .route("/reverse-geocode", get(reverse_geocode))
        .with_state(service)
}

async fn get_data(
    State(service): State<Arc<ForecastService>>,
    payload: Result<Json<DataRequest>, JsonRejection>,
) -> ApiResult<ForecastBundle> {
    let Json(request) =
        payload.map_err(|rejection| ForecastError::invalid_query(rejection.body_text()))?;
    Ok(Json(service.run(&request).await?))
}

async fn autocomplete(
    State(service): State<Arc<ForecastService>>,
    Query(params): Query<AutocompleteParams>,
) -> Json<AutocompleteResponse> {
    let suggestions = match params.q {
        Some(q) => service.autocomplete(&q).await,
        None => Vec::new(),
    };
    Json(AutocompleteResponse { suggestions })
}

async fn reverse_geocode(
    State(service): State<Arc<ForecastService>>,
    params: Result<Query<ReverseGeocodeParams>, QueryRejection>,
) -> ApiResult<ResolvedLocation> {
    let Query(params) =
        params.map_err(|rejection| ForecastError::invalid_query(rejection.body_text()))?;
    Ok(Json(
        service
            .reverse_geocode(params.latitude, params.longitude)
            .await?,
    ))
}
