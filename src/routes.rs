use crate::model::{HealthResponse, ShortenRequest, ShortenResponse, StatsResponse, UrlInfo};
use crate::service::{ShortenError, Shortener};
use crate::utils::{api_error, internal_error, ApiError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

// Every redirect has to reach the server to be counted.
const CACHE_CONTROL_HEADER_VALUE: &str = "no-store";

pub type AppState = Arc<Shortener>;

fn shorten_error(err: ShortenError) -> ApiError {
    match err {
        ShortenError::InvalidUrl | ShortenError::InvalidSlug => {
            api_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        ShortenError::SlugTaken => api_error(StatusCode::CONFLICT, err.to_string()),
        ShortenError::NotFound => api_error(StatusCode::NOT_FOUND, err.to_string()),
        ShortenError::CodeSpaceExhausted(_) | ShortenError::Storage(_) => internal_error(err),
    }
}

pub async fn shorten_url(
    State(shortener): State<AppState>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.body_text()))?;
    let response = shortener
        .shorten(&request.long_url, request.custom_slug.as_deref())
        .map_err(shorten_error)?;
    Ok(Json(response))
}

pub async fn redirect(
    State(shortener): State<AppState>,
    Path(short): Path<String>,
) -> Result<Response, ApiError> {
    let target = shortener.resolve(&short).map_err(shorten_error)?;
    tracing::debug!("Redirecting {} to {}", short, target);
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [
            (header::LOCATION, target),
            (header::CACHE_CONTROL, CACHE_CONTROL_HEADER_VALUE.to_string()),
        ],
    )
        .into_response())
}

pub async fn get_url_info(
    State(shortener): State<AppState>,
    Path(short): Path<String>,
) -> Result<Json<UrlInfo>, ApiError> {
    Ok(Json(shortener.info(&short).map_err(shorten_error)?))
}

// Stats walks the whole `urls` tree, so it runs off the async workers.
pub async fn get_stats(State(shortener): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = tokio::task::spawn_blocking(move || shortener.stats())
        .await
        .map_err(internal_error)?
        .map_err(shorten_error)?;
    Ok(Json(stats))
}

pub async fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Not found")
}

pub async fn method_not_allowed() -> ApiError {
    api_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

pub async fn health(State(shortener): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        base_url: shortener.base_url().to_string(),
    })
}
