use axum::http::HeaderValue;
use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::AppState};

pub mod data;
pub mod finance;
pub mod health;
pub mod leave;
pub mod projects;
pub mod volunteers;
pub mod workers;

/// Photos travel inline as base64 data URLs.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// `Json` whose rejections become `400 {error}` responses.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(AppError::from)?;
        Ok(ApiJson(value))
    }
}

/// `Path` whose rejections become `400 {error}` responses.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(AppError::from)?;
        Ok(ApiPath(value))
    }
}

pub fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    if let Some(origins) = allowed_origins {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = trimmed, "ignoring invalid CORS origin");
                        None
                    }
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    }
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let workers_routes = Router::new()
        .route(
            "/",
            get(workers::list_workers).post(workers::create_worker),
        )
        .route("/assign", post(workers::assign_workers))
        .route("/absent", post(workers::mark_absent))
        .route("/archive", get(workers::list_archived_workers))
        .route("/archive/:id", post(workers::archive_worker))
        .route(
            "/:id",
            get(workers::get_worker).put(workers::update_worker),
        );

    let projects_routes = Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/:id",
            get(projects::get_project).put(projects::update_project),
        );

    let finance_routes = Router::new().route(
        "/",
        get(finance::list_finance_entries).post(finance::create_finance_entry),
    );

    let leave_routes = Router::new()
        .route(
            "/",
            get(leave::list_leave_requests).post(leave::create_leave_request),
        )
        .route("/:id", axum::routing::put(leave::update_leave_status));

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/data", get(data::load_dashboard_data))
        .nest("/api/workers", workers_routes)
        .nest("/api/projects", projects_routes)
        .nest("/api/finance", finance_routes)
        .nest("/api/leave", leave_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
