use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::payload::profile_from_body;
use crate::volunteers::{self, Volunteer, VolunteerStore, VolunteerStoreError};

use super::{cors_layer, health, ApiJson, ApiPath, MAX_BODY_BYTES};

#[derive(Clone)]
pub struct VolunteerState {
    pub store: Arc<dyn VolunteerStore>,
}

impl VolunteerState {
    pub fn new(store: Arc<dyn VolunteerStore>) -> Self {
        Self { store }
    }
}

impl From<VolunteerStoreError> for AppError {
    fn from(err: VolunteerStoreError) -> Self {
        match err {
            VolunteerStoreError::Invalid(message) => AppError::bad_request(message),
            VolunteerStoreError::NotFound => AppError::not_found_with(err.to_string()),
            VolunteerStoreError::DuplicateNumber => AppError::conflict(err.to_string()),
            other => AppError::internal(other),
        }
    }
}

pub fn create_volunteer_router(state: VolunteerState, cors_origins: Option<&str>) -> Router<()> {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route(
            "/api/volunteers",
            get(list_volunteers).post(create_volunteer),
        )
        .route(
            "/api/volunteers/:id",
            get(get_volunteer)
                .put(update_volunteer)
                .delete(delete_volunteer),
        )
        .with_state(state)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
}

async fn list_volunteers(State(state): State<VolunteerState>) -> AppResult<Json<Vec<Volunteer>>> {
    Ok(Json(volunteers::list_volunteers(state.store.as_ref()).await?))
}

async fn get_volunteer(
    State(state): State<VolunteerState>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Volunteer>> {
    Ok(Json(volunteers::get_volunteer(state.store.as_ref(), &id).await?))
}

async fn create_volunteer(
    State(state): State<VolunteerState>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<(StatusCode, Json<Volunteer>)> {
    let profile = profile_from_body(&body).map_err(AppError::bad_request)?;
    let volunteer = volunteers::create_volunteer(state.store.as_ref(), profile).await?;
    tracing::info!(volunteer_id = %volunteer.id, "created volunteer");
    Ok((StatusCode::CREATED, Json(volunteer)))
}

async fn update_volunteer(
    State(state): State<VolunteerState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Volunteer>> {
    let profile = profile_from_body(&body).map_err(AppError::bad_request)?;
    Ok(Json(
        volunteers::update_volunteer(state.store.as_ref(), &id, profile).await?,
    ))
}

async fn delete_volunteer(
    State(state): State<VolunteerState>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<StatusCode> {
    volunteers::delete_volunteer(state.store.as_ref(), &id).await?;
    tracing::info!(volunteer_id = %id, "deleted volunteer");
    Ok(StatusCode::NO_CONTENT)
}
