use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, SubsecRound, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    PgConnection,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{
    ArchivedWorker, AttendanceStatus, NewWorker, Project, Worker, UNASSIGNED_PROJECT,
};
use crate::payload::{ProfilePatch, WorkerPatch};
use crate::schema::{archived_workers, projects, workers};
use crate::state::AppState;
use crate::utils::json::NullableValue;

use super::{ApiJson, ApiPath};

pub const DUPLICATE_NUMBER_MESSAGE: &str = "A worker with this assigned number already exists.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignWorkersRequest {
    #[serde(rename = "workerIds", default)]
    pub worker_ids: Option<Vec<i32>>,
    #[serde(rename = "projectId", default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceEntry {
    pub id: i32,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAbsentRequest {
    #[serde(default)]
    pub workers: Option<Vec<AbsenceEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveWorkerRequest {
    #[serde(rename = "archiveReason", default)]
    pub archive_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateResponse {
    pub message: String,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveWorkerResponse {
    pub message: String,
    #[serde(rename = "archivedWorker")]
    pub archived_worker: ArchivedWorker,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = workers)]
struct WorkerChangeset {
    full_name: Option<String>,
    assigned_number: Option<String>,
    trade: Option<Option<String>>,
    birthday: Option<Option<NaiveDate>>,
    wedding_anniversary: Option<Option<NaiveDate>>,
    contact_number: Option<Option<String>>,
    address: Option<Option<String>>,
    marital_status: Option<Option<String>>,
    medical_condition: Option<Option<String>>,
    emergency_contact_person: Option<Option<String>>,
    emergency_contact_number: Option<Option<String>>,
    local_congregation: Option<Option<String>>,
    photo: Option<Option<String>>,
    project_id: Option<String>,
    area: Option<Option<String>>,
    attendance_status: Option<AttendanceStatus>,
    attendance_reason: Option<Option<String>>,
}

impl WorkerChangeset {
    fn with_profile(profile: ProfilePatch) -> Self {
        Self {
            full_name: profile.full_name.into_option(),
            assigned_number: profile.assigned_number.into_option(),
            trade: profile.trade.into_change(),
            birthday: profile.birthday.into_change(),
            wedding_anniversary: profile.wedding_anniversary.into_change(),
            contact_number: profile.contact_number.into_change(),
            address: profile.address.into_change(),
            marital_status: profile.marital_status.into_change(),
            medical_condition: profile.medical_condition.into_change(),
            emergency_contact_person: profile.emergency_contact_person.into_change(),
            emergency_contact_number: profile.emergency_contact_number.into_change(),
            local_congregation: profile.local_congregation.into_change(),
            photo: profile.photo.into_change(),
            ..Default::default()
        }
    }
}

pub async fn list_workers(State(state): State<AppState>) -> AppResult<Json<Vec<Worker>>> {
    let workers = state.with_conn(|conn| Ok(load_workers(conn)?)).await?;
    Ok(Json(workers))
}

pub fn load_workers(conn: &mut PgConnection) -> QueryResult<Vec<Worker>> {
    workers::table
        .order((workers::full_name.asc(), workers::id.asc()))
        .select(Worker::as_select())
        .load(conn)
}

pub async fn get_worker(
    State(state): State<AppState>,
    ApiPath(worker_id): ApiPath<i32>,
) -> AppResult<Json<Worker>> {
    let worker = state
        .with_conn(move |conn| find_worker(conn, worker_id))
        .await?;
    Ok(Json(worker))
}

pub(crate) fn find_worker(conn: &mut PgConnection, worker_id: i32) -> AppResult<Worker> {
    workers::table
        .find(worker_id)
        .select(Worker::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("Worker not found"))
}

pub(crate) fn ensure_project_exists(
    conn: &mut PgConnection,
    project_id: &str,
) -> AppResult<Project> {
    projects::table
        .find(project_id)
        .select(Project::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with(format!("Project `{project_id}` not found")))
}

#[derive(Debug, PartialEq)]
struct Placement {
    project_id: String,
    area: Option<String>,
}

/// Works out where a worker ends up after a create or update.
///
/// `None` means neither `projectId` nor `area` was sent. Moving to another
/// project without naming an area drops the old one. An area must be one of
/// the target project's sub-areas, and unassigned workers carry no area.
fn resolve_placement(
    conn: &mut PgConnection,
    current: Option<&Worker>,
    project_id: NullableValue,
    area: NullableValue,
) -> AppResult<Option<Placement>> {
    if project_id.is_omitted() && area.is_omitted() {
        return Ok(None);
    }
    let current_project = current.map_or(UNASSIGNED_PROJECT, |worker| worker.project_id.as_str());
    let target_project = match project_id {
        NullableValue::Omitted => current_project.to_string(),
        NullableValue::Null => UNASSIGNED_PROJECT.to_string(),
        NullableValue::Value(id) => id,
    };
    let project_changed = target_project != current_project;
    if !project_changed && area.is_omitted() {
        return Ok(Some(Placement {
            project_id: target_project,
            area: current.and_then(|worker| worker.area.clone()),
        }));
    }

    let target_area = match area {
        NullableValue::Omitted if project_changed => None,
        NullableValue::Omitted => current.and_then(|worker| worker.area.clone()),
        NullableValue::Null => None,
        NullableValue::Value(area) => Some(area),
    };

    if target_project == UNASSIGNED_PROJECT {
        if let Some(area) = &target_area {
            return Err(AppError::bad_request(format!(
                "area `{area}` requires a project assignment"
            )));
        }
    } else {
        let project = ensure_project_exists(conn, &target_project)?;
        if let Some(area) = &target_area {
            if !project.areas().contains(&area.as_str()) {
                return Err(AppError::bad_request(format!(
                    "area `{area}` is not part of project `{}`",
                    project.name
                )));
            }
        }
    }

    Ok(Some(Placement {
        project_id: target_project,
        area: target_area,
    }))
}

fn map_worker_write_error(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::conflict(DUPLICATE_NUMBER_MESSAGE)
        }
        other => AppError::from(other),
    }
}

pub async fn create_worker(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<(StatusCode, Json<Worker>)> {
    let WorkerPatch {
        profile,
        project_id,
        area,
        attendance_status,
        attendance_reason,
    } = WorkerPatch::from_body(&body).map_err(AppError::bad_request)?;
    let (full_name, assigned_number) = profile.identity().map_err(AppError::bad_request)?;

    let mut new_worker = NewWorker {
        full_name,
        assigned_number,
        trade: profile.trade.into_option(),
        birthday: profile.birthday.into_option(),
        wedding_anniversary: profile.wedding_anniversary.into_option(),
        contact_number: profile.contact_number.into_option(),
        address: profile.address.into_option(),
        marital_status: profile.marital_status.into_option(),
        medical_condition: profile.medical_condition.into_option(),
        emergency_contact_person: profile.emergency_contact_person.into_option(),
        emergency_contact_number: profile.emergency_contact_number.into_option(),
        local_congregation: profile.local_congregation.into_option(),
        photo: profile.photo.into_option(),
        project_id: UNASSIGNED_PROJECT.to_string(),
        area: None,
        attendance_status: attendance_status
            .into_option()
            .unwrap_or(AttendanceStatus::Present),
        attendance_reason: attendance_reason.into_option(),
    };

    let worker = state
        .with_conn(move |conn| {
            if let Some(placement) = resolve_placement(conn, None, project_id, area)? {
                new_worker.project_id = placement.project_id;
                new_worker.area = placement.area;
            }
            diesel::insert_into(workers::table)
                .values(&new_worker)
                .returning(Worker::as_returning())
                .get_result(conn)
                .map_err(map_worker_write_error)
        })
        .await?;

    tracing::info!(
        worker_id = worker.id,
        assigned_number = %worker.assigned_number,
        "registered worker"
    );
    Ok((StatusCode::CREATED, Json(worker)))
}

pub async fn update_worker(
    State(state): State<AppState>,
    ApiPath(worker_id): ApiPath<i32>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Worker>> {
    let patch = WorkerPatch::from_body(&body).map_err(AppError::bad_request)?;
    patch
        .profile
        .ensure_identity_kept()
        .map_err(AppError::bad_request)?;

    let worker = state
        .with_conn(move |conn| apply_worker_patch(conn, worker_id, patch))
        .await?;
    Ok(Json(worker))
}

fn apply_worker_patch(
    conn: &mut PgConnection,
    worker_id: i32,
    patch: WorkerPatch,
) -> AppResult<Worker> {
    let existing = find_worker(conn, worker_id)?;
    if patch.is_empty() {
        return Ok(existing);
    }

    let WorkerPatch {
        profile,
        project_id,
        area,
        attendance_status,
        attendance_reason,
    } = patch;

    // Returning to work clears the absence reason unless one is given.
    let attendance_reason = match (&attendance_status, attendance_reason) {
        (NullableValue::Value(AttendanceStatus::Present), NullableValue::Omitted) => Some(None),
        (_, reason) => reason.into_change(),
    };

    let placement = resolve_placement(conn, Some(&existing), project_id, area)?;
    let changeset = WorkerChangeset {
        project_id: placement.as_ref().map(|placement| placement.project_id.clone()),
        area: placement.map(|placement| placement.area),
        attendance_status: attendance_status.into_option(),
        attendance_reason,
        ..WorkerChangeset::with_profile(profile)
    };

    diesel::update(workers::table.find(worker_id))
        .set(&changeset)
        .returning(Worker::as_returning())
        .get_result(conn)
        .map_err(map_worker_write_error)
}

pub async fn assign_workers(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AssignWorkersRequest>,
) -> AppResult<Json<BatchUpdateResponse>> {
    let invalid = || AppError::bad_request("Invalid data provided for assignment.");

    let mut worker_ids = payload
        .worker_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(invalid)?;
    let project_id = payload
        .project_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(invalid)?;
    let area = payload
        .area
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(invalid)?;

    if project_id == UNASSIGNED_PROJECT {
        return Err(AppError::bad_request(
            "workers are unassigned one at a time through the worker update",
        ));
    }

    worker_ids.sort_unstable();
    worker_ids.dedup();

    let target_area = area.clone();
    let updated = state
        .with_conn(move |conn| {
            let project = ensure_project_exists(conn, &project_id)?;
            if !project.areas().contains(&target_area.as_str()) {
                return Err(AppError::bad_request(format!(
                    "area `{target_area}` is not part of project `{}`",
                    project.name
                )));
            }
            Ok(assign_to_project(conn, &worker_ids, &project.id, &target_area)?)
        })
        .await?;
    tracing::info!(area = %area, updated, "assigned workers");

    Ok(Json(BatchUpdateResponse {
        message: "Workers assigned successfully.".to_string(),
        updated,
    }))
}

/// Moves every listed worker to `project_id`/`area` in one statement.
pub fn assign_to_project(
    conn: &mut PgConnection,
    worker_ids: &[i32],
    project_id: &str,
    area: &str,
) -> QueryResult<usize> {
    diesel::update(workers::table.filter(workers::id.eq_any(worker_ids)))
        .set((
            workers::project_id.eq(project_id),
            workers::area.eq(Some(area)),
        ))
        .execute(conn)
}

pub async fn mark_absent(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<MarkAbsentRequest>,
) -> AppResult<Json<BatchUpdateResponse>> {
    let entries = payload
        .workers
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| AppError::bad_request("Invalid data provided for marking absence."))?;

    let absences = entries
        .into_iter()
        .map(|entry| {
            entry
                .reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty())
                .map(|reason| (entry.id, reason))
                .ok_or_else(|| {
                    AppError::bad_request(format!("a reason is required for worker {}", entry.id))
                })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let updated = state
        .with_conn(move |conn| mark_workers_absent(conn, &absences))
        .await?;
    tracing::info!(updated, "marked workers absent");

    Ok(Json(BatchUpdateResponse {
        message: "Workers marked absent successfully.".to_string(),
        updated,
    }))
}

/// Marks each `(worker id, reason)` absent; any missing worker or failure rolls back the batch.
pub fn mark_workers_absent(
    conn: &mut PgConnection,
    absences: &[(i32, String)],
) -> AppResult<usize> {
    conn.transaction::<usize, AppError, _>(|conn| {
        let mut updated = 0;
        for (worker_id, reason) in absences {
            let rows = diesel::update(workers::table.find(*worker_id))
                .set((
                    workers::attendance_status.eq(AttendanceStatus::Absent),
                    workers::attendance_reason.eq(Some(reason.clone())),
                ))
                .execute(conn)?;
            if rows == 0 {
                return Err(AppError::not_found_with(format!(
                    "Worker {worker_id} not found"
                )));
            }
            updated += rows;
        }
        Ok(updated)
    })
}

pub async fn archive_worker(
    State(state): State<AppState>,
    ApiPath(worker_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ArchiveWorkerRequest>,
) -> AppResult<Json<ArchiveWorkerResponse>> {
    let reason = payload
        .archive_reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
        .ok_or_else(|| AppError::bad_request("archiveReason is required"))?;

    let archived_worker = state
        .with_conn(move |conn| move_to_archive(conn, worker_id, &reason))
        .await?;
    tracing::info!(
        worker_id,
        reason = %archived_worker.archive_reason,
        "archived worker"
    );

    Ok(Json(ArchiveWorkerResponse {
        message: "Worker archived successfully".to_string(),
        archived_worker,
    }))
}

/// Copies the worker's archive projection and deletes the worker row atomically.
pub fn move_to_archive(
    conn: &mut PgConnection,
    worker_id: i32,
    reason: &str,
) -> AppResult<ArchivedWorker> {
    conn.transaction::<ArchivedWorker, AppError, _>(|conn| {
        let worker: Worker = workers::table
            .find(worker_id)
            .select(Worker::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("Worker not found"))?;

        let archived = ArchivedWorker::from_worker(
            &worker,
            reason.to_string(),
            Utc::now().naive_utc().trunc_subsecs(6),
        );

        diesel::insert_into(archived_workers::table)
            .values(&archived)
            .execute(conn)?;

        let deleted = diesel::delete(workers::table.find(worker_id)).execute(conn)?;
        if deleted != 1 {
            return Err(AppError::internal(format!(
                "expected to delete worker {worker_id}, deleted {deleted} rows"
            )));
        }

        Ok(archived)
    })
}

pub async fn list_archived_workers(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ArchivedWorker>>> {
    let archived = state
        .with_conn(|conn| {
            Ok(archived_workers::table
                .order((archived_workers::archived_date.desc(), archived_workers::id.desc()))
                .select(ArchivedWorker::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(archived))
}
