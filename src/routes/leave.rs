use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    PgConnection,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{LeaveRequest, LeaveStatus};
use crate::schema::leave_requests;
use crate::state::AppState;
use crate::utils::dates::{inclusive_days, parse_date};

use super::{workers::find_worker, ApiJson, ApiPath};

/// Body of `POST /api/leave`. `workerName`, `totalDays` and `status` are
/// accepted for compatibility but always derived on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaveRequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "workerId", default)]
    pub worker_id: Option<Value>,
    #[serde(rename = "workerName", default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
    #[serde(rename = "totalDays", default, skip_serializing_if = "Option::is_none")]
    pub total_days: Option<Value>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

fn parse_worker_id(value: Option<&Value>) -> Result<i32, String> {
    let id = match value {
        None | Some(Value::Null) => return Err("workerId is required".to_string()),
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    id.and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| "workerId must be an integer".to_string())
}

/// Validated leave request minus the worker's name, which comes from storage.
#[derive(Debug, PartialEq)]
struct LeaveDraft {
    id: String,
    worker_id: i32,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
    total_days: i32,
    reason: String,
}

impl LeaveRequestPayload {
    fn into_draft(self) -> Result<LeaveDraft, String> {
        let worker_id = parse_worker_id(self.worker_id.as_ref())?;
        let date = |value: &Option<String>, field: &str| {
            let raw = value
                .as_deref()
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .ok_or_else(|| format!("{field} is required"))?;
            parse_date(raw).ok_or_else(|| format!("{field} `{raw}` is not a valid date"))
        };
        let start_date = date(&self.start_date, "startDate")?;
        let end_date = date(&self.end_date, "endDate")?;
        let total_days = inclusive_days(start_date, end_date)
            .ok_or_else(|| "endDate must not be before startDate".to_string())?;
        let reason = self
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .ok_or_else(|| "reason is required".to_string())?
            .to_string();
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(LeaveDraft {
            id,
            worker_id,
            start_date,
            end_date,
            total_days,
            reason,
        })
    }
}

pub fn load_leave_requests(conn: &mut PgConnection) -> QueryResult<Vec<LeaveRequest>> {
    leave_requests::table
        .select(LeaveRequest::as_select())
        .order((leave_requests::start_date.desc(), leave_requests::id.asc()))
        .load(conn)
}

pub async fn list_leave_requests(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<LeaveRequest>>> {
    let requests = state
        .with_conn(|conn| Ok(load_leave_requests(conn)?))
        .await?;
    Ok(Json(requests))
}

pub async fn create_leave_request(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LeaveRequestPayload>,
) -> AppResult<(StatusCode, Json<LeaveRequest>)> {
    let draft = payload.into_draft().map_err(AppError::bad_request)?;

    let stored = state
        .with_conn(move |conn| insert_leave_request(conn, draft))
        .await?;

    tracing::info!(
        leave_id = %stored.id,
        worker_id = stored.worker_id,
        total_days = stored.total_days,
        "created leave request"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

fn insert_leave_request(conn: &mut PgConnection, draft: LeaveDraft) -> AppResult<LeaveRequest> {
    let worker = find_worker(conn, draft.worker_id)?;
    let request = LeaveRequest {
        id: draft.id,
        worker_id: worker.id,
        worker_name: worker.full_name,
        start_date: draft.start_date,
        end_date: draft.end_date,
        total_days: draft.total_days,
        reason: draft.reason,
        status: LeaveStatus::Pending,
    };

    diesel::insert_into(leave_requests::table)
        .values(&request)
        .returning(LeaveRequest::as_returning())
        .get_result(conn)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::conflict("A leave request with this id already exists.")
            }
            other => AppError::from(other),
        })
}

/// Moves a pending request to a terminal status with one conditional update.
pub fn decide_leave_request(
    conn: &mut PgConnection,
    leave_id: &str,
    next: LeaveStatus,
) -> AppResult<LeaveRequest> {
    if !LeaveStatus::Pending.can_transition_to(next) {
        return Err(AppError::bad_request(format!(
            "status must be {} or {}",
            LeaveStatus::Approved,
            LeaveStatus::Rejected
        )));
    }

    let updated = diesel::update(
        leave_requests::table
            .filter(leave_requests::id.eq(leave_id))
            .filter(leave_requests::status.eq(LeaveStatus::Pending)),
    )
    .set(leave_requests::status.eq(next))
    .returning(LeaveRequest::as_returning())
    .get_result(conn)
    .optional()?;

    if let Some(request) = updated {
        return Ok(request);
    }

    let current = leave_requests::table
        .find(leave_id)
        .select(leave_requests::status)
        .first::<LeaveStatus>(conn)
        .optional()?;
    match current {
        None => Err(AppError::not_found_with("Leave request not found")),
        Some(status) => Err(AppError::bad_request(format!(
            "Leave request is already {status}"
        ))),
    }
}

pub async fn update_leave_status(
    State(state): State<AppState>,
    ApiPath(leave_id): ApiPath<String>,
    ApiJson(payload): ApiJson<LeaveStatusRequest>,
) -> AppResult<Json<LeaveRequest>> {
    let raw = payload
        .status
        .as_deref()
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .ok_or_else(|| AppError::bad_request("status is required"))?;
    let next = raw
        .parse::<LeaveStatus>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let request = state
        .with_conn(move |conn| decide_leave_request(conn, &leave_id, next))
        .await?;
    tracing::info!(leave_id = %request.id, status = %request.status, "decided leave request");
    Ok(Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(body: Value) -> LeaveRequestPayload {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn draft_ignores_client_derived_fields() {
        let draft = payload(json!({
            "workerId": "12",
            "workerName": "Someone Else",
            "startDate": "2024-07-30",
            "endDate": "2024-08-02",
            "totalDays": 99,
            "reason": " Family visit ",
            "status": "Approved"
        }))
        .into_draft()
        .unwrap();

        assert_eq!(draft.worker_id, 12);
        assert_eq!(draft.total_days, 4);
        assert_eq!(draft.reason, "Family visit");
        assert!(Uuid::parse_str(&draft.id).is_ok());
    }

    #[test]
    fn keeps_client_supplied_id() {
        let draft = payload(json!({
            "id": "leave-1",
            "workerId": 3,
            "startDate": "2024-07-01",
            "endDate": "2024-07-01",
            "reason": "Clinic"
        }))
        .into_draft()
        .unwrap();
        assert_eq!(draft.id, "leave-1");
        assert_eq!(draft.total_days, 1);
    }

    #[test]
    fn rejects_reversed_range_and_blank_reason() {
        let reversed = payload(json!({
            "workerId": 3,
            "startDate": "2024-07-02",
            "endDate": "2024-07-01",
            "reason": "Clinic"
        }));
        assert!(reversed.into_draft().is_err());

        let blank = payload(json!({
            "workerId": 3,
            "startDate": "2024-07-01",
            "endDate": "2024-07-02",
            "reason": "   "
        }));
        assert_eq!(blank.into_draft().unwrap_err(), "reason is required");
    }

    #[test]
    fn worker_id_must_be_integral() {
        assert!(parse_worker_id(Some(&json!(1.5))).is_err());
        assert!(parse_worker_id(Some(&json!(true))).is_err());
        assert_eq!(parse_worker_id(Some(&json!(" 8 "))), Ok(8));
    }
}
