use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::Text,
    PgConnection,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{split_areas, Project, ProjectStatus, ProjectSummary, UNASSIGNED_PROJECT};
use crate::schema::projects;
use crate::state::AppState;
use crate::utils::dates::parse_date;

use super::{ApiJson, ApiPath};

/// Projects joined with their ledger; projects without entries report zero.
const PROJECT_SUMMARY_SELECT: &str = "\
    SELECT p.id, p.name, p.area, p.start_date, p.target_date, p.status, \
        COALESCE(SUM(CASE WHEN f.entry_type = 'received' THEN f.amount_cents ELSE 0 END), 0)::BIGINT AS total_cents, \
        COALESCE(SUM(CASE WHEN f.entry_type = 'spent' THEN f.amount_cents ELSE 0 END), 0)::BIGINT AS spent_cents \
    FROM projects p \
    LEFT JOIN finance_entries f ON f.project_id = p.id";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "targetDate", default)]
    pub target_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, PartialEq)]
struct ProjectFields {
    name: String,
    area: String,
    start_date: NaiveDate,
    target_date: NaiveDate,
    status: ProjectStatus,
}

impl ProjectRequest {
    fn validate(&self) -> Result<ProjectFields, String> {
        let required = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| format!("{field} is required"))
        };
        let date = |value: &Option<String>, field: &str| {
            let raw = required(value, field)?;
            parse_date(&raw).ok_or_else(|| format!("{field} `{raw}` is not a valid date"))
        };

        let name = required(&self.name, "name")?;
        let area = required(&self.area, "area")?;
        if split_areas(&area).is_empty() {
            return Err("area must name at least one sub-area".to_string());
        }
        let start_date = date(&self.start_date, "startDate")?;
        let target_date = date(&self.target_date, "targetDate")?;
        if target_date < start_date {
            return Err("targetDate must not be before startDate".to_string());
        }
        let status = required(&self.status, "status")?
            .parse::<ProjectStatus>()
            .map_err(|err| err.to_string())?;

        Ok(ProjectFields {
            name,
            area,
            start_date,
            target_date,
            status,
        })
    }
}

pub fn load_project_summaries(conn: &mut PgConnection) -> QueryResult<Vec<ProjectSummary>> {
    diesel::sql_query(format!(
        "{PROJECT_SUMMARY_SELECT} GROUP BY p.id ORDER BY p.name ASC, p.id ASC"
    ))
    .load(conn)
}

pub fn load_project_summary(
    conn: &mut PgConnection,
    project_id: &str,
) -> QueryResult<Option<ProjectSummary>> {
    diesel::sql_query(format!("{PROJECT_SUMMARY_SELECT} WHERE p.id = $1 GROUP BY p.id"))
        .bind::<Text, _>(project_id)
        .get_result(conn)
        .optional()
}

fn summary_or_not_found(conn: &mut PgConnection, project_id: &str) -> AppResult<ProjectSummary> {
    load_project_summary(conn, project_id)?
        .ok_or_else(|| AppError::not_found_with(format!("Project `{project_id}` not found")))
}

pub async fn list_projects(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ProjectSummary>>> {
    let projects = state
        .with_conn(|conn| Ok(load_project_summaries(conn)?))
        .await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<String>,
) -> AppResult<Json<ProjectSummary>> {
    let project = state
        .with_conn(move |conn| summary_or_not_found(conn, &project_id))
        .await?;
    Ok(Json(project))
}

pub async fn create_project(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ProjectRequest>,
) -> AppResult<(StatusCode, Json<ProjectSummary>)> {
    let fields = payload.validate().map_err(AppError::bad_request)?;
    let id = payload
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if id == UNASSIGNED_PROJECT {
        return Err(AppError::bad_request(format!(
            "`{UNASSIGNED_PROJECT}` is reserved and cannot be a project id"
        )));
    }

    let project = Project {
        id,
        name: fields.name,
        area: fields.area,
        start_date: fields.start_date,
        target_date: fields.target_date,
        status: fields.status,
    };

    let summary = state
        .with_conn(move |conn| {
            match diesel::insert_into(projects::table)
                .values(&project)
                .execute(conn)
            {
                Ok(_) => summary_or_not_found(conn, &project.id),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(AppError::conflict("A project with this id already exists."))
                }
                Err(err) => Err(AppError::from(err)),
            }
        })
        .await?;

    tracing::info!(project_id = %summary.id, name = %summary.name, "created project");
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn update_project(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<String>,
    ApiJson(payload): ApiJson<ProjectRequest>,
) -> AppResult<Json<ProjectSummary>> {
    if let Some(body_id) = payload.id.as_deref().map(str::trim) {
        if !body_id.is_empty() && body_id != project_id {
            return Err(AppError::bad_request("project id cannot be changed"));
        }
    }
    let fields = payload.validate().map_err(AppError::bad_request)?;

    let summary = state
        .with_conn(move |conn| {
            let updated = diesel::update(projects::table.find(&project_id))
                .set((
                    projects::name.eq(&fields.name),
                    projects::area.eq(&fields.area),
                    projects::start_date.eq(fields.start_date),
                    projects::target_date.eq(fields.target_date),
                    projects::status.eq(fields.status),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(AppError::not_found_with(format!(
                    "Project `{project_id}` not found"
                )));
            }
            summary_or_not_found(conn, &project_id)
        })
        .await?;
    Ok(Json(summary))
}
