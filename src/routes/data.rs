use axum::{extract::State, Json};
use diesel::PgConnection;

use crate::error::AppResult;
use crate::models::Snapshot;
use crate::state::AppState;

use super::{finance, leave, projects, workers};

pub fn load_snapshot(conn: &mut PgConnection) -> AppResult<Snapshot> {
    Ok(Snapshot {
        workers: workers::load_workers(conn)?,
        projects: projects::load_project_summaries(conn)?,
        finance_entries: finance::load_finance_entries(conn)?,
        leave_requests: leave::load_leave_requests(conn)?,
    })
}

pub async fn load_dashboard_data(State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let snapshot = state.with_conn(load_snapshot).await?;
    tracing::debug!(
        workers = snapshot.workers.len(),
        projects = snapshot.projects.len(),
        finance_entries = snapshot.finance_entries.len(),
        leave_requests = snapshot.leave_requests.len(),
        "loaded dashboard snapshot"
    );
    Ok(Json(snapshot))
}
