mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, read_json, TestApp};
use diesel::connection::SimpleConnection;
use serde_json::{json, Value};
use wcm::models::{ArchivedWorker, AttendanceStatus, Worker};

const FAILING_NUMBER: &str = "FAIL-1";

async fn create_worker(app: &TestApp, name: &str, number: &str) -> Result<Worker> {
    let response = app
        .post_json(
            "/api/workers",
            &json!({ "FullName": name, "AssignedNumber": number, "Trade": "Mason" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

async fn create_project(app: &TestApp, id: &str, area: &str) -> Result<()> {
    let response = app
        .post_json(
            "/api/projects",
            &json!({
                "id": id,
                "name": format!("Project {id}"),
                "area": area,
                "startDate": "2024-05-01",
                "targetDate": "2024-12-01",
                "status": "Active"
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

/// Makes every UPDATE or DELETE of the worker numbered `FAIL-1` raise.
async fn install_failing_trigger(app: &TestApp) -> Result<()> {
    app.with_conn(|conn| {
        conn.batch_execute(&format!(
            "CREATE OR REPLACE FUNCTION wcm_fail_worker_write() RETURNS trigger AS $$ \
             BEGIN RAISE EXCEPTION 'injected storage failure'; END; $$ LANGUAGE plpgsql; \
             DROP TRIGGER IF EXISTS fail_worker_write ON workers; \
             CREATE TRIGGER fail_worker_write BEFORE UPDATE OR DELETE ON workers \
             FOR EACH ROW WHEN (OLD.assigned_number = '{FAILING_NUMBER}') \
             EXECUTE FUNCTION wcm_fail_worker_write();"
        ))?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn worker_registration_and_updates() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/workers",
            &json!({
                "id": 999,
                "FullName": "Ana Cruz",
                "AssignedNumber": 104,
                "ContactNumber": "",
                "Birthday": "1990-06-15T00:00:00.000Z"
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let ana: Worker = read_json(response).await?;
    assert_ne!(ana.id, 999);
    assert_eq!(ana.assigned_number, "104");
    assert_eq!(ana.contact_number, None);
    assert_eq!(ana.project_id, "unassigned");
    assert_eq!(ana.attendance_status, AttendanceStatus::Present);

    let unknown = app
        .post_json(
            "/api/workers",
            &json!({ "FullName": "X", "AssignedNumber": "X-1", "is_admin": true }),
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .post_json("/api/workers", &json!({ "FullName": "No Number" }))
        .await?;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let malformed = app.post_raw("/api/workers", "{\"FullName\": ").await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let error: Value = read_json(malformed).await?;
    assert!(error["error"].is_string());

    let updated = app
        .put_json(
            &format!("/api/workers/{}", ana.id),
            &json!({ "Trade": "Carpenter", "Birthday": null }),
        )
        .await?;
    assert_eq!(updated.status(), StatusCode::OK);
    let ana: Worker = read_json(updated).await?;
    assert_eq!(ana.trade.as_deref(), Some("Carpenter"));
    assert_eq!(ana.birthday, None);
    assert_eq!(ana.full_name, "Ana Cruz");

    let cleared = app
        .put_json(&format!("/api/workers/{}", ana.id), &json!({ "FullName": "" }))
        .await?;
    assert_eq!(cleared.status(), StatusCode::BAD_REQUEST);

    let absent = app
        .put_json(
            &format!("/api/workers/{}", ana.id),
            &json!({ "attendance_status": "absent", "attendance_reason": "Fever" }),
        )
        .await?;
    let ana: Worker = read_json(absent).await?;
    assert_eq!(ana.attendance_reason.as_deref(), Some("Fever"));

    let present = app
        .put_json(
            &format!("/api/workers/{}", ana.id),
            &json!({ "attendance_status": "present" }),
        )
        .await?;
    let ana: Worker = read_json(present).await?;
    assert_eq!(ana.attendance_status, AttendanceStatus::Present);
    assert_eq!(ana.attendance_reason, None);

    let not_found = app.put_json("/api/workers/424242", &json!({ "Trade": "X" })).await?;
    assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn duplicate_assigned_number_conflicts() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    create_worker(&app, "Ana Cruz", "A-1").await?;
    let ben = create_worker(&app, "Ben Reyes", "B-1").await?;

    let duplicate = app
        .post_json(
            "/api/workers",
            &json!({ "FullName": "Someone Else", "AssignedNumber": "A-1" }),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body: Value = read_json(duplicate).await?;
    assert_eq!(
        body["error"],
        "A worker with this assigned number already exists."
    );

    let renumber = app
        .put_json(
            &format!("/api/workers/{}", ben.id),
            &json!({ "AssignedNumber": "A-1" }),
        )
        .await?;
    assert_eq!(renumber.status(), StatusCode::CONFLICT);

    let workers: Vec<Worker> = read_json(app.get("/api/workers").await?).await?;
    assert_eq!(workers.len(), 2);
    assert_eq!(workers[0].full_name, "Ana Cruz");

    Ok(())
}

#[tokio::test]
async fn batch_assignment_validates_project_and_area() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    create_project(&app, "chapel", "Roof, Hall").await?;
    let ana = create_worker(&app, "Ana Cruz", "A-1").await?;
    let ben = create_worker(&app, "Ben Reyes", "B-1").await?;

    let empty = app
        .post_json(
            "/api/workers/assign",
            &json!({ "workerIds": [], "projectId": "chapel", "area": "Roof" }),
        )
        .await?;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let unknown_project = app
        .post_json(
            "/api/workers/assign",
            &json!({ "workerIds": [ana.id], "projectId": "nowhere", "area": "Roof" }),
        )
        .await?;
    assert_eq!(unknown_project.status(), StatusCode::NOT_FOUND);

    let wrong_area = app
        .post_json(
            "/api/workers/assign",
            &json!({ "workerIds": [ana.id], "projectId": "chapel", "area": "Basement" }),
        )
        .await?;
    assert_eq!(wrong_area.status(), StatusCode::BAD_REQUEST);

    let assigned = app
        .post_json(
            "/api/workers/assign",
            &json!({ "workerIds": [ana.id, ben.id], "projectId": "chapel", "area": "Hall" }),
        )
        .await?;
    assert_eq!(assigned.status(), StatusCode::OK);
    let body: Value = read_json(assigned).await?;
    assert_eq!(body["updated"], 2);

    let ben: Worker = read_json(app.get(&format!("/api/workers/{}", ben.id)).await?).await?;
    assert_eq!(ben.project_id, "chapel");
    assert_eq!(ben.area.as_deref(), Some("Hall"));

    let unassigned = app
        .put_json(
            &format!("/api/workers/{}", ben.id),
            &json!({ "projectId": null, "area": null }),
        )
        .await?;
    let ben: Worker = read_json(unassigned).await?;
    assert_eq!(ben.project_id, "unassigned");
    assert_eq!(ben.area, None);

    Ok(())
}

#[tokio::test]
async fn batch_absence_rolls_back_on_missing_worker() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let ana = create_worker(&app, "Ana Cruz", "A-1").await?;
    let ben = create_worker(&app, "Ben Reyes", "B-1").await?;

    let blank = app
        .post_json(
            "/api/workers/absent",
            &json!({ "workers": [{ "id": ana.id, "reason": "  " }] }),
        )
        .await?;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let partial = app
        .post_json(
            "/api/workers/absent",
            &json!({ "workers": [
                { "id": ana.id, "reason": "Fever" },
                { "id": 987654, "reason": "Travel" }
            ] }),
        )
        .await?;
    assert_eq!(partial.status(), StatusCode::NOT_FOUND);
    let ana_after: Worker =
        read_json(app.get(&format!("/api/workers/{}", ana.id)).await?).await?;
    assert_eq!(ana_after.attendance_status, AttendanceStatus::Present);

    let ok = app
        .post_json(
            "/api/workers/absent",
            &json!({ "workers": [
                { "id": ana.id, "reason": "Fever" },
                { "id": ben.id, "reason": "Travel" }
            ] }),
        )
        .await?;
    assert_eq!(ok.status(), StatusCode::OK);
    let workers: Vec<Worker> = read_json(app.get("/api/workers").await?).await?;
    assert!(workers
        .iter()
        .all(|worker| worker.attendance_status == AttendanceStatus::Absent));

    Ok(())
}

#[tokio::test]
async fn batch_absence_rolls_back_on_storage_failure() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let ana = create_worker(&app, "Ana Cruz", "A-1").await?;
    let failing = create_worker(&app, "Fay Lopez", FAILING_NUMBER).await?;
    install_failing_trigger(&app).await?;

    let response = app
        .post_json(
            "/api/workers/absent",
            &json!({ "workers": [
                { "id": ana.id, "reason": "Fever" },
                { "id": failing.id, "reason": "Travel" }
            ] }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let ana_after: Worker =
        read_json(app.get(&format!("/api/workers/{}", ana.id)).await?).await?;
    assert_eq!(ana_after.attendance_status, AttendanceStatus::Present);
    assert_eq!(ana_after.attendance_reason, None);

    Ok(())
}

#[tokio::test]
async fn archive_moves_worker_atomically() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let ana = create_worker(&app, "Ana Cruz", "A-1").await?;
    let failing = create_worker(&app, "Fay Lopez", FAILING_NUMBER).await?;

    let blank = app
        .post_json(
            &format!("/api/workers/archive/{}", ana.id),
            &json!({ "archiveReason": "" }),
        )
        .await?;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .post_json(
            "/api/workers/archive/555555",
            &json!({ "archiveReason": "Moved away" }),
        )
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let archived = app
        .post_json(
            &format!("/api/workers/archive/{}", ana.id),
            &json!({ "archiveReason": "Moved away" }),
        )
        .await?;
    assert_eq!(archived.status(), StatusCode::OK);
    let body: Value = read_json(archived).await?;
    assert_eq!(body["archivedWorker"]["FullName"], "Ana Cruz");
    assert_eq!(body["archivedWorker"]["archiveReason"], "Moved away");

    let gone = app.get(&format!("/api/workers/{}", ana.id)).await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    install_failing_trigger(&app).await?;
    let failed = app
        .post_json(
            &format!("/api/workers/archive/{}", failing.id),
            &json!({ "archiveReason": "Retired" }),
        )
        .await?;
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let still_there = app.get(&format!("/api/workers/{}", failing.id)).await?;
    assert_eq!(still_there.status(), StatusCode::OK);

    let archive: Vec<ArchivedWorker> = read_json(app.get("/api/workers/archive").await?).await?;
    assert_eq!(archive.len(), 1);
    assert_eq!(archive[0].id, ana.id);

    Ok(())
}

#[tokio::test]
async fn worker_update_keeps_area_within_project() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    create_project(&app, "chapel", "Roof, Hall").await?;
    create_project(&app, "school", "Gym").await?;
    let ana = create_worker(&app, "Ana Cruz", "A-1").await?;
    let path = format!("/api/workers/{}", ana.id);

    let wrong_area = app
        .put_json(&path, &json!({ "projectId": "chapel", "area": "Basement" }))
        .await?;
    assert_eq!(wrong_area.status(), StatusCode::BAD_REQUEST);

    let area_without_project = app.put_json(&path, &json!({ "area": "Roof" })).await?;
    assert_eq!(area_without_project.status(), StatusCode::BAD_REQUEST);

    let unchanged: Worker = read_json(app.get(&path).await?).await?;
    assert_eq!(unchanged.project_id, "unassigned");
    assert_eq!(unchanged.area, None);

    let placed = app
        .put_json(&path, &json!({ "projectId": "chapel", "area": "Roof" }))
        .await?;
    assert_eq!(placed.status(), StatusCode::OK);
    let ana: Worker = read_json(placed).await?;
    assert_eq!(ana.area.as_deref(), Some("Roof"));

    let other_area = app.put_json(&path, &json!({ "area": "Gym" })).await?;
    assert_eq!(other_area.status(), StatusCode::BAD_REQUEST);

    let moved = app.put_json(&path, &json!({ "projectId": "school" })).await?;
    assert_eq!(moved.status(), StatusCode::OK);
    let ana: Worker = read_json(moved).await?;
    assert_eq!(ana.project_id, "school");
    assert_eq!(ana.area, None);

    let restated = app.put_json(&path, &json!({ "projectId": "school" })).await?;
    assert_eq!(restated.status(), StatusCode::OK);

    let created_with_area = app
        .post_json(
            "/api/workers",
            &json!({ "FullName": "Ben Reyes", "AssignedNumber": "B-1", "area": "Gym" }),
        )
        .await?;
    assert_eq!(created_with_area.status(), StatusCode::BAD_REQUEST);

    let created_in_project = app
        .post_json(
            "/api/workers",
            &json!({
                "FullName": "Ben Reyes",
                "AssignedNumber": "B-1",
                "projectId": "school",
                "area": "Gym"
            }),
        )
        .await?;
    assert_eq!(created_in_project.status(), StatusCode::CREATED);
    let ben: Worker = read_json(created_in_project).await?;
    assert_eq!(ben.area.as_deref(), Some("Gym"));

    Ok(())
}

#[tokio::test]
async fn malformed_worker_id_returns_json_error() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app.get("/api/workers/abc").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await?;
    assert!(body["error"].as_str().is_some_and(|message| message.contains("abc")));

    let archive = app
        .post_json("/api/workers/archive/abc", &json!({ "archiveReason": "Moved" }))
        .await?;
    assert_eq!(archive.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(archive).await?;
    assert!(body["error"].is_string());

    Ok(())
}
