//! Typed HTTP access to the dashboard API.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::{
    ArchivedWorker, FinanceEntry, LeaveRequest, LeaveStatus, ProjectSummary, Snapshot, Worker,
};
use crate::routes::finance::FinanceEntryRequest;
use crate::routes::leave::{LeaveRequestPayload, LeaveStatusRequest};
use crate::routes::projects::ProjectRequest;
use crate::routes::workers::{
    AbsenceEntry, ArchiveWorkerRequest, ArchiveWorkerResponse, AssignWorkersRequest,
    BatchUpdateResponse, MarkAbsentRequest,
};

use super::store::WorkerUpdate;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server responded {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),
    #[error("API url `{0}` cannot carry a path")]
    CannotBeABase(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(err) => err.status(),
            ClientError::Url(_) | ClientError::CannotBeABase(_) => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://localhost:3004`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::CannotBeABase(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    /// Appends percent-encoded `segments` to the base url.
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, path: &[&str]) -> ClientResult<RequestBuilder> {
        Ok(self.client.request(method, self.endpoint(path)?))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> ClientResult<T> {
        self.send(self.request(Method::GET, path)?).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.request(Method::POST, path)?.json(body)).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.request(Method::PUT, path)?.json(body)).await
    }

    pub async fn health(&self) -> ClientResult<HealthStatus> {
        self.get(&["api", "health"]).await
    }

    pub async fn load_data(&self) -> ClientResult<Snapshot> {
        self.get(&["api", "data"]).await
    }

    pub async fn list_workers(&self) -> ClientResult<Vec<Worker>> {
        self.get(&["api", "workers"]).await
    }

    pub async fn get_worker(&self, worker_id: i32) -> ClientResult<Worker> {
        let id = worker_id.to_string();
        self.get(&["api", "workers", id.as_str()]).await
    }

    pub async fn create_worker(&self, worker: &WorkerUpdate) -> ClientResult<Worker> {
        self.post(&["api", "workers"], worker).await
    }

    pub async fn update_worker(&self, worker_id: i32, update: &WorkerUpdate) -> ClientResult<Worker> {
        let id = worker_id.to_string();
        self.put(&["api", "workers", id.as_str()], update).await
    }

    pub async fn assign_workers(
        &self,
        worker_ids: &[i32],
        project_id: &str,
        area: &str,
    ) -> ClientResult<BatchUpdateResponse> {
        let body = AssignWorkersRequest {
            worker_ids: Some(worker_ids.to_vec()),
            project_id: Some(project_id.to_string()),
            area: Some(area.to_string()),
        };
        self.post(&["api", "workers", "assign"], &body).await
    }

    pub async fn mark_absent(&self, absences: &[(i32, String)]) -> ClientResult<BatchUpdateResponse> {
        let body = MarkAbsentRequest {
            workers: Some(
                absences
                    .iter()
                    .map(|(id, reason)| AbsenceEntry {
                        id: *id,
                        reason: Some(reason.clone()),
                    })
                    .collect(),
            ),
        };
        self.post(&["api", "workers", "absent"], &body).await
    }

    pub async fn archive_worker(
        &self,
        worker_id: i32,
        reason: &str,
    ) -> ClientResult<ArchiveWorkerResponse> {
        let body = ArchiveWorkerRequest {
            archive_reason: Some(reason.to_string()),
        };
        let id = worker_id.to_string();
        self.post(&["api", "workers", "archive", id.as_str()], &body)
            .await
    }

    pub async fn list_archived_workers(&self) -> ClientResult<Vec<ArchivedWorker>> {
        self.get(&["api", "workers", "archive"]).await
    }

    pub async fn list_projects(&self) -> ClientResult<Vec<ProjectSummary>> {
        self.get(&["api", "projects"]).await
    }

    pub async fn get_project(&self, project_id: &str) -> ClientResult<ProjectSummary> {
        self.get(&["api", "projects", project_id]).await
    }

    pub async fn create_project(&self, project: &ProjectRequest) -> ClientResult<ProjectSummary> {
        self.post(&["api", "projects"], project).await
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        project: &ProjectRequest,
    ) -> ClientResult<ProjectSummary> {
        self.put(&["api", "projects", project_id], project)
            .await
    }

    pub async fn list_finance_entries(&self) -> ClientResult<Vec<FinanceEntry>> {
        self.get(&["api", "finance"]).await
    }

    pub async fn create_finance_entry(
        &self,
        entry: &FinanceEntryRequest,
    ) -> ClientResult<FinanceEntry> {
        self.post(&["api", "finance"], entry).await
    }

    pub async fn list_leave_requests(&self) -> ClientResult<Vec<LeaveRequest>> {
        self.get(&["api", "leave"]).await
    }

    pub async fn create_leave_request(
        &self,
        request: &LeaveRequestPayload,
    ) -> ClientResult<LeaveRequest> {
        self.post(&["api", "leave"], request).await
    }

    pub async fn set_leave_status(
        &self,
        leave_id: &str,
        status: LeaveStatus,
    ) -> ClientResult<LeaveRequest> {
        let body = LeaveStatusRequest {
            status: Some(status.as_str().to_string()),
        };
        self.put(&["api", "leave", leave_id], &body).await
    }
}

/// Turns non-2xx responses into `ClientError::Api`, keeping the server's `{error}` text.
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            }
        });
    tracing::debug!(status = status.as_u16(), error = %message, "API call failed");
    Err(ClientError::Api { status, message })
}
