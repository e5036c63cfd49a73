use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    AttendanceStatus, FinanceEntry, FinanceEntryType, LeaveRequest, LeaveStatus, ProjectSummary,
    Snapshot, Worker,
};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("worker {0} is not loaded")]
    WorkerNotFound(i32),
    #[error("leave request `{0}` is not loaded")]
    LeaveNotFound(String),
    #[error("leave request cannot move from {from} to {to}")]
    InvalidTransition { from: LeaveStatus, to: LeaveStatus },
}

/// Changes to one worker. `None` leaves a field alone; `Some(None)` clears it.
///
/// Serializes to the body `PUT /api/workers/:id` expects, so the same value
/// drives the request and the local patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerUpdate {
    #[serde(rename = "FullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "AssignedNumber", skip_serializing_if = "Option::is_none")]
    pub assigned_number: Option<String>,
    #[serde(rename = "Trade", skip_serializing_if = "Option::is_none")]
    pub trade: Option<Option<String>>,
    #[serde(rename = "Birthday", skip_serializing_if = "Option::is_none")]
    pub birthday: Option<Option<NaiveDate>>,
    #[serde(rename = "WeddingAnniversary", skip_serializing_if = "Option::is_none")]
    pub wedding_anniversary: Option<Option<NaiveDate>>,
    #[serde(rename = "ContactNumber", skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<Option<String>>,
    #[serde(rename = "Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(rename = "MaritalStatus", skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<Option<String>>,
    #[serde(rename = "MedicalCondition", skip_serializing_if = "Option::is_none")]
    pub medical_condition: Option<Option<String>>,
    #[serde(rename = "EmergencyContactPerson", skip_serializing_if = "Option::is_none")]
    pub emergency_contact_person: Option<Option<String>>,
    #[serde(rename = "EmergencyContactNumber", skip_serializing_if = "Option::is_none")]
    pub emergency_contact_number: Option<Option<String>>,
    #[serde(rename = "LocalCongregation", skip_serializing_if = "Option::is_none")]
    pub local_congregation: Option<Option<String>>,
    #[serde(rename = "Photo", skip_serializing_if = "Option::is_none")]
    pub photo: Option<Option<String>>,
    #[serde(rename = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_status: Option<AttendanceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_reason: Option<Option<String>>,
}

impl WorkerUpdate {
    /// Body for registering a new worker.
    pub fn new_worker(full_name: impl Into<String>, assigned_number: impl Into<String>) -> Self {
        Self {
            full_name: Some(full_name.into()),
            assigned_number: Some(assigned_number.into()),
            ..Default::default()
        }
    }

    pub fn attendance(status: AttendanceStatus, reason: Option<String>) -> Self {
        Self {
            attendance_status: Some(status),
            attendance_reason: reason.map(Some),
            ..Default::default()
        }
    }

    fn apply_to(&self, worker: &mut Worker) {
        fn set<T: Clone>(slot: &mut T, change: &Option<T>) {
            if let Some(value) = change {
                *slot = value.clone();
            }
        }

        set(&mut worker.full_name, &self.full_name);
        set(&mut worker.assigned_number, &self.assigned_number);
        set(&mut worker.trade, &self.trade);
        set(&mut worker.birthday, &self.birthday);
        set(&mut worker.wedding_anniversary, &self.wedding_anniversary);
        set(&mut worker.contact_number, &self.contact_number);
        set(&mut worker.address, &self.address);
        set(&mut worker.marital_status, &self.marital_status);
        set(&mut worker.medical_condition, &self.medical_condition);
        set(&mut worker.emergency_contact_person, &self.emergency_contact_person);
        set(&mut worker.emergency_contact_number, &self.emergency_contact_number);
        set(&mut worker.local_congregation, &self.local_congregation);
        set(&mut worker.photo, &self.photo);
        set(&mut worker.project_id, &self.project_id);
        set(&mut worker.area, &self.area);
        set(&mut worker.attendance_status, &self.attendance_status);
        match (self.attendance_status, &self.attendance_reason) {
            (Some(AttendanceStatus::Present), None) => worker.attendance_reason = None,
            (_, reason) => set(&mut worker.attendance_reason, reason),
        }
    }
}

/// Client-side copy of the dashboard collections.
///
/// Loaded wholesale from a [`Snapshot`] and then kept in step with the server
/// by applying the result of each successful API call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStore {
    workers: Vec<Worker>,
    projects: Vec<ProjectSummary>,
    finance_entries: Vec<FinanceEntry>,
    leave_requests: Vec<LeaveRequest>,
}

impl From<Snapshot> for DashboardStore {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            workers: snapshot.workers,
            projects: snapshot.projects,
            finance_entries: snapshot.finance_entries,
            leave_requests: snapshot.leave_requests,
        }
    }
}

impl DashboardStore {
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn projects(&self) -> &[ProjectSummary] {
        &self.projects
    }

    pub fn finance_entries(&self) -> &[FinanceEntry] {
        &self.finance_entries
    }

    pub fn leave_requests(&self) -> &[LeaveRequest] {
        &self.leave_requests
    }

    pub fn worker(&self, worker_id: i32) -> Option<&Worker> {
        self.workers.iter().find(|worker| worker.id == worker_id)
    }

    pub fn project(&self, project_id: &str) -> Option<&ProjectSummary> {
        self.projects.iter().find(|project| project.id == project_id)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            workers: self.workers.clone(),
            projects: self.projects.clone(),
            finance_entries: self.finance_entries.clone(),
            leave_requests: self.leave_requests.clone(),
        }
    }

    fn worker_mut(&mut self, worker_id: i32) -> Result<&mut Worker, StoreError> {
        self.workers
            .iter_mut()
            .find(|worker| worker.id == worker_id)
            .ok_or(StoreError::WorkerNotFound(worker_id))
    }

    fn sort_workers(&mut self) {
        self.workers
            .sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
    }

    pub fn insert_worker(&mut self, worker: Worker) {
        self.workers.retain(|existing| existing.id != worker.id);
        self.workers.push(worker);
        self.sort_workers();
    }

    /// Swaps in the server's copy of a worker; returns `false` if it was not loaded.
    pub fn replace_worker(&mut self, worker: Worker) -> bool {
        match self.workers.iter_mut().find(|existing| existing.id == worker.id) {
            Some(slot) => {
                *slot = worker;
                self.sort_workers();
                true
            }
            None => false,
        }
    }

    pub fn apply_worker_update(
        &mut self,
        worker_id: i32,
        update: &WorkerUpdate,
    ) -> Result<&Worker, StoreError> {
        update.apply_to(self.worker_mut(worker_id)?);
        self.sort_workers();
        self.worker(worker_id)
            .ok_or(StoreError::WorkerNotFound(worker_id))
    }

    /// Mirrors `POST /api/workers/assign`; returns how many loaded workers moved.
    pub fn assign_workers(&mut self, worker_ids: &[i32], project_id: &str, area: &str) -> usize {
        let mut moved = 0;
        for worker in self
            .workers
            .iter_mut()
            .filter(|worker| worker_ids.contains(&worker.id))
        {
            worker.project_id = project_id.to_string();
            worker.area = Some(area.to_string());
            moved += 1;
        }
        moved
    }

    /// Applies a batch absence; all-or-nothing like the server.
    pub fn mark_absent(&mut self, absences: &[(i32, String)]) -> Result<usize, StoreError> {
        if let Some((missing, _)) = absences.iter().find(|(id, _)| self.worker(*id).is_none()) {
            return Err(StoreError::WorkerNotFound(*missing));
        }
        for (worker_id, reason) in absences {
            let worker = self.worker_mut(*worker_id)?;
            worker.attendance_status = AttendanceStatus::Absent;
            worker.attendance_reason = Some(reason.clone());
        }
        Ok(absences.len())
    }

    pub fn remove_worker(&mut self, worker_id: i32) -> Option<Worker> {
        let index = self.workers.iter().position(|worker| worker.id == worker_id)?;
        Some(self.workers.remove(index))
    }

    fn sort_projects(&mut self) {
        self.projects
            .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    }

    pub fn insert_project(&mut self, project: ProjectSummary) {
        self.projects.retain(|existing| existing.id != project.id);
        self.projects.push(project);
        self.sort_projects();
    }

    pub fn replace_project(&mut self, project: ProjectSummary) -> bool {
        match self.projects.iter_mut().find(|existing| existing.id == project.id) {
            Some(slot) => {
                *slot = project;
                self.sort_projects();
                true
            }
            None => false,
        }
    }

    /// Replaces the project list, e.g. after re-reading derived fund totals.
    pub fn replace_projects(&mut self, projects: Vec<ProjectSummary>) {
        self.projects = projects;
        self.sort_projects();
    }

    /// Records a new ledger entry and adjusts the owning project's totals.
    pub fn push_finance_entry(&mut self, entry: FinanceEntry) {
        if let Some(project) = self
            .projects
            .iter_mut()
            .find(|project| project.id == entry.project_id)
        {
            match entry.entry_type {
                FinanceEntryType::Received => project.total_cents += entry.amount_cents,
                FinanceEntryType::Spent => project.spent_cents += entry.amount_cents,
            }
        }
        let position = self
            .finance_entries
            .iter()
            .position(|existing| {
                (existing.entry_date, existing.id) < (entry.entry_date, entry.id)
            })
            .unwrap_or(self.finance_entries.len());
        self.finance_entries.insert(position, entry);
    }

    pub fn insert_leave_request(&mut self, request: LeaveRequest) {
        self.leave_requests.retain(|existing| existing.id != request.id);
        let position = self
            .leave_requests
            .iter()
            .position(|existing| existing.start_date < request.start_date)
            .unwrap_or(self.leave_requests.len());
        self.leave_requests.insert(position, request);
    }

    pub fn set_leave_status(&mut self, leave_id: &str, status: LeaveStatus) -> Result<(), StoreError> {
        let request = self
            .leave_requests
            .iter_mut()
            .find(|request| request.id == leave_id)
            .ok_or_else(|| StoreError::LeaveNotFound(leave_id.to_string()))?;
        if !request.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: request.status,
                to: status,
            });
        }
        request.status = status;
        Ok(())
    }
}
