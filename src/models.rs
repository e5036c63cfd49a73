use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::{BigInt, Date, Text};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::*;

/// `projectId` of a worker that is not assigned to any project.
pub const UNASSIGNED_PROJECT: &str = "unassigned";

#[derive(Debug, Error)]
#[error("`{value}` is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed set of values stored as `TEXT` and sent as plain JSON strings.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize, Deserialize,
        )]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(raw.parse()?)
            }
        }
    };
}

text_enum!(AttendanceStatus, "attendance status" {
    Present => "present",
    Absent => "absent",
});

text_enum!(ProjectStatus, "project status" {
    Active => "Active",
    Paused => "Paused",
    Canceled => "Canceled",
});

text_enum!(FinanceEntryType, "finance entry type" {
    Received => "received",
    Spent => "spent",
});

text_enum!(
    /// Pending is the only non-terminal state.
    LeaveStatus, "leave status" {
    Pending => "Pending",
    Approved => "Approved",
    Rejected => "Rejected",
});

impl LeaveStatus {
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = workers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Worker {
    pub id: i32,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "AssignedNumber")]
    pub assigned_number: String,
    #[serde(rename = "Trade")]
    pub trade: Option<String>,
    #[serde(rename = "Birthday")]
    pub birthday: Option<NaiveDate>,
    #[serde(rename = "WeddingAnniversary")]
    pub wedding_anniversary: Option<NaiveDate>,
    #[serde(rename = "ContactNumber")]
    pub contact_number: Option<String>,
    #[serde(rename = "Address")]
    pub address: Option<String>,
    #[serde(rename = "MaritalStatus")]
    pub marital_status: Option<String>,
    #[serde(rename = "MedicalCondition")]
    pub medical_condition: Option<String>,
    #[serde(rename = "EmergencyContactPerson")]
    pub emergency_contact_person: Option<String>,
    #[serde(rename = "EmergencyContactNumber")]
    pub emergency_contact_number: Option<String>,
    #[serde(rename = "LocalCongregation")]
    pub local_congregation: Option<String>,
    #[serde(rename = "Photo")]
    pub photo: Option<String>,
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub area: Option<String>,
    pub attendance_status: AttendanceStatus,
    pub attendance_reason: Option<String>,
}

impl Worker {
    pub fn is_assigned(&self) -> bool {
        self.project_id != UNASSIGNED_PROJECT
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workers)]
pub struct NewWorker {
    pub full_name: String,
    pub assigned_number: String,
    pub trade: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub wedding_anniversary: Option<NaiveDate>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub marital_status: Option<String>,
    pub medical_condition: Option<String>,
    pub emergency_contact_person: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub local_congregation: Option<String>,
    pub photo: Option<String>,
    pub project_id: String,
    pub area: Option<String>,
    pub attendance_status: AttendanceStatus,
    pub attendance_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = archived_workers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ArchivedWorker {
    pub id: i32,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "AssignedNumber")]
    pub assigned_number: String,
    #[serde(rename = "Trade")]
    pub trade: Option<String>,
    #[serde(rename = "archiveReason")]
    pub archive_reason: String,
    #[serde(rename = "archivedDate")]
    pub archived_date: NaiveDateTime,
}

impl ArchivedWorker {
    pub fn from_worker(worker: &Worker, reason: String, archived_date: NaiveDateTime) -> Self {
        Self {
            id: worker.id,
            full_name: worker.full_name.clone(),
            assigned_number: worker.assigned_number.clone(),
            trade: worker.trade.clone(),
            archive_reason: reason,
            archived_date,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Project {
    pub id: String,
    pub name: String,
    pub area: String,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub status: ProjectStatus,
}

/// Splits a comma-separated project area into its trimmed sub-areas.
pub fn split_areas(area: &str) -> Vec<&str> {
    area.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

impl Project {
    pub fn areas(&self) -> Vec<&str> {
        split_areas(&self.area)
    }
}

/// A project row with its fund totals derived from the ledger.
#[derive(Debug, Clone, PartialEq, QueryableByName, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[diesel(sql_type = Text)]
    pub id: String,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub area: String,
    #[diesel(sql_type = Date)]
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[diesel(sql_type = Date)]
    #[serde(rename = "targetDate")]
    pub target_date: NaiveDate,
    #[diesel(sql_type = Text)]
    pub status: ProjectStatus,
    #[diesel(sql_type = BigInt)]
    #[serde(rename = "totalFunds", with = "crate::utils::money")]
    pub total_cents: i64,
    #[diesel(sql_type = BigInt)]
    #[serde(rename = "spentFunds", with = "crate::utils::money")]
    pub spent_cents: i64,
}

impl ProjectSummary {
    pub fn remaining_cents(&self) -> i64 {
        self.total_cents - self.spent_cents
    }

    pub fn areas(&self) -> Vec<&str> {
        split_areas(&self.area)
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = finance_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FinanceEntry {
    pub id: i32,
    #[serde(rename = "type")]
    pub entry_type: FinanceEntryType,
    #[serde(rename = "date")]
    pub entry_date: NaiveDate,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "amount", with = "crate::utils::money")]
    pub amount_cents: i64,
    pub description: Option<String>,
    pub supplier: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = finance_entries)]
pub struct NewFinanceEntry {
    pub entry_type: FinanceEntryType,
    pub entry_date: NaiveDate,
    pub project_id: String,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub supplier: Option<String>,
}

#[derive(
    Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize,
)]
#[diesel(table_name = leave_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LeaveRequest {
    pub id: String,
    #[serde(rename = "workerId")]
    pub worker_id: i32,
    #[serde(rename = "workerName")]
    pub worker_name: String,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate")]
    pub end_date: NaiveDate,
    #[serde(rename = "totalDays")]
    pub total_days: i32,
    pub reason: String,
    pub status: LeaveStatus,
}

/// Everything the dashboard needs on first load (`GET /api/data`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub workers: Vec<Worker>,
    pub projects: Vec<ProjectSummary>,
    pub finance_entries: Vec<FinanceEntry>,
    pub leave_requests: Vec<LeaveRequest>,
}
