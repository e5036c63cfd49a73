//! Allowlisted request payloads for worker-shaped records.
//!
//! Bodies arrive as loose JSON objects; every key is matched against an
//! explicit list, blank strings are treated as null, and values are typed
//! before anything reaches the database or the volunteer file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::models::AttendanceStatus;
use crate::utils::json::{
    classify_nullable, classify_nullable_date, reject_unknown_fields, NullableValue,
};

pub const PROFILE_FIELDS: &[&str] = &[
    "FullName",
    "AssignedNumber",
    "Trade",
    "Birthday",
    "WeddingAnniversary",
    "ContactNumber",
    "Address",
    "MaritalStatus",
    "MedicalCondition",
    "EmergencyContactPerson",
    "EmergencyContactNumber",
    "LocalCongregation",
    "Photo",
];

pub const ASSIGNMENT_FIELDS: &[&str] = &[
    "projectId",
    "area",
    "attendance_status",
    "attendance_reason",
];

/// Keys that are accepted but never written.
pub const IGNORED_FIELDS: &[&str] = &["id"];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfilePatch {
    pub full_name: NullableValue,
    pub assigned_number: NullableValue,
    pub trade: NullableValue,
    pub birthday: NullableValue<NaiveDate>,
    pub wedding_anniversary: NullableValue<NaiveDate>,
    pub contact_number: NullableValue,
    pub address: NullableValue,
    pub marital_status: NullableValue,
    pub medical_condition: NullableValue,
    pub emergency_contact_person: NullableValue,
    pub emergency_contact_number: NullableValue,
    pub local_congregation: NullableValue,
    pub photo: NullableValue,
}

impl ProfilePatch {
    /// Reads profile keys from `body`; keys outside the profile are left for the caller.
    pub fn read(body: &Map<String, Value>) -> Result<Self, String> {
        let text = |key: &str| {
            classify_nullable(body.get(key)).map_err(|err| format!("{key}: {err}"))
        };
        let date = |key: &str| {
            classify_nullable_date(body.get(key)).map_err(|err| format!("{key}: {err}"))
        };

        let photo = text("Photo")?;
        if let NullableValue::Value(data_url) = &photo {
            validate_photo(data_url)?;
        }

        Ok(Self {
            full_name: text("FullName")?,
            assigned_number: text("AssignedNumber")?,
            trade: text("Trade")?,
            birthday: date("Birthday")?,
            wedding_anniversary: date("WeddingAnniversary")?,
            contact_number: text("ContactNumber")?,
            address: text("Address")?,
            marital_status: text("MaritalStatus")?,
            medical_condition: text("MedicalCondition")?,
            emergency_contact_person: text("EmergencyContactPerson")?,
            emergency_contact_number: text("EmergencyContactNumber")?,
            local_congregation: text("LocalCongregation")?,
            photo,
        })
    }

    /// `FullName` and `AssignedNumber` for a new record.
    pub fn identity(&self) -> Result<(String, String), String> {
        match (&self.full_name, &self.assigned_number) {
            (NullableValue::Value(name), NullableValue::Value(number)) => {
                Ok((name.clone(), number.clone()))
            }
            _ => Err("FullName and AssignedNumber are required".to_string()),
        }
    }

    /// Updates may change the identity fields but never clear them.
    pub fn ensure_identity_kept(&self) -> Result<(), String> {
        if matches!(self.full_name, NullableValue::Null) {
            return Err("FullName cannot be cleared".to_string());
        }
        if matches!(self.assigned_number, NullableValue::Null) {
            return Err("AssignedNumber cannot be cleared".to_string());
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == ProfilePatch::default()
    }
}

/// A worker create/update body: profile plus assignment and attendance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkerPatch {
    pub profile: ProfilePatch,
    pub project_id: NullableValue,
    pub area: NullableValue,
    pub attendance_status: NullableValue<AttendanceStatus>,
    pub attendance_reason: NullableValue,
}

impl WorkerPatch {
    pub fn from_body(body: &Value) -> Result<Self, String> {
        let body = body
            .as_object()
            .ok_or_else(|| "request body must be a JSON object".to_string())?;
        reject_unknown_fields(body, &[PROFILE_FIELDS, ASSIGNMENT_FIELDS, IGNORED_FIELDS])?;

        let profile = ProfilePatch::read(body)?;
        let project_id = classify_nullable(body.get("projectId"))
            .map_err(|err| format!("projectId: {err}"))?;
        let area =
            classify_nullable(body.get("area")).map_err(|err| format!("area: {err}"))?;
        let attendance_status = match classify_nullable(body.get("attendance_status"))
            .map_err(|err| format!("attendance_status: {err}"))?
        {
            NullableValue::Omitted => NullableValue::Omitted,
            NullableValue::Null => {
                return Err("attendance_status must be `present` or `absent`".to_string())
            }
            NullableValue::Value(raw) => {
                NullableValue::Value(raw.parse::<AttendanceStatus>().map_err(|err| err.to_string())?)
            }
        };
        let attendance_reason = classify_nullable(body.get("attendance_reason"))
            .map_err(|err| format!("attendance_reason: {err}"))?;

        Ok(Self {
            profile,
            project_id,
            area,
            attendance_status,
            attendance_reason,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == WorkerPatch::default()
    }
}

/// Profile keys only; used by the volunteer file store.
pub fn profile_from_body(body: &Value) -> Result<ProfilePatch, String> {
    let body = body
        .as_object()
        .ok_or_else(|| "request body must be a JSON object".to_string())?;
    reject_unknown_fields(body, &[PROFILE_FIELDS, IGNORED_FIELDS])?;
    ProfilePatch::read(body)
}

/// Photos are stored inline as `data:image/<kind>;base64,<payload>` URLs.
pub fn validate_photo(data_url: &str) -> Result<(), String> {
    let rest = data_url
        .strip_prefix("data:image/")
        .ok_or_else(|| "Photo must be an image data URL".to_string())?;
    let (media, payload) = rest
        .split_once(',')
        .ok_or_else(|| "Photo data URL has no payload".to_string())?;
    if !media.ends_with(";base64") {
        return Err("Photo data URL must be base64 encoded".to_string());
    }
    BASE64
        .decode(payload)
        .map_err(|err| format!("Photo payload is not valid base64: {err}"))?;
    Ok(())
}
