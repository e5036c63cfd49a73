//! File-backed volunteer records served by the `wcm-volunteers` binary.
//!
//! The whole roster lives in one JSON array. Every operation loads it, edits
//! the array in memory and writes it back through a temporary file that is
//! renamed over the original. There is no locking; the last writer wins.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::payload::ProfilePatch;
use crate::utils::json::NullableValue;

#[derive(Debug, Error)]
pub enum VolunteerStoreError {
    #[error("{0}")]
    Invalid(String),
    #[error("Volunteer not found")]
    NotFound,
    #[error("A volunteer with this assigned number already exists.")]
    DuplicateNumber,
    #[error("volunteer file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("volunteer file is not a valid JSON array: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: String,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "AssignedNumber")]
    pub assigned_number: String,
    #[serde(rename = "Trade", default)]
    pub trade: Option<String>,
    #[serde(rename = "Birthday", default)]
    pub birthday: Option<NaiveDate>,
    #[serde(rename = "WeddingAnniversary", default)]
    pub wedding_anniversary: Option<NaiveDate>,
    #[serde(rename = "ContactNumber", default)]
    pub contact_number: Option<String>,
    #[serde(rename = "Address", default)]
    pub address: Option<String>,
    #[serde(rename = "MaritalStatus", default)]
    pub marital_status: Option<String>,
    #[serde(rename = "MedicalCondition", default)]
    pub medical_condition: Option<String>,
    #[serde(rename = "EmergencyContactPerson", default)]
    pub emergency_contact_person: Option<String>,
    #[serde(rename = "EmergencyContactNumber", default)]
    pub emergency_contact_number: Option<String>,
    #[serde(rename = "LocalCongregation", default)]
    pub local_congregation: Option<String>,
    #[serde(rename = "Photo", default)]
    pub photo: Option<String>,
}

fn apply<T>(slot: &mut Option<T>, change: NullableValue<T>) {
    if let Some(value) = change.into_change() {
        *slot = value;
    }
}

impl Volunteer {
    pub fn from_profile(profile: ProfilePatch) -> Result<Self, VolunteerStoreError> {
        let (full_name, assigned_number) =
            profile.identity().map_err(VolunteerStoreError::Invalid)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
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
        })
    }

    pub fn apply_profile(&mut self, profile: ProfilePatch) -> Result<(), VolunteerStoreError> {
        profile
            .ensure_identity_kept()
            .map_err(VolunteerStoreError::Invalid)?;
        if let NullableValue::Value(name) = profile.full_name {
            self.full_name = name;
        }
        if let NullableValue::Value(number) = profile.assigned_number {
            self.assigned_number = number;
        }
        apply(&mut self.trade, profile.trade);
        apply(&mut self.birthday, profile.birthday);
        apply(&mut self.wedding_anniversary, profile.wedding_anniversary);
        apply(&mut self.contact_number, profile.contact_number);
        apply(&mut self.address, profile.address);
        apply(&mut self.marital_status, profile.marital_status);
        apply(&mut self.medical_condition, profile.medical_condition);
        apply(&mut self.emergency_contact_person, profile.emergency_contact_person);
        apply(&mut self.emergency_contact_number, profile.emergency_contact_number);
        apply(&mut self.local_congregation, profile.local_congregation);
        apply(&mut self.photo, profile.photo);
        Ok(())
    }
}

#[async_trait]
pub trait VolunteerStore: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<Volunteer>, VolunteerStoreError>;

    async fn save(&self, volunteers: &[Volunteer]) -> Result<(), VolunteerStoreError>;
}

/// A JSON array on disk. A missing file reads as an empty roster.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[async_trait]
impl VolunteerStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Volunteer>, VolunteerStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, volunteers: &[Volunteer]) -> Result<(), VolunteerStoreError> {
        let bytes = serde_json::to_vec_pretty(volunteers)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))??;
        Ok(())
    }
}

fn ensure_unique_number(
    volunteers: &[Volunteer],
    number: &str,
    except_id: Option<&str>,
) -> Result<(), VolunteerStoreError> {
    let taken = volunteers
        .iter()
        .any(|other| other.assigned_number == number && Some(other.id.as_str()) != except_id);
    if taken {
        return Err(VolunteerStoreError::DuplicateNumber);
    }
    Ok(())
}

pub async fn list_volunteers(
    store: &dyn VolunteerStore,
) -> Result<Vec<Volunteer>, VolunteerStoreError> {
    store.load().await
}

pub async fn get_volunteer(
    store: &dyn VolunteerStore,
    id: &str,
) -> Result<Volunteer, VolunteerStoreError> {
    store
        .load()
        .await?
        .into_iter()
        .find(|volunteer| volunteer.id == id)
        .ok_or(VolunteerStoreError::NotFound)
}

pub async fn create_volunteer(
    store: &dyn VolunteerStore,
    profile: ProfilePatch,
) -> Result<Volunteer, VolunteerStoreError> {
    let volunteer = Volunteer::from_profile(profile)?;
    let mut volunteers = store.load().await?;
    ensure_unique_number(&volunteers, &volunteer.assigned_number, None)?;
    volunteers.push(volunteer.clone());
    store.save(&volunteers).await?;
    Ok(volunteer)
}

pub async fn update_volunteer(
    store: &dyn VolunteerStore,
    id: &str,
    profile: ProfilePatch,
) -> Result<Volunteer, VolunteerStoreError> {
    let mut volunteers = store.load().await?;
    let index = volunteers
        .iter()
        .position(|volunteer| volunteer.id == id)
        .ok_or(VolunteerStoreError::NotFound)?;

    let mut updated = volunteers[index].clone();
    updated.apply_profile(profile)?;
    ensure_unique_number(&volunteers, &updated.assigned_number, Some(id))?;
    volunteers[index] = updated.clone();
    store.save(&volunteers).await?;
    Ok(updated)
}

pub async fn delete_volunteer(
    store: &dyn VolunteerStore,
    id: &str,
) -> Result<(), VolunteerStoreError> {
    let mut volunteers = store.load().await?;
    let before = volunteers.len();
    volunteers.retain(|volunteer| volunteer.id != id);
    if volunteers.len() == before {
        return Err(VolunteerStoreError::NotFound);
    }
    store.save(&volunteers).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::profile_from_body;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonFileStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("volunteers.json"));
        (dir, store)
    }

    fn profile(body: serde_json::Value) -> ProfilePatch {
        profile_from_body(&body).unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_roster() {
        let (_dir, store) = store();
        assert!(list_volunteers(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_persists_to_disk() {
        let (_dir, store) = store();
        let created = create_volunteer(
            &store,
            profile(json!({"FullName": "Ben Reyes", "AssignedNumber": "V-1", "Trade": ""})),
        )
        .await
        .unwrap();
        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.trade, None);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw[0]["AssignedNumber"], "V-1");
        assert_eq!(raw[0]["Trade"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn duplicate_number_is_rejected() {
        let (_dir, store) = store();
        let body = json!({"FullName": "Ben Reyes", "AssignedNumber": "V-1"});
        create_volunteer(&store, profile(body.clone())).await.unwrap();
        let err = create_volunteer(&store, profile(body)).await.unwrap_err();
        assert!(matches!(err, VolunteerStoreError::DuplicateNumber));
        assert_eq!(list_volunteers(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_applies_partial_changes() {
        let (_dir, store) = store();
        let created = create_volunteer(
            &store,
            profile(json!({
                "FullName": "Ben Reyes",
                "AssignedNumber": "V-1",
                "Trade": "Mason",
                "Address": "12 Hill St"
            })),
        )
        .await
        .unwrap();

        let updated = update_volunteer(
            &store,
            &created.id,
            profile(json!({"Trade": "Carpenter", "Address": null})),
        )
        .await
        .unwrap();
        assert_eq!(updated.trade.as_deref(), Some("Carpenter"));
        assert_eq!(updated.address, None);
        assert_eq!(updated.full_name, "Ben Reyes");

        let err = update_volunteer(&store, &created.id, profile(json!({"FullName": ""})))
            .await
            .unwrap_err();
        assert!(matches!(err, VolunteerStoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let (_dir, store) = store();
        let created = create_volunteer(
            &store,
            profile(json!({"FullName": "Ben Reyes", "AssignedNumber": "V-1"})),
        )
        .await
        .unwrap();

        delete_volunteer(&store, &created.id).await.unwrap();
        assert!(matches!(
            delete_volunteer(&store, &created.id).await,
            Err(VolunteerStoreError::NotFound)
        ));
        assert!(matches!(
            get_volunteer(&store, &created.id).await,
            Err(VolunteerStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let (_dir, store) = store();
        std::fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(
            list_volunteers(&store).await,
            Err(VolunteerStoreError::Corrupt(_))
        ));
    }
}
