use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{FinanceEntry, FinanceEntryType, NewFinanceEntry};
use crate::schema::finance_entries;
use crate::state::AppState;
use crate::utils::{dates::parse_date, money::cents_from_amount};

use super::{workers::ensure_project_exists, ApiJson};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinanceEntryRequest {
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(rename = "projectId", default)]
    pub project_id: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_amount(value: Option<&Value>) -> Result<i64, String> {
    let amount = match value {
        None | Some(Value::Null) => return Err("amount is required".to_string()),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .filter(|amount| amount.is_finite())
    .ok_or_else(|| "amount must be a number".to_string())?;

    match cents_from_amount(amount) {
        None => Err("amount is too large".to_string()),
        Some(cents) if cents > 0 => Ok(cents),
        Some(_) => Err("amount must be a positive number".to_string()),
    }
}

impl FinanceEntryRequest {
    fn into_new_entry(self) -> Result<NewFinanceEntry, String> {
        let entry_type = non_blank(&self.entry_type)
            .ok_or_else(|| "type is required".to_string())?
            .parse::<FinanceEntryType>()
            .map_err(|err| err.to_string())?;
        let raw_date = non_blank(&self.date).ok_or_else(|| "date is required".to_string())?;
        let entry_date: NaiveDate = parse_date(&raw_date)
            .ok_or_else(|| format!("date `{raw_date}` is not a valid date"))?;
        let project_id =
            non_blank(&self.project_id).ok_or_else(|| "projectId is required".to_string())?;
        let amount_cents = parse_amount(self.amount.as_ref())?;
        let description = non_blank(&self.description);
        let supplier = non_blank(&self.supplier);

        match entry_type {
            FinanceEntryType::Spent if description.is_none() => {
                return Err("description is required for spent entries".to_string());
            }
            FinanceEntryType::Received if description.is_some() || supplier.is_some() => {
                return Err("received entries cannot carry a description or supplier".to_string());
            }
            _ => {}
        }

        Ok(NewFinanceEntry {
            entry_type,
            entry_date,
            project_id,
            amount_cents,
            description,
            supplier,
        })
    }
}

pub fn load_finance_entries(conn: &mut PgConnection) -> QueryResult<Vec<FinanceEntry>> {
    finance_entries::table
        .select(FinanceEntry::as_select())
        .order((finance_entries::entry_date.desc(), finance_entries::id.desc()))
        .load(conn)
}

pub async fn list_finance_entries(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<FinanceEntry>>> {
    let entries = state
        .with_conn(|conn| Ok(load_finance_entries(conn)?))
        .await?;
    Ok(Json(entries))
}

pub async fn create_finance_entry(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<FinanceEntryRequest>,
) -> AppResult<(StatusCode, Json<FinanceEntry>)> {
    let new_entry = payload.into_new_entry().map_err(AppError::bad_request)?;

    let entry = state
        .with_conn(move |conn| {
            ensure_project_exists(conn, &new_entry.project_id)?;
            Ok(diesel::insert_into(finance_entries::table)
                .values(&new_entry)
                .returning(FinanceEntry::as_returning())
                .get_result(conn)?)
        })
        .await?;

    tracing::info!(
        entry_id = entry.id,
        project_id = %entry.project_id,
        entry_type = %entry.entry_type,
        amount_cents = entry.amount_cents,
        "recorded finance entry"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spent() -> FinanceEntryRequest {
        FinanceEntryRequest {
            entry_type: Some("spent".to_string()),
            date: Some("2024-06-03".to_string()),
            project_id: Some("p-1".to_string()),
            amount: Some(json!(149.999)),
            description: Some("Cement".to_string()),
            supplier: Some(" ".to_string()),
        }
    }

    #[test]
    fn rounds_amount_to_cents() {
        let entry = spent().into_new_entry().unwrap();
        assert_eq!(entry.amount_cents, 15000);
        assert_eq!(entry.supplier, None);
    }

    #[test]
    fn accepts_numeric_strings() {
        assert_eq!(parse_amount(Some(&json!("12.50"))), Ok(1250));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(parse_amount(Some(&json!(0))).is_err());
        assert!(parse_amount(Some(&json!(-5))).is_err());
        assert!(parse_amount(Some(&json!(0.001))).is_err());
        assert!(parse_amount(Some(&json!("abc"))).is_err());
        assert_eq!(parse_amount(None).unwrap_err(), "amount is required");
        assert_eq!(
            parse_amount(Some(&json!(1e14))).unwrap_err(),
            "amount is too large"
        );
    }

    #[test]
    fn spent_needs_description() {
        let mut request = spent();
        request.description = None;
        assert!(request.into_new_entry().is_err());
    }

    #[test]
    fn received_rejects_supplier() {
        let mut request = spent();
        request.entry_type = Some("received".to_string());
        request.description = None;
        request.supplier = Some("Hardware Co".to_string());
        assert!(request.into_new_entry().is_err());

        let mut clean = spent();
        clean.entry_type = Some("received".to_string());
        clean.description = None;
        assert_eq!(
            clean.into_new_entry().unwrap().entry_type,
            FinanceEntryType::Received
        );
    }
}
