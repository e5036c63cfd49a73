//! Amounts are stored as integer cents and travel as two-decimal JSON numbers.
//!
//! Use as `#[serde(with = "crate::utils::money")]` on an `i64` cents field.

use serde::{de, Deserialize, Deserializer, Serializer};

/// Largest cent count an `f64` holds exactly (2^53).
const MAX_CENTS: i64 = 9_007_199_254_740_992;

pub fn cents_from_amount(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    let cents = (amount * 100.0).round();
    if cents.abs() > MAX_CENTS as f64 {
        return None;
    }
    Some(cents as i64)
}

pub fn amount_from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn serialize<S>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(amount_from_cents(*cents))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    let amount = match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(value) => value,
        RawAmount::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("`{text}` is not a valid amount")))?,
    };
    cents_from_amount(amount).ok_or_else(|| de::Error::custom("amount is out of range"))
}
