use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// One row of the Data API `/positions` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Position {
    #[serde(rename = "conditionId", default)]
    pub condition_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outcome: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub redeemable: bool,
    #[serde(default, deserialize_with = "decimal_from_str_or_number")]
    pub size: Decimal,
    #[serde(rename = "currentValue", default, deserialize_with = "decimal_from_str_or_number")]
    pub current_value: Decimal,
    #[serde(rename = "negRisk", default, deserialize_with = "null_as_default")]
    pub neg_risk: bool,
    #[serde(default)]
    pub title: Option<String>,
}

impl Position {
    pub fn is_claimable(&self) -> bool {
        self.redeemable && self.size > Decimal::ZERO
    }

    /// Condition id for log lines; empty when the API omitted it.
    pub fn condition_label(&self) -> &str {
        self.condition_id.as_deref().unwrap_or("")
    }
}

/// Explicit `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNumber {
    Str(String),
    Number(serde_json::Number),
}

/// The Data API sends sizes and values either as JSON numbers or as strings.
/// `null` is treated as zero.
fn decimal_from_str_or_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<StrOrNumber>::deserialize(deserializer)? {
        Some(StrOrNumber::Str(s)) => s,
        Some(StrOrNumber::Number(n)) => n.to_string(),
        None => return Ok(Decimal::ZERO),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| serde::de::Error::custom(format!("invalid decimal {:?}: {}", raw, e)))
}

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleSummary {
    /// Nothing was redeemable; the chain was not touched.
    Skipped,
    Completed {
        redeemed: usize,
        failed: usize,
        total_value: Decimal,
    },
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleSummary::Skipped => write!(f, "skipped=true"),
            CycleSummary::Completed {
                redeemed,
                failed,
                total_value,
            } => write!(
                f,
                "redeemed={} failed={} total_value={}",
                redeemed, failed, total_value
            ),
        }
    }
}
