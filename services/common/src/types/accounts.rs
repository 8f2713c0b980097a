//! Account-level records used by the dashboard

use super::lenient::f64_or_string;
use serde::{Deserialize, Serialize};

/// Envelope around every REST payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ApiResponse<T> {
    /// Payload
    #[serde(default)]
    pub data: T,
}

/// Funds of one trading account
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FundDetails {
    /// Trading account
    pub user_id: String,
    /// Equity margin
    pub margin: Margin,
}

/// Margin breakdown
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    /// Net available margin
    #[serde(deserialize_with = "f64_or_string")]
    pub net: f64,
    /// Utilised margin
    pub utilised: UtilisedMargin,
    /// Available margin
    pub available: AvailableMargin,
}

/// Utilised margin components
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilisedMargin {
    /// Total debits
    #[serde(deserialize_with = "f64_or_string")]
    pub debits: f64,
}

/// Available margin components
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailableMargin {
    /// Collateral from pledged holdings
    #[serde(deserialize_with = "f64_or_string")]
    pub collateral: f64,
}

/// Mutual-fund SIP row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MfSipDetails {
    /// Trading account
    pub user_id: String,
    /// SIP, absent for malformed rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mf_sip: Option<MfSip>,
}

/// SIP fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MfSip {
    /// ACTIVE, PAUSED, ...
    pub status: String,
    /// Amount per instalment
    #[serde(deserialize_with = "f64_or_string")]
    pub instalment_amount: f64,
    /// Date of the last instalment, `YYYY-MM-DD` or RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_instalment: Option<String>,
}

/// IPO row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IpoDetails {
    /// Trading account
    pub user_id: String,
    /// IPO name
    pub name: String,
    /// upcoming, preapply, ongoing, closed
    pub status: String,
}

impl IpoDetails {
    /// Still accepting applications
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "ongoing" | "preapply")
    }
}
