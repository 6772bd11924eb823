use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::services::AdmsStats;

/// Query string of an ADMS request. Firmware versions disagree on the case
/// of the serial parameter and some repeat parameters, so it is built from
/// raw pairs with the first value of each key winning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdmsQuery {
    pub serial: Option<String>,
    pub table: Option<String>,
}

impl AdmsQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = AdmsQuery::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "SN" | "sn" => &mut query.serial,
                "table" => &mut query.table,
                _ => continue,
            };
            let value = value.trim();
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.to_owned());
            }
        }
        query
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }
}

#[derive(Debug, Serialize)]
pub struct AdmsStatsResponse {
    pub success: bool,
    pub stats: AdmsStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchListQuery {
    pub device_id: Option<i32>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// Falls back to the server's `clear_after_pull` setting.
    pub clear_after: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetTimeRequest {
    /// Target instant; the server clock when absent.
    pub datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTimeResponse {
    /// Local time written to the terminal.
    pub device_time: NaiveDateTime,
    pub target_utc: DateTime<Utc>,
}
