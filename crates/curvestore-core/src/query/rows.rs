use serde::{Deserialize, Serialize};

/// One value of an actual, versioned or derived time series extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    #[serde(rename = "P")]
    pub provider: String,
    #[serde(rename = "C")]
    pub curve: String,
    #[serde(rename = "ID")]
    pub id: i32,
    /// Timestamp as returned by the service, in the query's time zone.
    #[serde(rename = "T")]
    pub time: String,
    #[serde(rename = "D")]
    pub value: Option<f64>,
}
