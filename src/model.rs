//! Pull-request data types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp as supplied by the input collaborator.
///
/// Either text in one of the accepted shapes (see [`crate::lead_time::parse_timestamp`])
/// or an already parsed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    Parsed(NaiveDateTime),
}

impl From<&str> for RawTimestamp {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<NaiveDateTime> for RawTimestamp {
    fn from(time: NaiveDateTime) -> Self {
        Self::Parsed(time)
    }
}

/// Pull request as read from the store.
///
/// Every field is optional; required fields are checked once by
/// [`crate::lead_time::LeadTimeCalculator`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPullRequest {
    pub id: Option<i64>,
    pub number: Option<i64>,
    pub title: Option<String>,
    pub user_login: Option<String>,

    pub created_at: Option<RawTimestamp>,
    pub merged_at: Option<RawTimestamp>,
    pub closed_at: Option<RawTimestamp>,

    /// `open` or `closed`.
    pub state: Option<String>,
    pub url: Option<String>,
    pub repository_id: Option<i64>,
}

/// How the lead time of a pull request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndType {
    Merged,
    Closed,
    /// Still open, measured up to the clock reading at computation time.
    Open,
}

/// Lead time of a single pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeRecord {
    pub pr_id: i64,
    pub pr_number: i64,
    pub title: String,
    pub author: String,
    pub repository_id: Option<i64>,

    pub created_at: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub end_type: EndType,

    /// Hours from creation to end, rounded to 2 decimals.
    pub lead_time_hours: f64,
    /// `lead_time_hours / 24`, rounded to 2 decimals.
    pub lead_time_days: f64,

    pub state: String,
    pub url: String,
}
