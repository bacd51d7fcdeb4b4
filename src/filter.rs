use crate::error::{Error, Result};
use crate::model::LeadTimeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const MAX_AUTHOR_LEN: usize = 100;

/// Conditions selecting lead-time records; all given conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordFilter {
    /// First creation date kept (inclusive).
    pub start_date: Option<NaiveDate>,
    /// Last creation date kept (inclusive).
    pub end_date: Option<NaiveDate>,
    pub author: Option<String>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.author.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::InvalidFilter(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }
        if let Some(author) = &self.author {
            if author.trim().is_empty() {
                return Err(Error::InvalidFilter("author must not be blank".to_string()));
            }
            let len = author.chars().count();
            if len > MAX_AUTHOR_LEN {
                return Err(Error::InvalidFilter(format!(
                    "author must be at most {MAX_AUTHOR_LEN} characters, but is {len}"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, rec: &LeadTimeRecord) -> bool {
        let created = rec.created_at.date();
        self.start_date.is_none_or(|start| start <= created)
            && self.end_date.is_none_or(|end| created <= end)
            && self.author.as_ref().is_none_or(|author| &rec.author == author)
    }

    /// Keep the records satisfying every condition.
    pub fn apply(&self, records: &[LeadTimeRecord]) -> Result<Vec<LeadTimeRecord>> {
        self.validate()?;
        let kept: Vec<_> = records.iter().filter(|rec| self.matches(rec)).cloned().collect();
        if kept.is_empty() && !records.is_empty() {
            log::info!("no records match {self:?}");
        }
        Ok(kept)
    }
}
