//! Lead-time computation for raw pull requests.

use crate::clock::Clock;
use crate::model::{EndType, LeadTimeRecord, RawPullRequest, RawTimestamp};
use crate::stats::round_to;
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// Why a pull request was left out of a lead-time batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("entry is missing")]
    MissingEntry,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("empty created_at")]
    EmptyCreatedAt,
    #[error("could not parse created_at {0:?}")]
    UnparseableCreatedAt(String),
    #[error("could not determine end time")]
    NoEndTime,
    #[error("ends at {end_time} before it was created at {created_at}")]
    EndsBeforeCreation {
        created_at: NaiveDateTime,
        end_time: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    /// Position of the entry in the input sequence.
    pub index: usize,
    pub number: Option<i64>,
    pub reason: SkipReason,
}

/// Outcome of a lead-time batch: the processable records plus diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadTimeBatch {
    pub records: Vec<LeadTimeRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl LeadTimeBatch {
    pub fn processed_count(&self) -> usize {
        self.records.len()
    }

    pub fn error_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Converts raw pull requests into lead-time records.
pub struct LeadTimeCalculator<C: Clock> {
    clock: C,
}

impl<C: Clock> LeadTimeCalculator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Compute lead times for a batch of pull requests.
    ///
    /// Missing entries and records failing validation are skipped and reported in
    /// [`LeadTimeBatch::skipped`]; the rest of the batch is still processed.
    pub fn calculate(&self, pull_requests: &[Option<RawPullRequest>]) -> LeadTimeBatch {
        let mut batch = LeadTimeBatch::default();
        if pull_requests.is_empty() {
            log::info!("no pull requests provided for lead time calculation");
            return batch;
        }

        for (index, pr) in pull_requests.iter().enumerate() {
            let outcome = match pr {
                Some(pr) => self.calculate_single(pr),
                None => Err(SkipReason::MissingEntry),
            };
            match outcome {
                Ok(record) => batch.records.push(record),
                Err(reason) => {
                    let number = pr.as_ref().and_then(|pr| pr.number);
                    log::warn!("skipping pull request #{number:?} at index {index}: {reason}");
                    batch.skipped.push(SkippedRecord {
                        index,
                        number,
                        reason,
                    });
                }
            }
        }

        log::info!(
            "lead time calculation completed, processed: {}, errors: {}",
            batch.processed_count(),
            batch.error_count()
        );
        batch
    }

    /// Compute the lead time of a single pull request.
    pub fn calculate_single(&self, pr: &RawPullRequest) -> Result<LeadTimeRecord, SkipReason> {
        let pr_id = pr.id.ok_or(SkipReason::MissingField("id"))?;
        let pr_number = pr.number.ok_or(SkipReason::MissingField("number"))?;
        let raw_created_at = pr
            .created_at
            .as_ref()
            .ok_or(SkipReason::MissingField("created_at"))?;
        let state = pr.state.as_ref().ok_or(SkipReason::MissingField("state"))?;

        if let RawTimestamp::Text(text) = raw_created_at {
            if text.trim().is_empty() {
                return Err(SkipReason::EmptyCreatedAt);
            }
        }
        let created_at = resolve_timestamp(raw_created_at).ok_or_else(|| {
            SkipReason::UnparseableCreatedAt(match raw_created_at {
                RawTimestamp::Text(text) => text.clone(),
                RawTimestamp::Parsed(time) => time.to_string(),
            })
        })?;

        let (end_time, end_type) = self
            .resolve_end(pr, state)
            .ok_or(SkipReason::NoEndTime)?;
        if end_type != EndType::Open && end_time < created_at {
            return Err(SkipReason::EndsBeforeCreation {
                created_at,
                end_time,
            });
        }

        let lead_time_secs = (end_time - created_at).num_milliseconds() as f64 / 1000.0;
        let lead_time_hours = lead_time_secs / 3600.0;

        Ok(LeadTimeRecord {
            pr_id,
            pr_number,
            title: pr.title.clone().unwrap_or_default(),
            author: pr.user_login.clone().unwrap_or_default(),
            repository_id: pr.repository_id,
            created_at,
            end_time,
            end_type,
            lead_time_hours: round_to(lead_time_hours, 2),
            lead_time_days: round_to(lead_time_hours / 24.0, 2),
            state: state.clone(),
            url: pr.url.clone().unwrap_or_default(),
        })
    }

    fn resolve_end(&self, pr: &RawPullRequest, state: &str) -> Option<(NaiveDateTime, EndType)> {
        // Merge time wins over close time.
        if let Some(merged_at) = pr.merged_at.as_ref().and_then(resolve_timestamp) {
            return Some((merged_at, EndType::Merged));
        }
        if let Some(closed_at) = pr.closed_at.as_ref().and_then(resolve_timestamp) {
            return Some((closed_at, EndType::Closed));
        }
        if state == "open" {
            return Some((self.clock.now(), EndType::Open));
        }
        None
    }
}

fn resolve_timestamp(raw: &RawTimestamp) -> Option<NaiveDateTime> {
    match raw {
        RawTimestamp::Parsed(time) => Some(*time),
        RawTimestamp::Text(text) => {
            let parsed = parse_timestamp(text);
            if parsed.is_none() && !text.is_empty() {
                log::warn!("could not parse timestamp {text:?}");
            }
            parsed
        }
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` or `YYYY-MM-DD HH:MM:SS[.fff]`.
///
/// Fractional seconds of the second shape are discarded.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() {
        return None;
    }
    if text.contains('T') && text.contains('Z') {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ").ok()
    } else {
        let whole_secs = text.split('.').next().unwrap_or(text);
        NaiveDateTime::parse_from_str(whole_secs, "%Y-%m-%d %H:%M:%S").ok()
    }
}

/// Render a lead time given in hours as minutes, hours or days.
pub fn format_human_readable(hours: f64) -> String {
    if !hours.is_finite() || hours < 0.0 {
        return "Invalid lead time".to_string();
    }
    if hours < 1.0 {
        let minutes = (hours * 60.0) as i64;
        format!("{minutes} minutes")
    } else if hours < 24.0 {
        format!("{hours:.1} hours")
    } else {
        let days = (hours / 24.0).floor() as i64;
        let rem_hours = hours % 24.0;
        if rem_hours < 1.0 {
            format!("{days} days")
        } else {
            format!("{days} days, {rem_hours:.1} hours")
        }
    }
}

/// Lead times in hours, in record order.
pub fn extract_values(records: &[LeadTimeRecord]) -> Vec<f64> {
    records.iter().map(|rec| rec.lead_time_hours).collect()
}
