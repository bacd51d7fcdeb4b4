//! Calendar periods and the grouping of lead-time records into them.

use crate::error::{Error, Result};
use crate::model::LeadTimeRecord;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Width of a period bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Weekly,
    Monthly,
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(Error::UnsupportedGranularity(name.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Label of a calendar period.
///
/// Monthly keys read `YYYY-MM`, weekly keys `YYYY-Wnn` with ISO-8601 week
/// numbering. Lexicographic order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    /// Key of the period containing `date`.
    pub fn for_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Monthly => Self(format!("{:04}-{:02}", date.year(), date.month())),
            Granularity::Weekly => {
                let iso_week = week_start(date).iso_week();
                Self(format!("{:04}-W{:02}", iso_week.year(), iso_week.week()))
            }
        }
    }

    /// Parse a key, rejecting anything that is not in canonical form.
    pub fn parse(text: &str, granularity: Granularity) -> Result<Self> {
        let start = period_start(text, granularity)?;
        let key = Self::for_date(start, granularity);
        if key.0 != text {
            return Err(Error::MalformedPeriodKey(text.to_string()));
        }
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lead-time records partitioned by the period of their creation time.
pub type PeriodBucket = BTreeMap<PeriodKey, Vec<LeadTimeRecord>>;

/// Partition `records` by the period containing each record's `created_at`.
pub fn group(records: &[LeadTimeRecord], granularity: Granularity) -> PeriodBucket {
    let mut bucket = PeriodBucket::new();
    for rec in records {
        let key = PeriodKey::for_date(rec.created_at.date(), granularity);
        bucket.entry(key).or_default().push(rec.clone());
    }
    log::debug!(
        "grouped {} records into {} {granularity} periods",
        records.len(),
        bucket.len()
    );
    bucket
}

/// Every period from `first` to `last`, both inclusive.
///
/// Empty when `first` comes after `last`.
pub fn period_range(
    first: &PeriodKey,
    last: &PeriodKey,
    granularity: Granularity,
) -> Result<Vec<PeriodKey>> {
    let first_start = period_start(first.as_str(), granularity)?;
    let last_start = period_start(last.as_str(), granularity)?;

    let mut range = Vec::new();
    let mut current = first_start;
    while current <= last_start {
        range.push(PeriodKey::for_date(current, granularity));
        current = match granularity {
            Granularity::Weekly => current + Duration::weeks(1),
            Granularity::Monthly => next_month(current)?,
        };
    }
    Ok(range)
}

/// Monday of the ISO week labelled `YYYY-Wnn`.
pub fn parse_weekly(key: &str) -> Result<NaiveDate> {
    let malformed = || Error::MalformedPeriodKey(key.to_string());
    let (year, week) = key.split_once("-W").ok_or_else(malformed)?;
    let year: i32 = year.parse().map_err(|_| malformed())?;
    let week: u32 = week.parse().map_err(|_| malformed())?;
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(malformed)
}

/// First day of the month labelled `YYYY-MM`.
pub fn parse_monthly(key: &str) -> Result<NaiveDate> {
    let malformed = || Error::MalformedPeriodKey(key.to_string());
    let (year, month) = key.split_once('-').ok_or_else(malformed)?;
    let year: i32 = year.parse().map_err(|_| malformed())?;
    let month: u32 = month.parse().map_err(|_| malformed())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(malformed)
}

fn period_start(key: &str, granularity: Granularity) -> Result<NaiveDate> {
    match granularity {
        Granularity::Weekly => parse_weekly(key),
        Granularity::Monthly => parse_monthly(key),
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn next_month(date: NaiveDate) -> Result<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Computation(format!("month after {date} is out of range")))
}
