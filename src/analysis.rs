//! Period statistics and lead-time trends.

use crate::error::{Error, Result};
use crate::lead_time::extract_values;
use crate::model::{EndType, LeadTimeRecord};
use crate::period::{Granularity, PeriodBucket, PeriodKey, group, period_range};
use crate::stats::{basic_statistics, compute_mean};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Change rates within this many percent either way count as stable.
const STABLE_BAND_PCT: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodStatistics {
    /// Number of records in the period, usable lead time or not.
    pub count: usize,
    pub average_lead_time_hours: f64,
    pub average_lead_time_days: f64,
    pub total_lead_time_hours: f64,
    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
    pub lead_times: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Lead time dropped by more than the stable band.
    Improving,
    /// Lead time grew by more than the stable band.
    Worsening,
    Stable,
    #[default]
    NoData,
    Error,
}

impl TrendDirection {
    pub fn from_change_rate(change_rate: f64) -> Self {
        if change_rate == 0.0 {
            Self::Stable
        } else if change_rate < -STABLE_BAND_PCT {
            Self::Improving
        } else if change_rate > STABLE_BAND_PCT {
            Self::Worsening
        } else {
            Self::Stable
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendStatistics {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,

    /// Percent change of `average` against `previous_period`.
    pub change_rate: f64,
    pub trend_direction: TrendDirection,
    pub previous_period: Option<PeriodKey>,

    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
    pub lead_times: Vec<f64>,

    /// Trailing mean of `average` per window size; `None` until the window is full.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub moving_averages: BTreeMap<usize, Option<f64>>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_empty_period: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrendStatistics {
    /// Placeholder for a period without any record.
    pub fn empty_period() -> Self {
        Self {
            trend_direction: TrendDirection::NoData,
            is_empty_period: true,
            ..Default::default()
        }
    }

    fn failed(error: String) -> Self {
        Self {
            trend_direction: TrendDirection::Error,
            error: Some(error),
            ..Default::default()
        }
    }

    /// Moving average for `window`, if it was computed and available at this period.
    pub fn moving_average(&self, window: usize) -> Option<f64> {
        self.moving_averages.get(&window).copied().flatten()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendData {
    pub grouped_data: PeriodBucket,
    pub period_statistics: BTreeMap<PeriodKey, PeriodStatistics>,
    pub period_type: Granularity,
    pub total_periods: usize,
    pub total_prs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    #[serde(flatten)]
    pub trend_data: TrendData,
    pub trend_statistics: BTreeMap<PeriodKey, TrendStatistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedTrend {
    #[serde(flatten)]
    pub series: TrendSeries,
    /// Repositories that contributed at least one record.
    pub repository_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RepositorySummary {
    pub total_prs: usize,
    pub average_lead_time: f64,
    pub median_lead_time: f64,
    pub min_lead_time: f64,
    pub max_lead_time: f64,
}

impl RepositorySummary {
    fn from_records(records: &[LeadTimeRecord]) -> Self {
        let stats = basic_statistics(&extract_values(records));
        Self {
            total_prs: stats.count,
            average_lead_time: stats.mean,
            median_lead_time: stats.median,
            min_lead_time: stats.min,
            max_lead_time: stats.max,
        }
    }
}

/// Result of a pipeline step that is isolated from its siblings.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Computed(T),
    Failed { error: String },
}

impl<T> Outcome<T> {
    pub fn computed(&self) -> Option<&T> {
        match self {
            Self::Computed(val) => Some(val),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiRepositoryTrendResult {
    pub combined_trend: Outcome<CombinedTrend>,
    pub individual_trends: BTreeMap<i64, Outcome<TrendSeries>>,
    pub repository_summary: BTreeMap<i64, RepositorySummary>,
}

/// Turns period buckets into statistics and trends.
pub struct TrendAnalyzer {
    windows: Vec<usize>,
}

impl TrendAnalyzer {
    /// Create an analyzer computing moving averages over the given window sizes.
    pub fn new(windows: Vec<usize>) -> Self {
        Self { windows }
    }

    pub fn period_statistics(&self, bucket: &PeriodBucket) -> BTreeMap<PeriodKey, PeriodStatistics> {
        bucket
            .iter()
            .map(|(key, records)| {
                let stats = compute_period_statistics(records).unwrap_or_else(|err| {
                    log::warn!("failed to compute statistics for period {key}: {err}");
                    PeriodStatistics {
                        error: Some(err.to_string()),
                        ..Default::default()
                    }
                });
                (key.clone(), stats)
            })
            .collect()
    }

    pub fn trend_data(&self, records: &[LeadTimeRecord], granularity: Granularity) -> TrendData {
        let grouped_data = group(records, granularity);
        let period_statistics = self.period_statistics(&grouped_data);
        TrendData {
            total_periods: grouped_data.len(),
            total_prs: records.len(),
            grouped_data,
            period_statistics,
            period_type: granularity,
        }
    }

    /// Compute per-period trend statistics.
    ///
    /// Each period is compared with the period preceding it in key order, which
    /// skips calendar gaps; see [`TrendAnalyzer::handle_empty_periods`] for
    /// calendar-adjacent comparisons.
    pub fn trend_statistics(&self, bucket: &PeriodBucket) -> BTreeMap<PeriodKey, TrendStatistics> {
        let mut trend_stats = BTreeMap::new();
        let mut previous: Option<(PeriodKey, f64)> = None;

        for (key, records) in bucket {
            let stats = match compute_trend_entry(records) {
                Ok(mut stats) => {
                    if let Some((prev_key, prev_avg)) = &previous {
                        stats.change_rate = compute_change_rate(*prev_avg, stats.average);
                        stats.previous_period = Some(prev_key.clone());
                    }
                    stats.trend_direction = TrendDirection::from_change_rate(stats.change_rate);
                    stats
                }
                Err(err) => {
                    log::warn!("failed to compute trend for period {key}: {err}");
                    TrendStatistics::failed(err.to_string())
                }
            };
            previous = Some((key.clone(), stats.average));
            trend_stats.insert(key.clone(), stats);
        }

        trend_stats
    }

    /// Add trailing moving averages of the period averages.
    ///
    /// Window sizes of zero or larger than the number of periods are skipped.
    pub fn moving_averages(
        &self,
        mut trend_stats: BTreeMap<PeriodKey, TrendStatistics>,
        window_sizes: &[usize],
    ) -> BTreeMap<PeriodKey, TrendStatistics> {
        let averages: Vec<f64> = trend_stats.values().map(|stats| stats.average).collect();
        let n_periods = averages.len();

        for &window in window_sizes {
            if window == 0 || window > n_periods {
                log::debug!("skipping moving average window {window} for {n_periods} periods");
                continue;
            }
            for (idx, stats) in trend_stats.values_mut().enumerate() {
                let val = (idx + 1 >= window).then(|| compute_mean(&averages[idx + 1 - window..=idx]));
                stats.moving_averages.insert(window, val);
            }
        }

        trend_stats
    }

    /// Insert placeholders for missing periods and compare each period with its
    /// calendar predecessor.
    ///
    /// Needs at least two periods to span a range; otherwise, or when `fill_gaps`
    /// is false, the input is returned unchanged.
    pub fn handle_empty_periods(
        &self,
        trend_stats: BTreeMap<PeriodKey, TrendStatistics>,
        granularity: Granularity,
        fill_gaps: bool,
    ) -> BTreeMap<PeriodKey, TrendStatistics> {
        if !fill_gaps || trend_stats.len() < 2 {
            return trend_stats;
        }
        let (Some(first), Some(last)) = (
            trend_stats.keys().next().cloned(),
            trend_stats.keys().next_back().cloned(),
        ) else {
            return trend_stats;
        };
        let range = match period_range(&first, &last, granularity) {
            Ok(range) => range,
            Err(err) => {
                log::warn!("cannot fill gaps between {first} and {last}: {err}");
                return trend_stats;
            }
        };

        let mut filled = trend_stats;
        let n_original = filled.len();
        for key in range {
            filled.entry(key).or_insert_with(TrendStatistics::empty_period);
        }
        log::debug!("inserted {} empty periods", filled.len() - n_original);

        let mut previous: Option<(PeriodKey, f64)> = None;
        for (key, stats) in filled.iter_mut() {
            if !stats.is_empty_period && stats.error.is_none() {
                if let Some((prev_key, prev_avg)) = &previous {
                    stats.change_rate = compute_change_rate(*prev_avg, stats.average);
                    stats.trend_direction = TrendDirection::from_change_rate(stats.change_rate);
                    stats.previous_period = Some(prev_key.clone());
                }
            }
            previous = Some((key.clone(), stats.average));
        }

        filled
    }

    /// Trend data, trend statistics and moving averages of one record set.
    pub fn trend_series(
        &self,
        records: &[LeadTimeRecord],
        granularity: Granularity,
    ) -> Result<TrendSeries> {
        check_records(records)?;
        let trend_data = self.trend_data(records, granularity);
        let trend_statistics = self.trend_statistics(&trend_data.grouped_data);
        let trend_statistics = self.moving_averages(trend_statistics, &self.windows);
        Ok(TrendSeries {
            trend_data,
            trend_statistics,
        })
    }

    /// Analyze each repository on its own and all repositories together.
    ///
    /// Repositories without records are left out. A failing repository only
    /// marks its own entry as failed, while any failure of the combined series
    /// replaces the whole combined trend.
    pub fn multi_repository_trend_data(
        &self,
        repo_records: &BTreeMap<i64, Vec<LeadTimeRecord>>,
        granularity: Granularity,
    ) -> MultiRepositoryTrendResult {
        let mut individual_trends = BTreeMap::new();
        let mut repository_summary = BTreeMap::new();
        let mut all_records = Vec::new();
        let mut repository_count = 0;

        for (&repo_id, records) in repo_records {
            if records.is_empty() {
                log::debug!("repository {repo_id} has no records");
                continue;
            }
            repository_count += 1;
            all_records.extend_from_slice(records);

            match self.trend_series(records, granularity) {
                Ok(series) => {
                    repository_summary.insert(repo_id, RepositorySummary::from_records(records));
                    individual_trends.insert(repo_id, Outcome::Computed(series));
                }
                Err(err) => {
                    log::warn!("failed to compute trend for repository {repo_id}: {err}");
                    individual_trends.insert(
                        repo_id,
                        Outcome::Failed {
                            error: err.to_string(),
                        },
                    );
                }
            }
        }

        let combined_trend = match self.trend_series(&all_records, granularity) {
            Ok(series) => Outcome::Computed(CombinedTrend {
                series,
                repository_count,
            }),
            Err(err) => {
                log::warn!("failed to compute combined trend: {err}");
                Outcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        MultiRepositoryTrendResult {
            combined_trend,
            individual_trends,
            repository_summary,
        }
    }
}

fn compute_period_statistics(records: &[LeadTimeRecord]) -> Result<PeriodStatistics> {
    let lead_times: Vec<f64> = usable_lead_times(records);
    let period_start = records.iter().map(|rec| rec.created_at).min();
    let period_end = records.iter().map(|rec| rec.created_at).max();
    if lead_times.is_empty() {
        return Ok(PeriodStatistics {
            count: records.len(),
            period_start,
            period_end,
            ..Default::default()
        });
    }

    let total = checked_total(&lead_times)?;
    let average = total / lead_times.len() as f64;
    Ok(PeriodStatistics {
        count: records.len(),
        average_lead_time_hours: average,
        average_lead_time_days: average / 24.0,
        total_lead_time_hours: total,
        period_start,
        period_end,
        lead_times,
        error: None,
    })
}

fn compute_trend_entry(records: &[LeadTimeRecord]) -> Result<TrendStatistics> {
    let lead_times = usable_lead_times(records);
    checked_total(&lead_times)?;
    let stats = basic_statistics(&lead_times);
    Ok(TrendStatistics {
        average: stats.mean,
        median: stats.median,
        min: stats.min,
        max: stats.max,
        count: stats.count,
        period_start: records.iter().map(|rec| rec.created_at).min(),
        period_end: records.iter().map(|rec| rec.created_at).max(),
        lead_times,
        ..Default::default()
    })
}

fn usable_lead_times(records: &[LeadTimeRecord]) -> Vec<f64> {
    extract_values(records)
        .into_iter()
        .filter(|val| val.is_finite())
        .collect()
}

fn checked_total(lead_times: &[f64]) -> Result<f64> {
    let total: f64 = lead_times.iter().sum();
    if !total.is_finite() {
        return Err(Error::Computation(format!(
            "total lead time of {} values is not finite",
            lead_times.len()
        )));
    }
    Ok(total)
}

/// Percent change from `previous` to `current`; `0.0` without a usable baseline.
fn compute_change_rate(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

fn check_records(records: &[LeadTimeRecord]) -> Result<()> {
    for rec in records {
        if !rec.lead_time_hours.is_finite() {
            return Err(Error::InvalidRecord {
                number: rec.pr_number,
                reason: "lead time is not finite".to_string(),
            });
        }
        if rec.end_type != EndType::Open && rec.end_time < rec.created_at {
            return Err(Error::InvalidRecord {
                number: rec.pr_number,
                reason: format!("ends at {} before it was created", rec.end_time),
            });
        }
    }
    Ok(())
}
