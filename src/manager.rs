use crate::config::Config;
use anyhow::{Context, Result};
use prtrend::{
    Granularity, LeadTimeBatch, LeadTimeCalculator, LeadTimeRecord, MultiRepositoryTrendResult,
    RawPullRequest, SystemClock, TrendAnalyzer, TrendSeries,
    lead_time::{extract_values, format_human_readable},
    stats::{self, BasicStatistics, OutlierReport, Percentiles},
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub processed: usize,
    pub errors: usize,
    pub outliers: OutlierReport,
    pub percentiles: Percentiles,
    pub mean_readable: String,
    pub median_readable: String,
}

/// Loads pull requests and runs the analyses on their lead times.
pub struct Manager {
    cfg: Config,
    granularity: Granularity,
    batch: LeadTimeBatch,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(input: P, cfg: Config) -> Result<Self> {
        let granularity = cfg.granularity().context("failed to resolve granularity")?;

        let input = input.as_ref();
        let file = File::open(input).with_context(|| format!("failed to open {input:?}"))?;
        let reader = BufReader::new(file);
        let pull_requests: Vec<Option<RawPullRequest>> =
            serde_json::from_reader(reader).context("failed to deserialize pull requests")?;
        log::info!("read {} pull requests from {input:?}", pull_requests.len());

        let mut batch = LeadTimeCalculator::new(SystemClock).calculate(&pull_requests);
        if !cfg.filter.is_empty() {
            batch.records = cfg
                .filter
                .apply(&batch.records)
                .context("failed to filter records")?;
            log::info!("{} records left after filtering", batch.records.len());
        }

        Ok(Self {
            cfg,
            granularity,
            batch,
        })
    }

    pub fn lead_times(&self) -> &LeadTimeBatch {
        &self.batch
    }

    pub fn summary(&self) -> SummaryReport {
        let values = extract_values(&self.batch.records);
        let outliers = stats::statistics_with_outlier_removal(&values, self.cfg.outlier_method());
        let BasicStatistics { mean, median, .. } = outliers.original_stats;

        SummaryReport {
            processed: self.batch.processed_count(),
            errors: self.batch.error_count(),
            percentiles: stats::percentiles(&values),
            mean_readable: format_human_readable(mean),
            median_readable: format_human_readable(median),
            outliers,
        }
    }

    pub fn trend(&self) -> TrendSeries {
        let analyzer = TrendAnalyzer::new(self.cfg.moving_average_windows.clone());

        let trend_data = analyzer.trend_data(&self.batch.records, self.granularity);
        let trend_statistics = analyzer.trend_statistics(&trend_data.grouped_data);
        let trend_statistics =
            analyzer.handle_empty_periods(trend_statistics, self.granularity, self.cfg.fill_gaps);
        let trend_statistics =
            analyzer.moving_averages(trend_statistics, &self.cfg.moving_average_windows);

        TrendSeries {
            trend_data,
            trend_statistics,
        }
    }

    pub fn compare(&self) -> MultiRepositoryTrendResult {
        let mut repo_records: BTreeMap<i64, Vec<LeadTimeRecord>> = BTreeMap::new();
        for rec in &self.batch.records {
            match rec.repository_id {
                Some(repo_id) => repo_records.entry(repo_id).or_default().push(rec.clone()),
                None => log::warn!("pull request #{} has no repository id", rec.pr_number),
            }
        }

        let analyzer = TrendAnalyzer::new(self.cfg.moving_average_windows.clone());
        analyzer.multi_repository_trend_data(&repo_records, self.granularity)
    }
}

/// Write `report` as pretty JSON to `file`, or to stdout without a file.
pub fn write_report<T: Serialize, P: AsRef<Path>>(report: &T, file: Option<P>) -> Result<()> {
    match file {
        Some(file) => {
            let file = file.as_ref();
            let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, report).context("failed to serialize report")?;
            writer.flush().context("failed to flush writer stream")?;
        }
        None => {
            let mut writer = io::stdout().lock();
            serde_json::to_writer_pretty(&mut writer, report).context("failed to serialize report")?;
            writeln!(writer).context("failed to write to stdout")?;
        }
    }
    Ok(())
}
