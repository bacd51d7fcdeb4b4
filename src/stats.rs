//! Descriptive statistics, percentiles and outlier removal.

use serde::{Deserialize, Serialize};

/// Running mean and sample variance (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation, `0.0` for fewer than two values.
    pub fn std_dev(&self) -> f64 {
        if self.n_vals > 1 {
            (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
        } else {
            0.0
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    /// `p75 - p25`.
    pub iqr: f64,
}

/// Outlier detection rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Keep values within `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
    #[default]
    Iqr,
    /// Keep values whose absolute z-score is at most 3.
    Zscore,
    /// Keep values at or below the 95th percentile.
    Percentile,
}

impl OutlierMethod {
    /// Look up a method by name, falling back to [`OutlierMethod::Iqr`] for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "iqr" => Self::Iqr,
            "zscore" => Self::Zscore,
            "percentile" => Self::Percentile,
            _ => {
                log::warn!("unknown outlier removal method {name:?}, using iqr");
                Self::Iqr
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub original_stats: BasicStatistics,
    pub filtered_stats: BasicStatistics,
    pub outliers_removed: usize,
    pub outlier_method: OutlierMethod,
}

/// Compute count, mean, median, min, max and sample standard deviation.
///
/// Non-finite values are ignored. Without any finite value every field is zero.
pub fn basic_statistics(values: &[f64]) -> BasicStatistics {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        if !values.is_empty() {
            log::warn!("no finite values among {} inputs", values.len());
        }
        return BasicStatistics::default();
    }

    let mut acc = Accumulator::new();
    for &val in &sorted {
        acc.add(val);
    }

    BasicStatistics {
        count: sorted.len(),
        mean: acc.mean(),
        median: compute_median(&sorted),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        std_dev: acc.std_dev(),
    }
}

pub fn percentiles(values: &[f64]) -> Percentiles {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return Percentiles::default();
    }

    let p25 = compute_percentile(&sorted, 25.0);
    let p75 = compute_percentile(&sorted, 75.0);
    Percentiles {
        p25,
        p75,
        p90: compute_percentile(&sorted, 90.0),
        p95: compute_percentile(&sorted, 95.0),
        iqr: p75 - p25,
    }
}

/// Drop non-finite values and outliers, preserving the input order of the rest.
pub fn remove_outliers(values: &[f64], method: OutlierMethod) -> Vec<f64> {
    let clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if clean.is_empty() {
        return clean;
    }

    let filtered: Vec<f64> = match method {
        OutlierMethod::Iqr => {
            let sorted = sorted_finite(&clean);
            let q1 = compute_percentile(&sorted, 25.0);
            let q3 = compute_percentile(&sorted, 75.0);
            let iqr = q3 - q1;
            let (low, high) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
            clean
                .iter()
                .copied()
                .filter(|&v| low <= v && v <= high)
                .collect()
        }
        OutlierMethod::Zscore => {
            if clean.len() < 2 {
                return clean;
            }
            let mean = compute_mean(&clean);
            let std_dev = (clean.iter().map(|&v| (v - mean).powi(2)).sum::<f64>()
                / clean.len() as f64)
                .sqrt();
            // Zero spread: every z-score is 0.
            if std_dev == 0.0 {
                return clean;
            }
            clean
                .iter()
                .copied()
                .filter(|&v| ((v - mean) / std_dev).abs() <= 3.0)
                .collect()
        }
        OutlierMethod::Percentile => {
            let p95 = compute_percentile(&sorted_finite(&clean), 95.0);
            clean.iter().copied().filter(|&v| v <= p95).collect()
        }
    };

    let n_removed = clean.len() - filtered.len();
    if n_removed > 0 {
        log::info!("removed {n_removed} outliers using {method:?}");
    }
    filtered
}

pub fn statistics_with_outlier_removal(values: &[f64], method: OutlierMethod) -> OutlierReport {
    let original_stats = basic_statistics(values);
    let filtered = remove_outliers(values, method);
    let filtered_stats = basic_statistics(&filtered);

    OutlierReport {
        original_stats,
        filtered_stats,
        outliers_removed: original_stats.count - filtered_stats.count,
        outlier_method: method,
    }
}

/// Round `val` to the given number of decimals.
pub fn round_to(val: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (val * factor).round() / factor
}

pub(crate) fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

pub(crate) fn compute_median(sorted: &[f64]) -> f64 {
    let n_vals = sorted.len();
    if n_vals == 0 {
        return 0.0;
    }
    if n_vals % 2 == 0 {
        (sorted[n_vals / 2 - 1] + sorted[n_vals / 2]) / 2.0
    } else {
        sorted[n_vals / 2]
    }
}

/// Percentile with linear interpolation between closest ranks.
fn compute_percentile(sorted: &[f64], pct: f64) -> f64 {
    let n_vals = sorted.len();
    if n_vals == 0 {
        return 0.0;
    }
    let rank = pct / 100.0 * (n_vals - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_input_is_zeroed() {
        assert_eq!(basic_statistics(&[]), BasicStatistics::default());
        assert_eq!(percentiles(&[]), Percentiles::default());
        assert!(remove_outliers(&[], OutlierMethod::Iqr).is_empty());
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let stats = basic_statistics(&[f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, 0.0);

        let stats = basic_statistics(&[1.0, f64::NAN, 3.0]);
        assert_eq!(stats.count, 2);
        assert!(approx(stats.mean, 2.0));
    }

    #[test]
    fn single_value() {
        let stats = basic_statistics(&[7.5]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.mean, 7.5);
        assert_eq!(stats.median, 7.5);
        assert_eq!(stats.min, 7.5);
        assert_eq!(stats.max, 7.5);
    }

    #[test]
    fn sample_standard_deviation() {
        let stats = basic_statistics(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert!(approx(stats.mean, 5.0));
        assert!(approx(stats.median, 4.5));
        assert!(approx(stats.std_dev, (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn interpolated_percentiles() {
        let values: Vec<f64> = (1..=5).map(f64::from).collect();
        let pct = percentiles(&values);
        assert!(approx(pct.p25, 2.0));
        assert!(approx(pct.p75, 4.0));
        assert!(approx(pct.p90, 4.6));
        assert!(approx(pct.p95, 4.8));
        assert!(approx(pct.iqr, 2.0));
    }

    #[test]
    fn iqr_removes_far_values() {
        let mut values: Vec<f64> = (1..=10).map(f64::from).collect();
        values.extend([100.0, 200.0]);
        let filtered = remove_outliers(&values, OutlierMethod::Iqr);
        let expected: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn zscore_keeps_small_and_flat_inputs() {
        assert_eq!(remove_outliers(&[42.0], OutlierMethod::Zscore), vec![42.0]);
        assert_eq!(
            remove_outliers(&[3.0, 3.0, 3.0], OutlierMethod::Zscore),
            vec![3.0, 3.0, 3.0]
        );
    }

    #[test]
    fn zscore_removes_extreme_value() {
        let mut values = vec![10.0; 20];
        values.push(1000.0);
        let filtered = remove_outliers(&values, OutlierMethod::Zscore);
        assert_eq!(filtered.len(), 20);
        assert!(filtered.iter().all(|&v| v == 10.0));
    }

    #[test]
    fn percentile_drops_top_tail() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let filtered = remove_outliers(&values, OutlierMethod::Percentile);
        assert_eq!(filtered.len(), 95);
        assert_eq!(filtered.last().copied(), Some(95.0));
    }

    #[test]
    fn unknown_method_falls_back_to_iqr() {
        assert_eq!(OutlierMethod::from_name("median"), OutlierMethod::Iqr);
        assert_eq!(OutlierMethod::from_name("ZScore"), OutlierMethod::Zscore);
    }

    #[test]
    fn outlier_report_counts_removed_values() {
        let mut values: Vec<f64> = (1..=10).map(f64::from).collect();
        values.extend([100.0, 200.0]);
        let report = statistics_with_outlier_removal(&values, OutlierMethod::Iqr);
        assert_eq!(report.original_stats.count, 12);
        assert_eq!(report.filtered_stats.count, 10);
        assert_eq!(report.outliers_removed, 2);
        assert!(approx(report.filtered_stats.mean, 5.5));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(233.3333, 2), 233.33);
    }
}
