use anyhow::{Context, Result, bail};
use prtrend::{Granularity, OutlierMethod, RecordFilter};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Analysis configuration parameters.
///
/// Loaded from a TOML file and validated before use. Every field has a
/// default, so an absent file or an empty one is a valid configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Period width: `weekly` or `monthly`.
    pub granularity: String,
    /// Outlier removal method: `iqr`, `zscore` or `percentile`.
    pub outlier_method: String,

    /// Window sizes of the trailing moving averages.
    pub moving_average_windows: Vec<usize>,
    /// Insert empty periods so that trends compare calendar neighbours.
    pub fill_gaps: bool,

    /// Conditions selecting the analyzed records.
    pub filter: RecordFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            granularity: Granularity::default().to_string(),
            outlier_method: "iqr".to_string(),
            moving_average_windows: vec![3],
            fill_gaps: false,
            filter: RecordFilter::default(),
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn granularity(&self) -> Result<Granularity> {
        let granularity: Granularity = self.granularity.parse()?;
        Ok(granularity)
    }

    pub fn outlier_method(&self) -> OutlierMethod {
        OutlierMethod::from_name(&self.outlier_method)
    }

    pub fn validate(&self) -> Result<()> {
        self.granularity().context("invalid granularity")?;

        check_num(self.moving_average_windows.len(), 0..=16)
            .context("invalid number of moving average windows")?;
        for &window in &self.moving_average_windows {
            check_num(window, 1..=52).context("invalid moving average window")?;
        }

        self.filter.validate().context("invalid filter")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
