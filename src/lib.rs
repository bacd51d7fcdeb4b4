//! Pull-request lead times and their trends over calendar periods.
//!
//! Raw pull requests are turned into [`LeadTimeRecord`]s by a
//! [`LeadTimeCalculator`], grouped into weekly or monthly periods and summarized
//! by a [`TrendAnalyzer`].

pub mod analysis;
pub mod clock;
pub mod error;
pub mod filter;
pub mod lead_time;
pub mod model;
pub mod period;
pub mod stats;

pub use analysis::{
    MultiRepositoryTrendResult, Outcome, PeriodStatistics, TrendAnalyzer, TrendDirection,
    TrendSeries, TrendStatistics,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use filter::RecordFilter;
pub use lead_time::{LeadTimeBatch, LeadTimeCalculator, SkipReason};
pub use model::{EndType, LeadTimeRecord, RawPullRequest, RawTimestamp};
pub use period::{Granularity, PeriodBucket, PeriodKey};
pub use stats::OutlierMethod;
