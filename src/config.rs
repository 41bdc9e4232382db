use chrono::{DateTime, FixedOffset, Local};

/// Default number of buckets `bin` may produce.
pub const DEFAULT_MAX_BINS: u64 = 100;

/// Knobs for a single compile.
///
/// `now` anchors every relative time (`earliest=-1h`, `gentimes
/// start=-3`, `aligntime=@d`); pass a fixed value for reproducible plans.
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use spl_lang::ParseOptions;
///
/// let now = FixedOffset::east_opt(0).unwrap().timestamp_opt(1_700_000_000, 0).unwrap();
/// let options = ParseOptions::default().with_now(now).with_max_bins(50);
/// assert_eq!(options.max_bins, 50);
/// ```
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub now: DateTime<FixedOffset>,
    pub max_bins: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            now: Local::now().fixed_offset(),
            max_bins: DEFAULT_MAX_BINS,
        }
    }
}

impl ParseOptions {
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    pub fn with_max_bins(mut self, max_bins: u64) -> Self {
        self.max_bins = max_bins;
        self
    }
}
