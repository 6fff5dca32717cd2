//! Best/worst response time aggregation over an ordered result set.
//!
//! The input is taken in the order the search backend returned it. The
//! first `worst_len` values form the "worst" slice, everything after it the
//! "best" slice. Nothing here sorts; the sort key is chosen by the query.

use crate::error::ConfigError;

pub const DEFAULT_PERCENTAGE_LIMIT: f64 = 5.0;

/// Mean of the worst and best slices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateResult {
    pub worst: f64,
    pub best: f64,
}

impl AggregateResult {
    pub const EMPTY: AggregateResult = AggregateResult {
        worst: 0.0,
        best: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseTimeAggregator {
    percentage: f64,
}

impl Default for ResponseTimeAggregator {
    fn default() -> Self {
        ResponseTimeAggregator {
            percentage: DEFAULT_PERCENTAGE_LIMIT,
        }
    }
}

impl ResponseTimeAggregator {
    /// `percentage` must be finite and in `(0, 100]`.
    pub fn new(percentage: f64) -> Result<Self, ConfigError> {
        if !percentage.is_finite() || percentage <= 0.0 || percentage > 100.0 {
            return Err(ConfigError::InvalidPercentage(percentage));
        }
        Ok(ResponseTimeAggregator { percentage })
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Index of the last element of the worst slice for `total` values.
    ///
    /// `floor((total * p - 0.1) / 100)` clamped to `[0, total - 1]`.
    /// Meaningless for `total < 2`, which `aggregate` handles separately.
    pub fn split_index(&self, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let raw = (((total as f64) * self.percentage) - 0.1) / 100.0;
        let limit = raw.floor();
        if limit <= 0.0 {
            0
        } else {
            (limit as usize).min(total - 1)
        }
    }

    /// Number of values assigned to the worst slice.
    pub fn worst_len(&self, total: usize) -> usize {
        match total {
            0 => 0,
            1 => 1,
            n => self.split_index(n) + 1,
        }
    }

    /// Worst and best means over `values`, which must already be ordered.
    ///
    /// An empty best slice (possible when the percentage is 100) reports
    /// `0.0`, the same value an empty result set reports.
    pub fn aggregate(&self, values: &[f64]) -> AggregateResult {
        match values {
            [] => AggregateResult::EMPTY,
            [only] => AggregateResult {
                worst: *only,
                best: *only,
            },
            _ => {
                let (worst, best) = values.split_at(self.worst_len(values.len()));
                AggregateResult {
                    worst: mean(worst),
                    best: mean(best),
                }
            }
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
