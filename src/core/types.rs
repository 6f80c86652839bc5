use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ChartPeriod;
use crate::core::primitives::delta_to_seconds;
use crate::error::{ChartError, ChartResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChartId(u32);

impl ChartId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart#{}", self.0)
    }
}

/// Concrete `[start, end)` range a chart requests and displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    is_static: bool,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, is_static: bool) -> ChartResult<Self> {
        if end <= start {
            return Err(ChartError::InvalidData(format!(
                "time window end must be after start: start={start}, end={end}"
            )));
        }
        Ok(Self {
            start,
            end,
            is_static,
        })
    }

    /// Window of positive `span` ending at `end`; callers guarantee that
    /// `end - span` is representable.
    pub(crate) fn trailing(end: DateTime<Utc>, span: TimeDelta) -> Self {
        debug_assert!(span > TimeDelta::zero());
        Self {
            start: end - span,
            end,
            is_static: false,
        }
    }

    #[must_use]
    pub fn start(self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn is_static(self) -> bool {
        self.is_static
    }

    #[must_use]
    pub fn span(self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn span_seconds(self) -> f64 {
        delta_to_seconds(self.span())
    }
}

/// Statistical reduction the data source applies per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AggregationFunction {
    /// No reduction; the source returns raw samples.
    Raw,
    #[default]
    Average,
    Minimum,
    Maximum,
    Last,
}

/// Fully resolved request handed to the data source on each refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationRequest {
    pub window: TimeWindow,
    pub interval: TimeDelta,
    pub function: AggregationFunction,
    pub period: ChartPeriod,
    pub custom_duration: Option<TimeDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Fixed-decimal formatting for hover readouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericFormat {
    pub decimals: u8,
}

impl Default for NumericFormat {
    fn default() -> Self {
        Self { decimals: 2 }
    }
}

impl NumericFormat {
    #[must_use]
    pub fn format(self, value: f64) -> String {
        format!("{:.*}", usize::from(self.decimals), value)
    }
}
