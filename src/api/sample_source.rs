use serde::{Deserialize, Serialize};

use crate::core::{AggregationRequest, NumericFormat, Sample};
use crate::error::ChartResult;

/// External store that answers aggregated sample queries.
///
/// The core always passes a concrete window and an interval > 0; the
/// reduction itself happens on the source side.
pub trait SampleSource {
    fn get_samples(&mut self, metric: &str, request: &AggregationRequest)
    -> ChartResult<Vec<Sample>>;
}

/// One plotted metric of a chart tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    pub metric: String,
    pub label: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub numeric_format: NumericFormat,
}

impl SeriesDescriptor {
    #[must_use]
    pub fn new(
        metric: impl Into<String>,
        label: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            metric: metric.into(),
            label: label.into(),
            unit: unit.into(),
            numeric_format: NumericFormat::default(),
        }
    }

    #[must_use]
    pub fn with_numeric_format(mut self, numeric_format: NumericFormat) -> Self {
        self.numeric_format = numeric_format;
        self
    }
}
