use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{NumericFormat, Sample, datetime_to_unix_seconds};
use crate::error::{ChartError, ChartResult};

/// Per-series data captured on refresh for pointer inspection.
///
/// `xs` is non-decreasing and has the same length as `ys`. Immutable until the
/// next refresh replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesHoverSnapshot {
    label: String,
    unit: String,
    numeric_format: NumericFormat,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl SeriesHoverSnapshot {
    pub fn new(
        label: impl Into<String>,
        unit: impl Into<String>,
        numeric_format: NumericFormat,
        xs: Vec<f64>,
        ys: Vec<f64>,
    ) -> ChartResult<Self> {
        if xs.len() != ys.len() {
            return Err(ChartError::InvalidData(format!(
                "hover snapshot length mismatch: xs={}, ys={}",
                xs.len(),
                ys.len()
            )));
        }
        if xs.iter().any(|x| !x.is_finite()) {
            return Err(ChartError::InvalidData(
                "hover snapshot x values must be finite".to_owned(),
            ));
        }
        if xs.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(ChartError::InvalidData(
                "hover snapshot x values must be non-decreasing".to_owned(),
            ));
        }
        Ok(Self {
            label: label.into(),
            unit: unit.into(),
            numeric_format,
            xs,
            ys,
        })
    }

    /// Builds a snapshot from samples, sorting them by timestamp first.
    pub fn from_samples(
        label: impl Into<String>,
        unit: impl Into<String>,
        numeric_format: NumericFormat,
        mut samples: Vec<Sample>,
    ) -> ChartResult<Self> {
        samples.sort_by_key(|sample| sample.timestamp);
        let (xs, ys): (Vec<f64>, Vec<f64>) = samples
            .iter()
            .map(|sample| (datetime_to_unix_seconds(sample.timestamp), sample.value))
            .unzip();
        Self::new(label, unit, numeric_format, xs, ys)
    }

    #[must_use]
    pub fn empty(
        label: impl Into<String>,
        unit: impl Into<String>,
        numeric_format: NumericFormat,
    ) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            numeric_format,
            xs: Vec::new(),
            ys: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[must_use]
    pub fn numeric_format(&self) -> NumericFormat {
        self.numeric_format
    }

    #[must_use]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    #[must_use]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// One series value shown at the shared anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverValue {
    pub label: String,
    pub unit: String,
    pub value: f64,
    pub formatted: String,
}

/// Synchronized values of all series at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverReadout {
    pub anchor_x: f64,
    pub values: Vec<HoverValue>,
}

/// Index of the sample nearest to `query_x` in ascending `xs`.
///
/// Binary search for the insertion point, then the closer of the two
/// neighbours; an exact midpoint favours the earlier index.
#[must_use]
pub fn nearest_index(xs: &[f64], query_x: f64) -> Option<usize> {
    if xs.is_empty() || query_x.is_nan() {
        return None;
    }
    let insertion = xs.partition_point(|x| *x < query_x);

    let mut candidates: SmallVec<[usize; 2]> = SmallVec::new();
    if insertion > 0 {
        candidates.push(insertion - 1);
    }
    if insertion < xs.len() {
        candidates.push(insertion);
    }

    candidates
        .into_iter()
        .min_by_key(|index| OrderedFloat((xs[*index] - query_x).abs()))
}

/// Shared anchor x across all series: the sample with the globally smallest
/// distance to `query_x`. Ties keep series order.
#[must_use]
pub fn locate_anchor(query_x: f64, series: &[SeriesHoverSnapshot]) -> Option<f64> {
    series
        .iter()
        .filter_map(|snapshot| {
            let index = nearest_index(&snapshot.xs, query_x)?;
            let x = snapshot.xs[index];
            Some((OrderedFloat((x - query_x).abs()), x))
        })
        .min_by_key(|(delta, _)| *delta)
        .map(|(_, x)| x)
}

/// Anchor plus one value per series re-sampled at that anchor.
///
/// Series that are empty or hold `NaN` at the anchor are left out.
#[must_use]
pub fn build_hover_readout(query_x: f64, series: &[SeriesHoverSnapshot]) -> Option<HoverReadout> {
    let anchor_x = locate_anchor(query_x, series)?;
    let values = series
        .iter()
        .filter_map(|snapshot| {
            let index = nearest_index(&snapshot.xs, anchor_x)?;
            let value = *snapshot.ys.get(index)?;
            if !value.is_finite() {
                return None;
            }
            Some(HoverValue {
                label: snapshot.label.clone(),
                unit: snapshot.unit.clone(),
                value,
                formatted: format_hover_value(snapshot, value),
            })
        })
        .collect();

    Some(HoverReadout { anchor_x, values })
}

fn format_hover_value(snapshot: &SeriesHoverSnapshot, value: f64) -> String {
    let number = snapshot.numeric_format.format(value);
    if snapshot.unit.is_empty() {
        number
    } else {
        format!("{number} {}", snapshot.unit)
    }
}
