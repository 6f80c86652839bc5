use chrono::TimeDelta;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::primitives::delta_to_seconds;
use crate::core::{ChartPeriod, PeriodPreset};
use crate::interaction::ChartMode;

use super::PresetRepository;

pub const DEFAULT_TOLERANCE_PERCENT: f64 = 10.0;
pub const DEFAULT_TARGET_POINT_COUNT: u32 = 300;
pub const DEFAULT_ROUNDING_STEP_SECONDS: u32 = 15;
pub const MIN_TARGET_POINT_COUNT: u32 = 2;

/// Float slack when comparing relative deviation against the tolerance.
const DEVIATION_EPSILON: f64 = 1e-12;
/// Upper bound for computed intervals (about a century).
const MAX_INTERVAL_SECONDS: u64 = 100 * 365 * 86_400;

/// Tuning for interval resolution. Values are clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationTuning {
    tolerance_percent: f64,
    target_point_count: u32,
    rounding_step_seconds: u32,
}

impl Default for AggregationTuning {
    fn default() -> Self {
        Self {
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            target_point_count: DEFAULT_TARGET_POINT_COUNT,
            rounding_step_seconds: DEFAULT_ROUNDING_STEP_SECONDS,
        }
    }
}

impl AggregationTuning {
    #[must_use]
    pub fn new(tolerance_percent: f64, target_point_count: u32, rounding_step_seconds: u32) -> Self {
        let tolerance_percent = if tolerance_percent.is_nan() {
            DEFAULT_TOLERANCE_PERCENT
        } else {
            tolerance_percent.clamp(0.0, 100.0)
        };
        Self {
            tolerance_percent,
            target_point_count: target_point_count.max(MIN_TARGET_POINT_COUNT),
            rounding_step_seconds: rounding_step_seconds.max(1),
        }
    }

    #[must_use]
    pub fn tolerance_percent(self) -> f64 {
        self.tolerance_percent
    }

    #[must_use]
    pub fn target_point_count(self) -> u32 {
        self.target_point_count
    }

    #[must_use]
    pub fn rounding_step_seconds(self) -> u32 {
        self.rounding_step_seconds
    }
}

/// Chart state the resolver needs; borrowed from the controller per refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationQuery<'a> {
    pub mode: ChartMode,
    pub span: TimeDelta,
    /// Preset the frozen span was taken from, if any (Static only).
    pub static_source_preset_uid: Option<&'a str>,
    /// Preset selected for Auto mode.
    pub selected_preset_uid: Option<&'a str>,
    pub period: ChartPeriod,
}

/// Which precedence rule produced an interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregationSource {
    SourcePreset { uid: String },
    ToleranceMatch { uid: String, deviation: f64 },
    Automatic,
    SelectedPreset { uid: String },
    PeriodDefault { period: ChartPeriod },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAggregation {
    pub interval: TimeDelta,
    pub source: AggregationSource,
}

/// Picks the bucket width for a chart span. Always returns an interval > 0.
///
/// Precedence: frozen span's source preset, tolerance match against the
/// catalog, automatic point-count calculation (Static); selected preset,
/// per-period default, automatic calculation (Auto).
#[must_use]
pub fn resolve_aggregation_interval<R>(
    query: AggregationQuery<'_>,
    repository: &R,
    tuning: AggregationTuning,
) -> ResolvedAggregation
where
    R: PresetRepository + ?Sized,
{
    let resolved = match query.mode {
        ChartMode::Static => resolve_static(query, repository, tuning),
        ChartMode::Auto => resolve_auto(query, repository, tuning),
    };
    trace!(
        mode = ?query.mode,
        span_s = delta_to_seconds(query.span),
        interval_s = resolved.interval.num_seconds(),
        source = ?resolved.source,
        "aggregation interval resolved"
    );
    resolved
}

fn resolve_static<R>(
    query: AggregationQuery<'_>,
    repository: &R,
    tuning: AggregationTuning,
) -> ResolvedAggregation
where
    R: PresetRepository + ?Sized,
{
    if let Some(preset) = query
        .static_source_preset_uid
        .and_then(|uid| repository.find(uid))
        .filter(|preset| preset.aggregation_interval > TimeDelta::zero())
    {
        return ResolvedAggregation {
            interval: preset.aggregation_interval,
            source: AggregationSource::SourcePreset {
                uid: preset.uid.clone(),
            },
        };
    }

    if let Some((preset, deviation)) =
        match_preset_within_tolerance(query.span, repository.presets(), tuning.tolerance_percent)
    {
        return ResolvedAggregation {
            interval: preset.aggregation_interval,
            source: AggregationSource::ToleranceMatch {
                uid: preset.uid.clone(),
                deviation,
            },
        };
    }

    automatic(query.span, tuning)
}

fn resolve_auto<R>(
    query: AggregationQuery<'_>,
    repository: &R,
    tuning: AggregationTuning,
) -> ResolvedAggregation
where
    R: PresetRepository + ?Sized,
{
    if let Some(preset) = query
        .selected_preset_uid
        .and_then(|uid| repository.find(uid))
        .filter(|preset| preset.aggregation_interval > TimeDelta::zero())
    {
        return ResolvedAggregation {
            interval: preset.aggregation_interval,
            source: AggregationSource::SelectedPreset {
                uid: preset.uid.clone(),
            },
        };
    }

    if let Some(interval) = query.period.recommended_aggregation_interval() {
        return ResolvedAggregation {
            interval,
            source: AggregationSource::PeriodDefault {
                period: query.period,
            },
        };
    }

    automatic(query.span, tuning)
}

fn automatic(span: TimeDelta, tuning: AggregationTuning) -> ResolvedAggregation {
    ResolvedAggregation {
        interval: automatic_interval(
            span,
            tuning.target_point_count,
            tuning.rounding_step_seconds,
        ),
        source: AggregationSource::Automatic,
    }
}

/// Finds the preset whose duration deviates least from `span`, relative to
/// the preset duration, within `tolerance_percent`.
///
/// The bound is inclusive. Ties keep catalog order (first wins).
#[must_use]
pub fn match_preset_within_tolerance(
    span: TimeDelta,
    presets: &[PeriodPreset],
    tolerance_percent: f64,
) -> Option<(&PeriodPreset, f64)> {
    let tolerance = if tolerance_percent.is_nan() {
        DEFAULT_TOLERANCE_PERCENT / 100.0
    } else {
        tolerance_percent.clamp(0.0, 100.0) / 100.0
    };
    let span_seconds = delta_to_seconds(span);

    presets
        .iter()
        .filter_map(|preset| {
            let duration = delta_to_seconds(preset.duration());
            if duration <= 0.0 {
                return None;
            }
            let deviation = (span_seconds - duration).abs() / duration;
            (deviation <= tolerance + DEVIATION_EPSILON).then_some((preset, deviation))
        })
        .min_by_key(|(_, deviation)| OrderedFloat(*deviation))
}

/// `ceil(span / target_points)` seconds, floored at one second, then rounded
/// up to a multiple of `rounding_step_seconds`.
///
/// Spans of one second or less skip the rounding and return one second.
#[must_use]
pub fn automatic_interval(
    span: TimeDelta,
    target_point_count: u32,
    rounding_step_seconds: u32,
) -> TimeDelta {
    let target = f64::from(target_point_count.max(MIN_TARGET_POINT_COUNT));
    let step = u64::from(rounding_step_seconds.max(1));
    let span_seconds = delta_to_seconds(span).max(0.0);

    if !span_seconds.is_finite() || span_seconds <= 1.0 {
        return TimeDelta::seconds(1);
    }

    let raw = ((span_seconds / target).ceil() as u64).clamp(1, MAX_INTERVAL_SECONDS);
    let rounded = raw.div_ceil(step).saturating_mul(step).min(MAX_INTERVAL_SECONDS);
    TimeDelta::seconds(rounded as i64)
}
