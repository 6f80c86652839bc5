use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

use crate::core::{ChartPeriod, TimeWindow};

/// Span used for `Custom` periods that carry neither a start nor a duration.
#[must_use]
pub fn default_custom_duration() -> TimeDelta {
    TimeDelta::hours(24)
}

/// Inputs for one window resolution. Instants are already normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub period: ChartPeriod,
    pub is_static: bool,
    pub custom_start: Option<DateTime<Utc>>,
    pub custom_end: Option<DateTime<Utc>>,
    pub custom_duration: Option<TimeDelta>,
}

impl WindowSpec {
    #[must_use]
    pub fn auto(period: ChartPeriod) -> Self {
        Self {
            period,
            is_static: false,
            custom_start: None,
            custom_end: None,
            custom_duration: None,
        }
    }

    #[must_use]
    pub fn auto_custom(duration: TimeDelta) -> Self {
        Self {
            custom_duration: Some(duration),
            ..Self::auto(ChartPeriod::Custom)
        }
    }

    #[must_use]
    pub fn frozen(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            period: ChartPeriod::Custom,
            is_static: true,
            custom_start: Some(start),
            custom_end: Some(end),
            custom_duration: None,
        }
    }
}

/// Turns a window spec into a concrete `[start, end)` pair.
///
/// Auto windows end at `now`. Static windows use the frozen pair; an
/// incomplete or inverted frozen pair falls back to the Auto resolution.
#[must_use]
pub fn resolve_time_window(spec: WindowSpec, now: DateTime<Utc>) -> TimeWindow {
    if spec.is_static {
        if let (Some(start), Some(end)) = (spec.custom_start, spec.custom_end) {
            if let Ok(window) = TimeWindow::new(start, end, true) {
                return window;
            }
        }
        warn!(
            start = ?spec.custom_start,
            end = ?spec.custom_end,
            "static window without a valid frozen range; resolving as auto"
        );
    }

    let end = now;
    let start = match spec.period.duration() {
        Some(duration) => end.checked_sub_signed(duration),
        None => match spec.custom_start.filter(|start| *start < end) {
            Some(start) => Some(start),
            None => end.checked_sub_signed(positive_or_default(spec.custom_duration)),
        },
    };

    start
        .and_then(|start| TimeWindow::new(start, end, false).ok())
        .unwrap_or_else(|| fallback_window(end))
}

fn positive_or_default(duration: Option<TimeDelta>) -> TimeDelta {
    duration
        .filter(|duration| *duration > TimeDelta::zero())
        .unwrap_or_else(default_custom_duration)
}

/// Trailing default-length window; `end` is lifted so `start` stays representable.
fn fallback_window(end: DateTime<Utc>) -> TimeWindow {
    let span = default_custom_duration();
    let end = end.max(DateTime::<Utc>::MIN_UTC + span);
    TimeWindow::trailing(end, span)
}
