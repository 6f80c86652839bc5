use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance in x-axis units (seconds) below which limit changes are ignored.
pub const X_LIMITS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChartMode {
    /// Moving "last N" window ending at now.
    #[default]
    Auto,
    /// Frozen historical window until timeout or explicit exit.
    Static,
}

/// User gesture on the rendered chart surface.
///
/// Every kind is normalized to "x-axis limits changed" before it reaches the
/// mode controller; the kind is kept for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    Pan,
    WheelZoom,
    DoubleClick,
    DragSelect,
}

/// Visible x-axis limits in chart units (Unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XAxisLimits {
    pub min: f64,
    pub max: f64,
}

impl XAxisLimits {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max > self.min
    }

    #[must_use]
    pub fn differs_from(self, other: XAxisLimits) -> bool {
        (self.min - other.min).abs() > X_LIMITS_EPSILON
            || (self.max - other.max).abs() > X_LIMITS_EPSILON
    }
}

/// Per-chart mode state; owned by exactly one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartModeState {
    pub mode: ChartMode,
    pub last_interaction: Option<DateTime<Utc>>,
    pub timeout: TimeDelta,
}

impl ChartModeState {
    /// Remaining Static time: `max(0, timeout - (now - last_interaction))`.
    ///
    /// `None` while in Auto mode. A clock that moved backwards counts as zero
    /// elapsed time.
    #[must_use]
    pub fn countdown(self, now: DateTime<Utc>) -> Option<TimeDelta> {
        if self.mode != ChartMode::Static {
            return None;
        }
        let last = self.last_interaction?;
        let elapsed = (now - last).max(TimeDelta::zero());
        Some((self.timeout - elapsed).max(TimeDelta::zero()))
    }

    #[must_use]
    pub fn is_expired(self, now: DateTime<Utc>) -> bool {
        matches!(self.countdown(now), Some(remaining) if remaining <= TimeDelta::zero())
    }
}
