use chrono::{DateTime, TimeDelta, Utc};

use crate::core::{ChartId, PeriodPreset};
use crate::interaction::ChartMode;

/// Event stream exposed to the render layer of a single chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartEvent {
    ModeChanged {
        mode: ChartMode,
    },
    StaticRangeChanged {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    PeriodChanged {
        preset_uid: Option<String>,
    },
    /// Remaining Static time, refreshed at tick granularity.
    CountdownUpdated {
        remaining: TimeDelta,
    },
    Refreshed {
        aggregation_label: String,
    },
}

/// Observation hook for redraws and countdown displays.
///
/// Observers see every change of their chart, including changes replayed
/// from linked siblings. They cannot mutate controller state.
pub trait ChartObserver {
    fn id(&self) -> &str;
    fn on_chart_event(&mut self, chart: ChartId, event: &ChartEvent);
}

/// Notified after the preset catalog list has been replaced as a whole.
pub trait PresetCatalogListener {
    fn id(&self) -> &str;
    fn on_presets_replaced(&mut self, revision: u64, presets: &[PeriodPreset]);
}
