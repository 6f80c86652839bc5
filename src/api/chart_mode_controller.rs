use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::primitives::serde_seconds_opt;
use crate::core::{
    AggregationFunction, AggregationRequest, ChartId, ChartPeriod, PeriodPreset, TaggedInstant,
    TimeWindow, datetime_to_unix_seconds, normalize_instant, unix_seconds_to_datetime,
};
use crate::error::{ChartError, ChartResult};
use crate::extensions::{ChartEvent, ChartObserver};
use crate::interaction::{ChartMode, ChartModeState, InteractionKind, XAxisLimits};

use super::{
    AggregationQuery, AggregationTuning, PresetRepository, ResolvedAggregation, WindowSpec,
    fallback_preset, find_matching_index, format_aggregation_label, resolve_aggregation_interval,
    resolve_time_window,
};

pub const MIN_STATIC_TIMEOUT_SECONDS: u32 = 10;
pub const DEFAULT_STATIC_TIMEOUT_SECONDS: u32 = 60;

fn default_static_timeout_seconds() -> u32 {
    DEFAULT_STATIC_TIMEOUT_SECONDS
}

/// Static timeout with the minimum floor applied.
#[must_use]
pub fn clamp_static_timeout(seconds: u32) -> TimeDelta {
    TimeDelta::seconds(i64::from(seconds.max(MIN_STATIC_TIMEOUT_SECONDS)))
}

/// Persisted frozen range, in whatever clock representation it was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenRange {
    pub start: TaggedInstant,
    pub end: TaggedInstant,
}

/// Persisted per-chart configuration.
///
/// `period`, `preset_uid` and `custom_duration` describe the Auto selection;
/// a present `frozen_range` makes the chart start in Static mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartModeConfig {
    #[serde(default)]
    pub period: ChartPeriod,
    #[serde(default)]
    pub preset_uid: Option<String>,
    #[serde(
        default,
        rename = "custom_duration_seconds",
        with = "serde_seconds_opt"
    )]
    pub custom_duration: Option<TimeDelta>,
    #[serde(default)]
    pub frozen_range: Option<FrozenRange>,
    #[serde(default = "default_static_timeout_seconds")]
    pub static_timeout_seconds: u32,
    #[serde(default)]
    pub aggregation_function: AggregationFunction,
}

impl Default for ChartModeConfig {
    fn default() -> Self {
        Self {
            period: ChartPeriod::default(),
            preset_uid: None,
            custom_duration: None,
            frozen_range: None,
            static_timeout_seconds: DEFAULT_STATIC_TIMEOUT_SECONDS,
            aggregation_function: AggregationFunction::default(),
        }
    }
}

impl ChartModeConfig {
    #[must_use]
    pub fn with_period(mut self, period: ChartPeriod) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_preset_uid(mut self, uid: impl Into<String>) -> Self {
        self.preset_uid = Some(uid.into());
        self
    }

    #[must_use]
    pub fn with_custom_duration(mut self, duration: TimeDelta) -> Self {
        self.period = ChartPeriod::Custom;
        self.custom_duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_frozen_range(mut self, start: TaggedInstant, end: TaggedInstant) -> Self {
        self.frozen_range = Some(FrozenRange { start, end });
        self
    }

    #[must_use]
    pub fn with_static_timeout_seconds(mut self, seconds: u32) -> Self {
        self.static_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_aggregation_function(mut self, function: AggregationFunction) -> Self {
        self.aggregation_function = function;
        self
    }
}

/// What an Auto-mode chart shows: a named period or a preset-backed duration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct AutoSelection {
    period: ChartPeriod,
    preset_uid: Option<String>,
    custom_duration: Option<TimeDelta>,
}

/// Frozen range of a Static chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Preset whose window was frozen, when the range came from one.
    pub source_preset_uid: Option<String>,
}

impl StaticRange {
    #[must_use]
    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }

    fn same_bounds(&self, other: &StaticRange) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// Change a controller asks the dashboard to replay onto linked siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkBroadcast {
    PeriodChanged {
        preset_uid: String,
    },
    StaticRangeChanged {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_preset_uid: Option<String>,
    },
    AutoModeRestored,
}

/// Per-chart Auto/Static state machine.
///
/// Mutating operations take a `raise_events` flag. When `true` and the call
/// changed the chart, the returned [`LinkBroadcast`] is meant for the link
/// coordinator; calls replayed from a sibling pass `false` so propagation
/// never loops. Observers are notified either way.
pub struct ChartModeController {
    id: ChartId,
    state: ChartModeState,
    selection: AutoSelection,
    remembered: Option<AutoSelection>,
    static_range: Option<StaticRange>,
    last_limits: Option<XAxisLimits>,
    aggregation_function: AggregationFunction,
    observers: Vec<Box<dyn ChartObserver>>,
}

impl ChartModeController {
    /// Creates a controller; a valid persisted frozen range starts it in Static.
    ///
    /// Tagged instants are normalized with `display_offset`.
    #[must_use]
    pub fn new(
        id: ChartId,
        config: ChartModeConfig,
        display_offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        let selection = AutoSelection {
            period: config.period,
            preset_uid: config.preset_uid,
            custom_duration: config.custom_duration,
        };
        let mut controller = Self {
            id,
            state: ChartModeState {
                mode: ChartMode::Auto,
                last_interaction: None,
                timeout: clamp_static_timeout(config.static_timeout_seconds),
            },
            selection,
            remembered: None,
            static_range: None,
            last_limits: None,
            aggregation_function: config.aggregation_function,
            observers: Vec::new(),
        };

        if let Some(frozen) = config.frozen_range {
            let start = normalize_instant(frozen.start, display_offset);
            let end = normalize_instant(frozen.end, display_offset);
            if end > start {
                controller.enter_static(
                    StaticRange {
                        start,
                        end,
                        source_preset_uid: None,
                    },
                    now,
                );
            } else {
                warn!(
                    chart = %id,
                    %start,
                    %end,
                    "ignoring persisted frozen range with end <= start"
                );
            }
        }
        controller
    }

    #[must_use]
    pub fn id(&self) -> ChartId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> ChartMode {
        self.state.mode
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.state.mode == ChartMode::Static
    }

    #[must_use]
    pub fn state(&self) -> ChartModeState {
        self.state
    }

    #[must_use]
    pub fn period(&self) -> ChartPeriod {
        self.selection.period
    }

    #[must_use]
    pub fn selected_preset_uid(&self) -> Option<&str> {
        self.selection.preset_uid.as_deref()
    }

    #[must_use]
    pub fn custom_duration(&self) -> Option<TimeDelta> {
        self.selection.custom_duration
    }

    /// Preset uid that will be restored when Static mode ends.
    #[must_use]
    pub fn remembered_preset_uid(&self) -> Option<&str> {
        self.remembered
            .as_ref()
            .and_then(|selection| selection.preset_uid.as_deref())
    }

    #[must_use]
    pub fn remembered_period(&self) -> Option<ChartPeriod> {
        self.remembered.as_ref().map(|selection| selection.period)
    }

    #[must_use]
    pub fn static_range(&self) -> Option<&StaticRange> {
        self.static_range.as_ref()
    }

    #[must_use]
    pub fn last_x_limits(&self) -> Option<XAxisLimits> {
        self.last_limits
    }

    #[must_use]
    pub fn static_timeout(&self) -> TimeDelta {
        self.state.timeout
    }

    /// Updates the Static timeout; values below the floor are raised to it.
    pub fn set_static_timeout_seconds(&mut self, seconds: u32) {
        self.state.timeout = clamp_static_timeout(seconds);
    }

    #[must_use]
    pub fn aggregation_function(&self) -> AggregationFunction {
        self.aggregation_function
    }

    pub fn set_aggregation_function(&mut self, function: AggregationFunction) {
        self.aggregation_function = function;
    }

    /// Remaining Static time; `None` in Auto mode.
    #[must_use]
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.state.countdown(now)
    }

    /// Freezes the chart to `[start, end)`.
    ///
    /// `end <= start` is silently ignored. Re-entering the current range only
    /// restarts the countdown.
    pub fn set_static_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
        raise_events: bool,
    ) -> Option<LinkBroadcast> {
        self.set_static_range_with_source(start, end, None, now, raise_events)
    }

    /// Like [`Self::set_static_range`], recording the preset the range came from.
    pub fn set_static_range_with_source(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_preset_uid: Option<String>,
        now: DateTime<Utc>,
        raise_events: bool,
    ) -> Option<LinkBroadcast> {
        if end <= start {
            debug!(chart = %self.id, %start, %end, "rejecting static range with end <= start");
            return None;
        }
        let range = StaticRange {
            start,
            end,
            source_preset_uid,
        };
        if !self.enter_static(range, now) {
            return None;
        }
        let range = self.static_range.as_ref()?;
        raise_events.then(|| LinkBroadcast::StaticRangeChanged {
            start: range.start,
            end: range.end,
            source_preset_uid: range.source_preset_uid.clone(),
        })
    }

    /// Freezes the window currently shown in Auto mode, keeping the selected
    /// preset as the frozen span's source. While Static, restarts the countdown.
    pub fn freeze_current_window(
        &mut self,
        now: DateTime<Utc>,
        raise_events: bool,
    ) -> Option<LinkBroadcast> {
        if let Some(range) = self.static_range.clone() {
            self.enter_static(range, now);
            return None;
        }
        let window = self.resolve_window(now);
        let source = self.selection.preset_uid.clone();
        self.set_static_range_with_source(window.start(), window.end(), source, now, raise_events)
    }

    /// Handles a user pan/zoom/double-click/drag-select normalized to new
    /// visible x-axis limits (Unix seconds).
    ///
    /// Limits are compared with the last remembered ones, or with the window
    /// the chart resolves at `now` when none are remembered (new chart, or
    /// just back in Auto). A change larger than the epsilon freezes the chart
    /// to the new limits.
    pub fn apply_user_x_limits(
        &mut self,
        kind: InteractionKind,
        limits: XAxisLimits,
        now: DateTime<Utc>,
        raise_events: bool,
    ) -> Option<LinkBroadcast> {
        if !limits.is_valid() {
            debug!(chart = %self.id, ?kind, ?limits, "ignoring invalid x-axis limits");
            return None;
        }

        let previous = match self.last_limits.replace(limits) {
            Some(previous) => previous,
            None => {
                trace!(
                    chart = %self.id,
                    ?kind,
                    "no remembered x-axis limits; comparing with resolved window"
                );
                window_limits(self.resolve_window(now))
            }
        };
        if !limits.differs_from(previous) {
            return None;
        }

        let (Some(start), Some(end)) = (
            unix_seconds_to_datetime(limits.min),
            unix_seconds_to_datetime(limits.max),
        ) else {
            debug!(chart = %self.id, ?limits, "x-axis limits outside representable time");
            return None;
        };
        debug!(chart = %self.id, ?kind, %start, %end, "user interaction changed x-axis limits");
        self.set_static_range(start, end, now, raise_events)
    }

    /// Records limits applied by the render layer itself, without a transition.
    pub fn sync_x_limits(&mut self, limits: XAxisLimits) {
        if limits.is_valid() {
            self.last_limits = Some(limits);
        }
    }

    /// Leaves Static mode, restoring the remembered Auto selection.
    pub fn exit_static_mode(&mut self, raise_events: bool) -> Option<LinkBroadcast> {
        if !self.leave_static() {
            return None;
        }
        raise_events.then_some(LinkBroadcast::AutoModeRestored)
    }

    /// Countdown tick. Returns the Auto-restore broadcast when the timeout expired.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<LinkBroadcast> {
        let remaining = self.state.countdown(now)?;
        if remaining > TimeDelta::zero() {
            self.notify(ChartEvent::CountdownUpdated { remaining });
            return None;
        }
        debug!(chart = %self.id, "static timeout expired");
        self.exit_static_mode(true)
    }

    /// Selects a preset by uid; an unknown uid selects the fallback preset.
    ///
    /// Selecting while Static is an implicit exit.
    pub fn set_period_preset<R>(
        &mut self,
        preset_uid: &str,
        repository: &R,
        raise_events: bool,
    ) -> Option<LinkBroadcast>
    where
        R: PresetRepository + ?Sized,
    {
        let presets = repository.presets();
        let preset = match find_matching_index(preset_uid, presets) {
            Some(index) => presets[index].clone(),
            None => {
                let fallback = fallback_preset(presets);
                warn!(
                    chart = %self.id,
                    requested = preset_uid,
                    fallback = %fallback.uid,
                    "unknown preset uid; selecting fallback preset"
                );
                fallback
            }
        };

        self.leave_static();
        self.last_limits = None;
        self.selection = AutoSelection {
            period: ChartPeriod::Custom,
            preset_uid: Some(preset.uid.clone()),
            custom_duration: Some(preset.duration()),
        };
        debug!(chart = %self.id, preset = %preset.uid, "period preset selected");
        self.notify(ChartEvent::PeriodChanged {
            preset_uid: Some(preset.uid.clone()),
        });

        raise_events.then_some(LinkBroadcast::PeriodChanged {
            preset_uid: preset.uid,
        })
    }

    /// Selects a named period (or a custom duration) without a preset.
    ///
    /// Local to this chart; selecting while Static is an implicit exit.
    pub fn set_period(&mut self, period: ChartPeriod, custom_duration: Option<TimeDelta>) {
        self.leave_static();
        self.last_limits = None;
        self.selection = AutoSelection {
            period,
            preset_uid: None,
            custom_duration: custom_duration.filter(|duration| *duration > TimeDelta::zero()),
        };
        self.notify(ChartEvent::PeriodChanged { preset_uid: None });
    }

    /// Re-resolves preset references after a whole-list replacement.
    ///
    /// Deleted uids fall back to [`fallback_preset`]; edited durations are re-read.
    pub fn reconcile_presets<R>(&mut self, repository: &R)
    where
        R: PresetRepository + ?Sized,
    {
        let presets = repository.presets();
        let changed = reconcile_selection(&mut self.selection, presets);
        if let Some(remembered) = self.remembered.as_mut() {
            reconcile_selection(remembered, presets);
        }
        if let Some(range) = self.static_range.as_mut() {
            if range
                .source_preset_uid
                .as_deref()
                .is_some_and(|uid| find_matching_index(uid, presets).is_none())
            {
                range.source_preset_uid = None;
            }
        }

        if changed {
            if self.state.mode == ChartMode::Auto {
                self.last_limits = None;
            }
            debug!(
                chart = %self.id,
                preset = ?self.selection.preset_uid,
                "selection re-resolved after preset replacement"
            );
            self.notify(ChartEvent::PeriodChanged {
                preset_uid: self.selection.preset_uid.clone(),
            });
        }
    }

    /// Concrete window for this refresh.
    #[must_use]
    pub fn resolve_window(&self, now: DateTime<Utc>) -> TimeWindow {
        let spec = match (&self.static_range, self.state.mode) {
            (Some(range), ChartMode::Static) => WindowSpec::frozen(range.start, range.end),
            _ => WindowSpec {
                period: self.selection.period,
                is_static: false,
                custom_start: None,
                custom_end: None,
                custom_duration: self.selection.custom_duration,
            },
        };
        resolve_time_window(spec, now)
    }

    #[must_use]
    pub fn resolve_aggregation<R>(
        &self,
        window: TimeWindow,
        repository: &R,
        tuning: AggregationTuning,
    ) -> ResolvedAggregation
    where
        R: PresetRepository + ?Sized,
    {
        let query = AggregationQuery {
            mode: self.state.mode,
            span: window.span(),
            static_source_preset_uid: self
                .static_range
                .as_ref()
                .and_then(|range| range.source_preset_uid.as_deref()),
            selected_preset_uid: self.selection.preset_uid.as_deref(),
            period: self.selection.period,
        };
        resolve_aggregation_interval(query, repository, tuning)
    }

    /// Window plus bucket width for the data source.
    #[must_use]
    pub fn resolve_request<R>(
        &self,
        now: DateTime<Utc>,
        repository: &R,
        tuning: AggregationTuning,
    ) -> AggregationRequest
    where
        R: PresetRepository + ?Sized,
    {
        let window = self.resolve_window(now);
        let aggregation = self.resolve_aggregation(window, repository, tuning);
        AggregationRequest {
            window,
            interval: aggregation.interval,
            function: self.aggregation_function,
            period: self.selection.period,
            custom_duration: self.selection.custom_duration,
        }
    }

    /// Tells observers a refresh completed with `request`.
    pub fn publish_refresh(&mut self, request: &AggregationRequest) {
        let aggregation_label = format_aggregation_label(request.function, request.interval);
        self.notify(ChartEvent::Refreshed { aggregation_label });
    }

    /// Registers an observer with unique identifier.
    pub fn register_observer(&mut self, observer: Box<dyn ChartObserver>) -> ChartResult<()> {
        let observer_id = observer.id().to_owned();
        if observer_id.is_empty() {
            return Err(ChartError::InvalidData(
                "observer id must not be empty".to_owned(),
            ));
        }
        if self.observers.iter().any(|entry| entry.id() == observer_id) {
            return Err(ChartError::InvalidData(format!(
                "observer with id `{observer_id}` is already registered"
            )));
        }
        self.observers.push(observer);
        Ok(())
    }

    /// Unregisters an observer by id. Returns `true` when removed.
    pub fn unregister_observer(&mut self, observer_id: &str) -> bool {
        if let Some(position) = self
            .observers
            .iter()
            .position(|entry| entry.id() == observer_id)
        {
            self.observers.remove(position);
            return true;
        }
        false
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` when the chart changed (entered Static or moved its range).
    fn enter_static(&mut self, range: StaticRange, now: DateTime<Utc>) -> bool {
        self.state.last_interaction = Some(now);
        self.last_limits = Some(XAxisLimits::new(
            datetime_to_unix_seconds(range.start),
            datetime_to_unix_seconds(range.end),
        ));

        let same_bounds = self
            .static_range
            .as_ref()
            .is_some_and(|current| current.same_bounds(&range));
        match self.state.mode {
            ChartMode::Static if same_bounds => {
                trace!(chart = %self.id, "static range re-entered; countdown restarted");
                self.notify(ChartEvent::CountdownUpdated {
                    remaining: self.state.timeout,
                });
                false
            }
            ChartMode::Static => {
                let span = range.span();
                let (start, end) = (range.start, range.end);
                self.static_range = Some(range);
                self.selection.custom_duration = Some(span);
                debug!(chart = %self.id, %start, %end, "static range moved");
                self.notify(ChartEvent::StaticRangeChanged { start, end });
                true
            }
            ChartMode::Auto => {
                let span = range.span();
                let (start, end) = (range.start, range.end);
                self.remembered = Some(std::mem::replace(
                    &mut self.selection,
                    AutoSelection {
                        period: ChartPeriod::Custom,
                        preset_uid: None,
                        custom_duration: Some(span),
                    },
                ));
                self.static_range = Some(range);
                self.state.mode = ChartMode::Static;
                debug!(chart = %self.id, %start, %end, "entered static mode");
                self.notify(ChartEvent::ModeChanged {
                    mode: ChartMode::Static,
                });
                self.notify(ChartEvent::StaticRangeChanged { start, end });
                true
            }
        }
    }

    /// Returns `true` when the chart was Static.
    fn leave_static(&mut self) -> bool {
        if self.state.mode != ChartMode::Static {
            return false;
        }
        self.state.mode = ChartMode::Auto;
        self.state.last_interaction = None;
        self.static_range = None;
        self.last_limits = None;
        if let Some(remembered) = self.remembered.take() {
            self.selection = remembered;
        }
        debug!(
            chart = %self.id,
            period = ?self.selection.period,
            preset = ?self.selection.preset_uid,
            "restored auto mode"
        );
        self.notify(ChartEvent::ModeChanged {
            mode: ChartMode::Auto,
        });
        true
    }

    fn notify(&mut self, event: ChartEvent) {
        for observer in &mut self.observers {
            observer.on_chart_event(self.id, &event);
        }
    }
}

fn window_limits(window: TimeWindow) -> XAxisLimits {
    XAxisLimits::new(
        datetime_to_unix_seconds(window.start()),
        datetime_to_unix_seconds(window.end()),
    )
}

fn reconcile_selection(selection: &mut AutoSelection, presets: &[PeriodPreset]) -> bool {
    let Some(uid) = selection.preset_uid.as_deref() else {
        return false;
    };
    let preset = match find_matching_index(uid, presets) {
        Some(index) => &presets[index],
        None => {
            let fallback = fallback_preset(presets);
            warn!(missing = uid, fallback = %fallback.uid, "selected preset no longer exists");
            let changed = selection.preset_uid.as_deref() != Some(fallback.uid.as_str())
                || selection.custom_duration != Some(fallback.duration());
            selection.custom_duration = Some(fallback.duration());
            selection.preset_uid = Some(fallback.uid);
            selection.period = ChartPeriod::Custom;
            return changed;
        }
    };
    let duration = preset.duration();
    let changed = selection.custom_duration != Some(duration);
    selection.custom_duration = Some(duration);
    changed
}
