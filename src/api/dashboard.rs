use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::core::{
    AggregationRequest, ChartId, ChartPeriod, PeriodPreset, datetime_to_unix_seconds,
};
use crate::error::{ChartError, ChartResult};
use crate::extensions::ChartObserver;
use crate::interaction::{ChartMode, InteractionKind, XAxisLimits};

use super::{
    ChartModeConfig, ChartModeController, ChartSettings, DashboardLinkCoordinator, HoverReadout,
    PeriodPresetCatalog, PresetRepository, SampleSource, SeriesDescriptor, SeriesHoverSnapshot,
    TimerHandle, TimerRegistry, build_hover_readout,
};

/// Cadence of the per-chart Static countdown.
pub const COUNTDOWN_TICK_SECONDS: i64 = 1;

/// Payload of the timers a dashboard schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardTimer {
    Refresh,
    Countdown(ChartId),
}

#[derive(Debug, Clone, Default)]
struct ChartTile {
    series: Vec<SeriesDescriptor>,
    snapshots: Vec<SeriesHoverSnapshot>,
    last_request: Option<AggregationRequest>,
}

/// What a chart shows, compared before and after a user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChartView {
    mode: ChartMode,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    period: ChartPeriod,
    preset_uid: Option<String>,
    custom_duration: Option<TimeDelta>,
}

/// One open monitoring dashboard: its charts, timers and data source.
///
/// The host drives it by calling [`Self::pump`] from its event loop and
/// forwarding user gestures. After [`Self::dispose`] no timer fires again and
/// user operations are rejected.
pub struct MonitorDashboard<S: SampleSource> {
    catalog: PeriodPresetCatalog,
    coordinator: DashboardLinkCoordinator,
    settings: ChartSettings,
    display_offset: FixedOffset,
    timers: TimerRegistry<DashboardTimer>,
    refresh_timer: Option<TimerHandle>,
    countdown_timers: IndexMap<ChartId, TimerHandle>,
    tiles: IndexMap<ChartId, ChartTile>,
    source: S,
    disposed: bool,
}

impl<S: SampleSource> MonitorDashboard<S> {
    pub fn new(
        settings: ChartSettings,
        display_offset: FixedOffset,
        source: S,
        now: DateTime<Utc>,
    ) -> ChartResult<Self> {
        let settings = settings.sanitized();
        let mut catalog = PeriodPresetCatalog::new();
        catalog.set_presets_or_default(settings.presets.clone())?;

        let mut dashboard = Self {
            catalog,
            coordinator: DashboardLinkCoordinator::new(settings.link_charts),
            settings,
            display_offset,
            timers: TimerRegistry::new(),
            refresh_timer: None,
            countdown_timers: IndexMap::new(),
            tiles: IndexMap::new(),
            source,
            disposed: false,
        };
        dashboard.schedule_refresh(now)?;
        Ok(dashboard)
    }

    #[must_use]
    pub fn settings(&self) -> &ChartSettings {
        &self.settings
    }

    #[must_use]
    pub fn catalog(&self) -> &PeriodPresetCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn coordinator(&self) -> &DashboardLinkCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn chart(&self, id: ChartId) -> Option<&ChartModeController> {
        self.coordinator.chart(id)
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    #[must_use]
    pub fn display_offset(&self) -> FixedOffset {
        self.display_offset
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn active_timer_count(&self) -> usize {
        self.timers.active_count()
    }

    /// Latest hover snapshots of a chart, one per series.
    #[must_use]
    pub fn snapshots(&self, id: ChartId) -> Option<&[SeriesHoverSnapshot]> {
        self.tiles.get(&id).map(|tile| tile.snapshots.as_slice())
    }

    /// Request used by the latest refresh of a chart.
    #[must_use]
    pub fn last_request(&self, id: ChartId) -> Option<AggregationRequest> {
        self.tiles.get(&id).and_then(|tile| tile.last_request)
    }

    /// Creates a chart tile and starts its countdown timer.
    pub fn add_chart(
        &mut self,
        id: ChartId,
        config: ChartModeConfig,
        series: Vec<SeriesDescriptor>,
        now: DateTime<Utc>,
    ) -> ChartResult<()> {
        self.ensure_active()?;
        let mut controller = ChartModeController::new(id, config, self.display_offset, now);
        controller.set_static_timeout_seconds(self.settings.static_mode_timeout_seconds);
        self.coordinator.add_chart(controller)?;

        let handle = match self.timers.every(
            TimeDelta::seconds(COUNTDOWN_TICK_SECONDS),
            DashboardTimer::Countdown(id),
            now,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.coordinator.remove_chart(id);
                return Err(err);
            }
        };
        self.countdown_timers.insert(id, handle);
        self.tiles.insert(
            id,
            ChartTile {
                series,
                ..ChartTile::default()
            },
        );
        debug!(chart = %id, charts = self.coordinator.len(), "chart added to dashboard");
        Ok(())
    }

    /// Destroys a chart tile and stops its countdown timer.
    pub fn remove_chart(&mut self, id: ChartId) -> Option<ChartModeController> {
        if let Some(handle) = self.countdown_timers.shift_remove(&id) {
            self.timers.cancel(handle);
        }
        self.tiles.shift_remove(&id);
        let removed = self.coordinator.remove_chart(id);
        if removed.is_some() {
            debug!(chart = %id, "chart removed from dashboard");
        }
        removed
    }

    pub fn register_observer(
        &mut self,
        id: ChartId,
        observer: Box<dyn ChartObserver>,
    ) -> ChartResult<()> {
        self.coordinator
            .chart_mut(id)
            .ok_or(ChartError::UnknownChart { id: id.raw() })?
            .register_observer(observer)
    }

    /// Replaces the preset list (empty selects the built-in set) and
    /// re-resolves every chart's preset references.
    pub fn set_presets(&mut self, presets: Vec<PeriodPreset>) -> ChartResult<()> {
        self.ensure_active()?;
        self.catalog.set_presets_or_default(presets)?;
        self.settings.presets = self.catalog.presets().to_vec();
        self.coordinator.reconcile_presets(&self.catalog);
        Ok(())
    }

    /// Applies an edited settings surface to the running dashboard.
    pub fn apply_settings(&mut self, settings: ChartSettings, now: DateTime<Utc>) -> ChartResult<()> {
        self.ensure_active()?;
        let settings = settings.sanitized();
        let reschedule = settings.refresh_interval_seconds != self.settings.refresh_interval_seconds;

        if settings.presets != self.settings.presets {
            self.catalog.set_presets_or_default(settings.presets.clone())?;
            self.coordinator.reconcile_presets(&self.catalog);
        }
        self.coordinator.set_linked(settings.link_charts);
        let chart_ids: Vec<ChartId> = self.coordinator.chart_ids().collect();
        for id in chart_ids {
            if let Some(chart) = self.coordinator.chart_mut(id) {
                chart.set_static_timeout_seconds(settings.static_mode_timeout_seconds);
            }
        }
        self.settings = settings;

        if reschedule {
            self.schedule_refresh(now)?;
        }
        debug!(
            linked = self.settings.link_charts,
            refresh_seconds = self.settings.refresh_interval_seconds,
            "dashboard settings applied"
        );
        Ok(())
    }

    /// Dispatches every timer due at `now`. Returns the number of timers fired.
    pub fn pump(&mut self, now: DateTime<Utc>) -> usize {
        if self.disposed {
            return 0;
        }
        let due = self.timers.poll_due(now);
        let fired = due.len();
        for timer in due {
            match timer {
                DashboardTimer::Refresh => self.refresh(now),
                DashboardTimer::Countdown(id) => self.countdown_tick(id, now),
            }
        }
        fired
    }

    /// Re-queries every chart.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        let chart_ids: Vec<ChartId> = self.coordinator.chart_ids().collect();
        for id in chart_ids {
            if let Err(err) = self.refresh_chart(id, now) {
                warn!(chart = %id, error = %err, "chart refresh skipped");
            }
        }
    }

    /// Resolves the chart's request, queries each series and replaces the
    /// hover snapshots. A failing series is left empty for this cycle.
    pub fn refresh_chart(&mut self, id: ChartId, now: DateTime<Utc>) -> ChartResult<()> {
        if self.disposed {
            return Ok(());
        }
        let tuning = self.settings.aggregation_tuning();
        let request = self
            .coordinator
            .chart(id)
            .ok_or(ChartError::UnknownChart { id: id.raw() })?
            .resolve_request(now, &self.catalog, tuning);
        let tile = self
            .tiles
            .get_mut(&id)
            .ok_or(ChartError::UnknownChart { id: id.raw() })?;

        tile.snapshots = tile
            .series
            .iter()
            .map(|series| fetch_snapshot(&mut self.source, id, series, &request))
            .collect();
        tile.last_request = Some(request);

        if let Some(chart) = self.coordinator.chart_mut(id) {
            chart.sync_x_limits(XAxisLimits::new(
                datetime_to_unix_seconds(request.window.start()),
                datetime_to_unix_seconds(request.window.end()),
            ));
            chart.publish_refresh(&request);
        }
        trace!(
            chart = %id,
            start = %request.window.start(),
            end = %request.window.end(),
            interval_s = request.interval.num_seconds(),
            "chart refreshed"
        );
        Ok(())
    }

    /// Synchronized readout for a pointer at `x` (Unix seconds) over a chart.
    #[must_use]
    pub fn hover(&self, id: ChartId, x: f64) -> Option<HoverReadout> {
        let tile = self.tiles.get(&id)?;
        build_hover_readout(x, &tile.snapshots)
    }

    pub fn select_preset(
        &mut self,
        id: ChartId,
        preset_uid: &str,
        now: DateTime<Utc>,
    ) -> ChartResult<usize> {
        self.ensure_active()?;
        let before = self.chart_view(id);
        let updated = self
            .coordinator
            .select_preset(id, preset_uid, &self.catalog, now)?;
        self.refresh_after_change(id, before, updated, now);
        Ok(updated)
    }

    pub fn set_period(
        &mut self,
        id: ChartId,
        period: ChartPeriod,
        custom_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> ChartResult<()> {
        self.ensure_active()?;
        let before = self.chart_view(id);
        self.coordinator
            .chart_mut(id)
            .ok_or(ChartError::UnknownChart { id: id.raw() })?
            .set_period(period, custom_duration);
        self.refresh_after_change(id, before, 0, now);
        Ok(())
    }

    pub fn set_static_range(
        &mut self,
        id: ChartId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ChartResult<usize> {
        self.ensure_active()?;
        let before = self.chart_view(id);
        let updated = self
            .coordinator
            .set_static_range(id, start, end, &self.catalog, now)?;
        self.refresh_after_change(id, before, updated, now);
        Ok(updated)
    }

    pub fn freeze_current_window(&mut self, id: ChartId, now: DateTime<Utc>) -> ChartResult<usize> {
        self.ensure_active()?;
        let before = self.chart_view(id);
        let updated = self
            .coordinator
            .freeze_current_window(id, &self.catalog, now)?;
        self.refresh_after_change(id, before, updated, now);
        Ok(updated)
    }

    pub fn apply_user_x_limits(
        &mut self,
        id: ChartId,
        kind: InteractionKind,
        limits: XAxisLimits,
        now: DateTime<Utc>,
    ) -> ChartResult<usize> {
        self.ensure_active()?;
        let before = self.chart_view(id);
        let updated = self
            .coordinator
            .apply_user_x_limits(id, kind, limits, &self.catalog, now)?;
        self.refresh_after_change(id, before, updated, now);
        Ok(updated)
    }

    pub fn exit_static_mode(&mut self, id: ChartId, now: DateTime<Utc>) -> ChartResult<usize> {
        self.ensure_active()?;
        let before = self.chart_view(id);
        let updated = self.coordinator.exit_static_mode(id, &self.catalog, now)?;
        self.refresh_after_change(id, before, updated, now);
        Ok(updated)
    }

    /// Stops every timer. Later pumps do nothing and user operations fail.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.timers.clear();
        self.refresh_timer = None;
        self.countdown_timers.clear();
        self.disposed = true;
        debug!(charts = self.coordinator.len(), "dashboard disposed");
    }

    fn ensure_active(&self) -> ChartResult<()> {
        if self.disposed {
            return Err(ChartError::InvalidData(
                "dashboard has been disposed".to_owned(),
            ));
        }
        Ok(())
    }

    fn schedule_refresh(&mut self, now: DateTime<Utc>) -> ChartResult<()> {
        if let Some(handle) = self.refresh_timer.take() {
            self.timers.cancel(handle);
        }
        let interval = TimeDelta::seconds(i64::from(self.settings.refresh_interval_seconds));
        self.refresh_timer = Some(self.timers.every(interval, DashboardTimer::Refresh, now)?);
        Ok(())
    }

    fn chart_view(&self, id: ChartId) -> Option<ChartView> {
        self.coordinator.chart(id).map(|chart| ChartView {
            mode: chart.mode(),
            range: chart
                .static_range()
                .map(|range| (range.start, range.end)),
            period: chart.period(),
            preset_uid: chart.selected_preset_uid().map(str::to_owned),
            custom_duration: chart.custom_duration(),
        })
    }

    /// Re-queries the charts a user transition changed: every chart when it
    /// reached linked siblings, otherwise the source chart when its view moved.
    fn refresh_after_change(
        &mut self,
        id: ChartId,
        before: Option<ChartView>,
        updated: usize,
        now: DateTime<Utc>,
    ) {
        let targets: Vec<ChartId> = if updated > 0 {
            self.coordinator.chart_ids().collect()
        } else if self.chart_view(id) != before {
            vec![id]
        } else {
            return;
        };
        for chart_id in targets {
            if let Err(err) = self.refresh_chart(chart_id, now) {
                warn!(chart = %chart_id, error = %err, "refresh after user change failed");
            }
        }
    }

    fn countdown_tick(&mut self, id: ChartId, now: DateTime<Utc>) {
        let static_before: Vec<ChartId> = self
            .coordinator
            .charts()
            .filter(|chart| chart.is_static())
            .map(ChartModeController::id)
            .collect();

        if let Err(err) = self.coordinator.tick_chart(id, &self.catalog, now) {
            warn!(chart = %id, error = %err, "countdown tick for unknown chart");
            return;
        }

        for chart_id in static_before {
            let restored = self
                .coordinator
                .chart(chart_id)
                .is_some_and(|chart| !chart.is_static());
            if restored {
                if let Err(err) = self.refresh_chart(chart_id, now) {
                    warn!(chart = %chart_id, error = %err, "refresh after auto restore failed");
                }
            }
        }
    }
}

fn fetch_snapshot<S: SampleSource>(
    source: &mut S,
    chart: ChartId,
    series: &SeriesDescriptor,
    request: &AggregationRequest,
) -> SeriesHoverSnapshot {
    let snapshot = source
        .get_samples(&series.metric, request)
        .and_then(|samples| {
            SeriesHoverSnapshot::from_samples(
                series.label.clone(),
                series.unit.clone(),
                series.numeric_format,
                samples,
            )
        });
    match snapshot {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(
                %chart,
                metric = %series.metric,
                error = %err,
                "sample query failed; series left empty for this cycle"
            );
            SeriesHoverSnapshot::empty(
                series.label.clone(),
                series.unit.clone(),
                series.numeric_format,
            )
        }
    }
}
