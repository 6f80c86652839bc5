use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::core::ChartId;
use crate::error::{ChartError, ChartResult};
use crate::interaction::{InteractionKind, XAxisLimits};

use super::{ChartModeController, LinkBroadcast, PresetRepository};

/// Chart controllers of one dashboard plus the dashboard-wide link flag.
///
/// Membership follows tile lifetime: charts are added when their tile is
/// created and removed when it is destroyed. Insertion order is the replay
/// order for propagation.
#[derive(Default)]
pub struct DashboardLinkCoordinator {
    charts: IndexMap<ChartId, ChartModeController>,
    linked: bool,
}

impl DashboardLinkCoordinator {
    #[must_use]
    pub fn new(linked: bool) -> Self {
        Self {
            charts: IndexMap::new(),
            linked,
        }
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn set_linked(&mut self, linked: bool) {
        if self.linked != linked {
            debug!(linked, "dashboard chart linking changed");
        }
        self.linked = linked;
    }

    pub fn add_chart(&mut self, controller: ChartModeController) -> ChartResult<()> {
        let id = controller.id();
        if self.charts.contains_key(&id) {
            return Err(ChartError::DuplicateChart { id: id.raw() });
        }
        self.charts.insert(id, controller);
        Ok(())
    }

    pub fn remove_chart(&mut self, id: ChartId) -> Option<ChartModeController> {
        self.charts.shift_remove(&id)
    }

    #[must_use]
    pub fn chart(&self, id: ChartId) -> Option<&ChartModeController> {
        self.charts.get(&id)
    }

    #[must_use]
    pub fn chart_mut(&mut self, id: ChartId) -> Option<&mut ChartModeController> {
        self.charts.get_mut(&id)
    }

    pub fn chart_ids(&self) -> impl Iterator<Item = ChartId> + '_ {
        self.charts.keys().copied()
    }

    pub fn charts(&self) -> impl Iterator<Item = &ChartModeController> {
        self.charts.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.charts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Replays a preset selection onto every sibling of `source`.
    ///
    /// Returns the number of siblings updated; zero when linking is off.
    pub fn period_changed<R>(&mut self, source: ChartId, preset_uid: &str, repository: &R) -> usize
    where
        R: PresetRepository + ?Sized,
    {
        self.for_each_sibling(source, |sibling| {
            sibling.set_period_preset(preset_uid, repository, false);
        })
    }

    /// Replays a frozen range onto every sibling of `source`.
    pub fn static_range_changed(
        &mut self,
        source: ChartId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_preset_uid: Option<&str>,
        now: DateTime<Utc>,
    ) -> usize {
        self.for_each_sibling(source, |sibling| {
            sibling.set_static_range_with_source(
                start,
                end,
                source_preset_uid.map(str::to_owned),
                now,
                false,
            );
        })
    }

    /// Replays an Auto restore onto every sibling of `source`.
    pub fn auto_mode_restored(&mut self, source: ChartId) -> usize {
        self.for_each_sibling(source, |sibling| {
            sibling.exit_static_mode(false);
        })
    }

    /// Routes a broadcast produced by `source` to the matching replay call.
    pub fn dispatch<R>(
        &mut self,
        source: ChartId,
        broadcast: LinkBroadcast,
        repository: &R,
        now: DateTime<Utc>,
    ) -> usize
    where
        R: PresetRepository + ?Sized,
    {
        match broadcast {
            LinkBroadcast::PeriodChanged { preset_uid } => {
                self.period_changed(source, &preset_uid, repository)
            }
            LinkBroadcast::StaticRangeChanged {
                start,
                end,
                source_preset_uid,
            } => self.static_range_changed(source, start, end, source_preset_uid.as_deref(), now),
            LinkBroadcast::AutoModeRestored => self.auto_mode_restored(source),
        }
    }

    /// User picked a preset on `source`.
    pub fn select_preset<R>(
        &mut self,
        source: ChartId,
        preset_uid: &str,
        repository: &R,
        now: DateTime<Utc>,
    ) -> ChartResult<usize>
    where
        R: PresetRepository + ?Sized,
    {
        let broadcast = self
            .source_mut(source)?
            .set_period_preset(preset_uid, repository, true);
        Ok(self.dispatch_optional(source, broadcast, repository, now))
    }

    /// Host code froze `source` to an explicit range.
    pub fn set_static_range<R>(
        &mut self,
        source: ChartId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        repository: &R,
        now: DateTime<Utc>,
    ) -> ChartResult<usize>
    where
        R: PresetRepository + ?Sized,
    {
        let broadcast = self
            .source_mut(source)?
            .set_static_range(start, end, now, true);
        Ok(self.dispatch_optional(source, broadcast, repository, now))
    }

    /// User froze the window currently shown by `source`.
    pub fn freeze_current_window<R>(
        &mut self,
        source: ChartId,
        repository: &R,
        now: DateTime<Utc>,
    ) -> ChartResult<usize>
    where
        R: PresetRepository + ?Sized,
    {
        let broadcast = self.source_mut(source)?.freeze_current_window(now, true);
        Ok(self.dispatch_optional(source, broadcast, repository, now))
    }

    /// User gesture changed the visible x-axis limits of `source`.
    pub fn apply_user_x_limits<R>(
        &mut self,
        source: ChartId,
        kind: InteractionKind,
        limits: XAxisLimits,
        repository: &R,
        now: DateTime<Utc>,
    ) -> ChartResult<usize>
    where
        R: PresetRepository + ?Sized,
    {
        let broadcast = self
            .source_mut(source)?
            .apply_user_x_limits(kind, limits, now, true);
        Ok(self.dispatch_optional(source, broadcast, repository, now))
    }

    /// User asked `source` to go back to Auto.
    pub fn exit_static_mode<R>(
        &mut self,
        source: ChartId,
        repository: &R,
        now: DateTime<Utc>,
    ) -> ChartResult<usize>
    where
        R: PresetRepository + ?Sized,
    {
        let broadcast = self.source_mut(source)?.exit_static_mode(true);
        Ok(self.dispatch_optional(source, broadcast, repository, now))
    }

    /// Countdown tick for one chart; a timeout restore is propagated.
    pub fn tick_chart<R>(
        &mut self,
        id: ChartId,
        repository: &R,
        now: DateTime<Utc>,
    ) -> ChartResult<usize>
    where
        R: PresetRepository + ?Sized,
    {
        let broadcast = self.source_mut(id)?.tick(now);
        Ok(self.dispatch_optional(id, broadcast, repository, now))
    }

    /// Re-resolves preset references of every chart after a list replacement.
    pub fn reconcile_presets<R>(&mut self, repository: &R)
    where
        R: PresetRepository + ?Sized,
    {
        for chart in self.charts.values_mut() {
            chart.reconcile_presets(repository);
        }
    }

    fn source_mut(&mut self, id: ChartId) -> ChartResult<&mut ChartModeController> {
        self.charts
            .get_mut(&id)
            .ok_or(ChartError::UnknownChart { id: id.raw() })
    }

    fn dispatch_optional<R>(
        &mut self,
        source: ChartId,
        broadcast: Option<LinkBroadcast>,
        repository: &R,
        now: DateTime<Utc>,
    ) -> usize
    where
        R: PresetRepository + ?Sized,
    {
        match broadcast {
            Some(broadcast) => self.dispatch(source, broadcast, repository, now),
            None => 0,
        }
    }

    fn for_each_sibling(
        &mut self,
        source: ChartId,
        mut apply: impl FnMut(&mut ChartModeController),
    ) -> usize {
        if !self.linked {
            trace!(%source, "linking disabled; change stays local");
            return 0;
        }
        let mut updated = 0;
        for (id, chart) in self.charts.iter_mut() {
            if *id == source {
                continue;
            }
            apply(chart);
            updated += 1;
        }
        debug!(%source, updated, "propagated change to linked charts");
        updated
    }
}
