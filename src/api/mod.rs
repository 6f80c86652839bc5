mod aggregation_interval_resolver;
mod aggregation_label;
mod chart_mode_controller;
mod dashboard;
mod dashboard_link_coordinator;
mod hover_anchor_locator;
mod preset_catalog;
mod sample_source;
mod settings;
mod time_window_resolver;
mod timer_registry;

pub use aggregation_interval_resolver::{
    AggregationQuery, AggregationSource, AggregationTuning, DEFAULT_ROUNDING_STEP_SECONDS,
    DEFAULT_TARGET_POINT_COUNT, DEFAULT_TOLERANCE_PERCENT, MIN_TARGET_POINT_COUNT,
    ResolvedAggregation, automatic_interval, match_preset_within_tolerance,
    resolve_aggregation_interval,
};
pub use aggregation_label::{format_aggregation_label, format_interval};
pub use chart_mode_controller::{
    ChartModeConfig, ChartModeController, DEFAULT_STATIC_TIMEOUT_SECONDS, FrozenRange,
    LinkBroadcast, MIN_STATIC_TIMEOUT_SECONDS, StaticRange, clamp_static_timeout,
};
pub use dashboard::{COUNTDOWN_TICK_SECONDS, DashboardTimer, MonitorDashboard};
pub use dashboard_link_coordinator::DashboardLinkCoordinator;
pub use hover_anchor_locator::{
    HoverReadout, HoverValue, SeriesHoverSnapshot, build_hover_readout, locate_anchor,
    nearest_index,
};
pub use preset_catalog::{
    PeriodPresetCatalog, PresetRepository, fallback_preset, find_matching_index,
};
pub use sample_source::{SampleSource, SeriesDescriptor};
pub use settings::{
    CHART_SETTINGS_JSON_SCHEMA_V1, ChartSettings, ChartSettingsJsonContractV1,
    DEFAULT_REFRESH_INTERVAL_SECONDS,
};
pub use time_window_resolver::{WindowSpec, default_custom_duration, resolve_time_window};
pub use timer_registry::{TimerHandle, TimerId, TimerRegistry};
