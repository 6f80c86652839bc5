pub mod instant;
pub mod period;
pub mod preset;
pub mod primitives;
pub mod types;

pub use instant::{InstantKind, TaggedInstant, normalize_instant, to_display_time};
pub use period::ChartPeriod;
pub use preset::{
    BUILTIN_FALLBACK_PRESET_UID, PeriodPreset, PeriodUnit, builtin_fallback_preset,
    default_presets,
};
pub use primitives::{datetime_to_unix_seconds, delta_to_seconds, unix_seconds_to_datetime};
pub use types::{
    AggregationFunction, AggregationRequest, ChartId, NumericFormat, Sample, TimeWindow,
};
