use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::core::primitives::serde_seconds;
use crate::error::{ChartError, ChartResult};

pub const BUILTIN_FALLBACK_PRESET_UID: &str = "builtin-last-24-hours";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUnit {
    Minutes,
    Hours,
    Days,
}

impl PeriodUnit {
    #[must_use]
    pub fn seconds(self) -> i64 {
        match self {
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }
}

/// Named, reusable (duration, aggregation interval) pair offered for quick selection.
///
/// Identity is the `uid`; `name` and `value` may be edited without changing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodPreset {
    pub uid: String,
    pub name: String,
    pub value: u32,
    pub unit: PeriodUnit,
    #[serde(rename = "aggregation_interval_seconds", with = "serde_seconds")]
    pub aggregation_interval: TimeDelta,
}

impl PeriodPreset {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        value: u32,
        unit: PeriodUnit,
        aggregation_interval: TimeDelta,
    ) -> ChartResult<Self> {
        Self {
            uid: uid.into(),
            name: name.into(),
            value,
            unit,
            aggregation_interval,
        }
        .validate()
    }

    pub(crate) fn validate(self) -> ChartResult<Self> {
        if self.uid.trim().is_empty() {
            return Err(ChartError::InvalidData(
                "preset uid must not be empty".to_owned(),
            ));
        }
        if self.value == 0 {
            return Err(ChartError::InvalidData(format!(
                "preset `{}` value must be > 0",
                self.uid
            )));
        }
        if self.aggregation_interval <= TimeDelta::zero() {
            return Err(ChartError::InvalidData(format!(
                "preset `{}` aggregation interval must be > 0",
                self.uid
            )));
        }
        Ok(self)
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.value) * self.unit.seconds())
    }
}

/// Preset used when a candidate list is empty.
#[must_use]
pub fn builtin_fallback_preset() -> PeriodPreset {
    PeriodPreset {
        uid: BUILTIN_FALLBACK_PRESET_UID.to_owned(),
        name: "Last 24 Hours".to_owned(),
        value: 24,
        unit: PeriodUnit::Hours,
        aggregation_interval: TimeDelta::minutes(5),
    }
}

/// Built-in preset set substituted when settings deliver an empty list.
#[must_use]
pub fn default_presets() -> Vec<PeriodPreset> {
    let preset = |uid: &str, name: &str, value: u32, unit: PeriodUnit, agg: TimeDelta| {
        PeriodPreset {
            uid: uid.to_owned(),
            name: name.to_owned(),
            value,
            unit,
            aggregation_interval: agg,
        }
    };

    vec![
        preset(
            "builtin-last-15-minutes",
            "Last 15 Minutes",
            15,
            PeriodUnit::Minutes,
            TimeDelta::seconds(10),
        ),
        preset(
            "builtin-last-hour",
            "Last Hour",
            1,
            PeriodUnit::Hours,
            TimeDelta::seconds(30),
        ),
        preset(
            "builtin-last-6-hours",
            "Last 6 Hours",
            6,
            PeriodUnit::Hours,
            TimeDelta::minutes(2),
        ),
        builtin_fallback_preset(),
        preset(
            "builtin-last-7-days",
            "Last 7 Days",
            7,
            PeriodUnit::Days,
            TimeDelta::minutes(30),
        ),
        preset(
            "builtin-last-30-days",
            "Last 30 Days",
            30,
            PeriodUnit::Days,
            TimeDelta::hours(1),
        ),
    ]
}
