use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PeriodPreset, default_presets};
use crate::error::{ChartError, ChartResult};

use super::{
    AggregationTuning, DEFAULT_ROUNDING_STEP_SECONDS, DEFAULT_STATIC_TIMEOUT_SECONDS,
    DEFAULT_TARGET_POINT_COUNT, DEFAULT_TOLERANCE_PERCENT, MIN_STATIC_TIMEOUT_SECONDS,
    MIN_TARGET_POINT_COUNT,
};

pub const CHART_SETTINGS_JSON_SCHEMA_V1: u32 = 1;
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u32 = 5;

fn default_static_mode_timeout_seconds() -> u32 {
    DEFAULT_STATIC_TIMEOUT_SECONDS
}

fn default_preset_match_tolerance_percent() -> f64 {
    DEFAULT_TOLERANCE_PERCENT
}

fn default_auto_target_point_count() -> u32 {
    DEFAULT_TARGET_POINT_COUNT
}

fn default_aggregation_rounding_step_seconds() -> u32 {
    DEFAULT_ROUNDING_STEP_SECONDS
}

fn default_refresh_interval_seconds() -> u32 {
    DEFAULT_REFRESH_INTERVAL_SECONDS
}

/// Persisted settings surface shared by all charts of a dashboard.
///
/// Values arrive from an external settings editor and may be out of range;
/// [`ChartSettings::sanitized`] clamps them before anything else reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSettings {
    #[serde(default)]
    pub presets: Vec<PeriodPreset>,
    #[serde(default = "default_static_mode_timeout_seconds")]
    pub static_mode_timeout_seconds: u32,
    #[serde(default = "default_preset_match_tolerance_percent")]
    pub preset_match_tolerance_percent: f64,
    #[serde(default = "default_auto_target_point_count")]
    pub auto_target_point_count: u32,
    #[serde(default = "default_aggregation_rounding_step_seconds")]
    pub aggregation_rounding_step_seconds: u32,
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u32,
    #[serde(default)]
    pub link_charts: bool,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            presets: default_presets(),
            static_mode_timeout_seconds: DEFAULT_STATIC_TIMEOUT_SECONDS,
            preset_match_tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            auto_target_point_count: DEFAULT_TARGET_POINT_COUNT,
            aggregation_rounding_step_seconds: DEFAULT_ROUNDING_STEP_SECONDS,
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
            link_charts: false,
        }
    }
}

impl ChartSettings {
    /// Clamps numeric fields and substitutes default presets for an empty list.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.presets.is_empty() {
            debug!("settings carry no presets; using built-in defaults");
            self.presets = default_presets();
        }
        self.static_mode_timeout_seconds = self
            .static_mode_timeout_seconds
            .max(MIN_STATIC_TIMEOUT_SECONDS);
        self.preset_match_tolerance_percent = if self.preset_match_tolerance_percent.is_nan() {
            DEFAULT_TOLERANCE_PERCENT
        } else {
            self.preset_match_tolerance_percent.clamp(0.0, 100.0)
        };
        self.auto_target_point_count = self.auto_target_point_count.max(MIN_TARGET_POINT_COUNT);
        self.aggregation_rounding_step_seconds = self.aggregation_rounding_step_seconds.max(1);
        self.refresh_interval_seconds = self.refresh_interval_seconds.max(1);
        self
    }

    #[must_use]
    pub fn aggregation_tuning(&self) -> AggregationTuning {
        AggregationTuning::new(
            self.preset_match_tolerance_percent,
            self.auto_target_point_count,
            self.aggregation_rounding_step_seconds,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSettingsJsonContractV1 {
    pub schema_version: u32,
    pub settings: ChartSettings,
}

impl ChartSettings {
    pub fn to_json_contract_v1_pretty(&self) -> ChartResult<String> {
        let payload = ChartSettingsJsonContractV1 {
            schema_version: CHART_SETTINGS_JSON_SCHEMA_V1,
            settings: self.clone(),
        };
        serde_json::to_string_pretty(&payload).map_err(|e| {
            ChartError::InvalidSettings(format!("failed to serialize settings contract v1: {e}"))
        })
    }

    /// Parses either a bare settings object or a versioned envelope, then
    /// sanitizes the result.
    pub fn from_json_compat_str(input: &str) -> ChartResult<Self> {
        let value: serde_json::Value = serde_json::from_str(input).map_err(|e| {
            ChartError::InvalidSettings(format!("failed to parse settings json: {e}"))
        })?;

        let settings = if value.get("schema_version").is_some() {
            let payload: ChartSettingsJsonContractV1 =
                serde_json::from_value(value).map_err(|e| {
                    ChartError::InvalidSettings(format!(
                        "failed to parse settings json payload: {e}"
                    ))
                })?;
            if payload.schema_version != CHART_SETTINGS_JSON_SCHEMA_V1 {
                return Err(ChartError::InvalidSettings(format!(
                    "unsupported settings schema version: {}",
                    payload.schema_version
                )));
            }
            payload.settings
        } else {
            serde_json::from_value::<ChartSettings>(value).map_err(|e| {
                ChartError::InvalidSettings(format!("failed to parse settings json: {e}"))
            })?
        };

        for preset in &settings.presets {
            preset.clone().validate().map_err(|e| {
                ChartError::InvalidSettings(format!("invalid preset in settings: {e}"))
            })?;
        }
        Ok(settings.sanitized())
    }
}
