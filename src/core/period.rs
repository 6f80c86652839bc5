use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Relative window a chart shows while in Auto mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChartPeriod {
    Last15Minutes,
    LastHour,
    Last6Hours,
    #[default]
    Last24Hours,
    Last7Days,
    Last30Days,
    /// Explicit start instant or explicit duration supplied by the chart.
    Custom,
}

impl ChartPeriod {
    pub const NAMED: [ChartPeriod; 6] = [
        ChartPeriod::Last15Minutes,
        ChartPeriod::LastHour,
        ChartPeriod::Last6Hours,
        ChartPeriod::Last24Hours,
        ChartPeriod::Last7Days,
        ChartPeriod::Last30Days,
    ];

    /// Fixed offset back from "now"; `None` for [`ChartPeriod::Custom`].
    #[must_use]
    pub fn duration(self) -> Option<TimeDelta> {
        match self {
            Self::Last15Minutes => Some(TimeDelta::minutes(15)),
            Self::LastHour => Some(TimeDelta::hours(1)),
            Self::Last6Hours => Some(TimeDelta::hours(6)),
            Self::Last24Hours => Some(TimeDelta::hours(24)),
            Self::Last7Days => Some(TimeDelta::days(7)),
            Self::Last30Days => Some(TimeDelta::days(30)),
            Self::Custom => None,
        }
    }

    /// Recommended aggregation bucket when no preset is selected.
    #[must_use]
    pub fn recommended_aggregation_interval(self) -> Option<TimeDelta> {
        match self {
            Self::Last15Minutes => Some(TimeDelta::seconds(10)),
            Self::LastHour => Some(TimeDelta::seconds(30)),
            Self::Last6Hours => Some(TimeDelta::minutes(2)),
            Self::Last24Hours => Some(TimeDelta::minutes(5)),
            Self::Last7Days => Some(TimeDelta::minutes(30)),
            Self::Last30Days => Some(TimeDelta::hours(1)),
            Self::Custom => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Last15Minutes => "Last 15 Minutes",
            Self::LastHour => "Last Hour",
            Self::Last6Hours => "Last 6 Hours",
            Self::Last24Hours => "Last 24 Hours",
            Self::Last7Days => "Last 7 Days",
            Self::Last30Days => "Last 30 Days",
            Self::Custom => "Custom",
        }
    }
}
