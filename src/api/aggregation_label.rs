use chrono::TimeDelta;

use crate::core::AggregationFunction;

/// Human-readable aggregation caption shown next to a chart.
///
/// `"Aggregation: raw"` when the source returns unreduced samples, otherwise
/// `"Aggregation: HH:MM:SS"` with a `"<d>d "` prefix past one day.
#[must_use]
pub fn format_aggregation_label(function: AggregationFunction, interval: TimeDelta) -> String {
    if function == AggregationFunction::Raw {
        return "Aggregation: raw".to_owned();
    }
    format!("Aggregation: {}", format_interval(interval))
}

#[must_use]
pub fn format_interval(interval: TimeDelta) -> String {
    let total = interval.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_clock_style_intervals() {
        assert_eq!(
            format_aggregation_label(AggregationFunction::Average, TimeDelta::minutes(5)),
            "Aggregation: 00:05:00"
        );
        assert_eq!(format_interval(TimeDelta::seconds(3_725)), "01:02:05");
        assert_eq!(format_interval(TimeDelta::hours(26)), "1d 02:00:00");
    }

    #[test]
    fn raw_function_ignores_interval() {
        assert_eq!(
            format_aggregation_label(AggregationFunction::Raw, TimeDelta::seconds(15)),
            "Aggregation: raw"
        );
    }
}
