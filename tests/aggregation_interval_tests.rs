use approx::assert_abs_diff_eq;
use chrono::TimeDelta;
use skyguard_charts::api::{
    AggregationQuery, AggregationSource, AggregationTuning, automatic_interval,
    format_aggregation_label, match_preset_within_tolerance, resolve_aggregation_interval,
};
use skyguard_charts::core::{AggregationFunction, ChartPeriod, PeriodPreset, PeriodUnit};
use skyguard_charts::interaction::ChartMode;

fn hour_preset() -> PeriodPreset {
    PeriodPreset::new("A", "Hour", 1, PeriodUnit::Hours, TimeDelta::minutes(1))
        .expect("valid preset")
}

fn static_query(span: TimeDelta) -> AggregationQuery<'static> {
    AggregationQuery {
        mode: ChartMode::Static,
        span,
        static_source_preset_uid: None,
        selected_preset_uid: None,
        period: ChartPeriod::Custom,
    }
}

#[test]
fn sixty_six_minute_freeze_matches_hour_preset_inclusively() {
    let presets = vec![hour_preset()];
    let resolved = resolve_aggregation_interval(
        static_query(TimeDelta::minutes(66)),
        &presets,
        AggregationTuning::new(10.0, 300, 15),
    );

    assert_eq!(resolved.interval, TimeDelta::minutes(1));
    match resolved.source {
        AggregationSource::ToleranceMatch { uid, deviation } => {
            assert_eq!(uid, "A");
            assert_abs_diff_eq!(deviation, 0.1, epsilon = 1e-12);
        }
        other => panic!("expected tolerance match, got {other:?}"),
    }
}

#[test]
fn sixty_seven_minute_freeze_falls_back_to_automatic() {
    let presets = vec![hour_preset()];
    let resolved = resolve_aggregation_interval(
        static_query(TimeDelta::minutes(67)),
        &presets,
        AggregationTuning::new(10.0, 300, 15),
    );

    // 4020 s / 300 = 13.4 -> 14 s -> next 15 s step.
    assert_eq!(resolved.source, AggregationSource::Automatic);
    assert_eq!(resolved.interval, TimeDelta::seconds(15));
}

#[test]
fn automatic_interval_for_one_hour_at_three_hundred_points() {
    assert_eq!(
        automatic_interval(TimeDelta::seconds(3_600), 300, 15),
        TimeDelta::seconds(15)
    );
    assert_eq!(
        automatic_interval(TimeDelta::seconds(3_600), 300, 5),
        TimeDelta::seconds(15)
    );
    assert_eq!(
        automatic_interval(TimeDelta::seconds(3_600), 300, 1),
        TimeDelta::seconds(12)
    );
}

#[test]
fn automatic_interval_never_drops_below_one_second() {
    assert_eq!(
        automatic_interval(TimeDelta::seconds(10), 300, 15),
        TimeDelta::seconds(15)
    );
    assert_eq!(
        automatic_interval(TimeDelta::seconds(1), 300, 15),
        TimeDelta::seconds(1)
    );
    assert_eq!(
        automatic_interval(TimeDelta::zero(), 300, 15),
        TimeDelta::seconds(1)
    );
    assert_eq!(
        automatic_interval(TimeDelta::seconds(-50), 300, 15),
        TimeDelta::seconds(1)
    );
}

#[test]
fn static_source_preset_wins_over_tolerance_match() {
    let presets = vec![
        hour_preset(),
        PeriodPreset::new("B", "Day", 1, PeriodUnit::Days, TimeDelta::minutes(5))
            .expect("valid preset"),
    ];
    let query = AggregationQuery {
        static_source_preset_uid: Some("B"),
        ..static_query(TimeDelta::minutes(60))
    };
    let resolved =
        resolve_aggregation_interval(query, &presets, AggregationTuning::default());

    assert_eq!(resolved.interval, TimeDelta::minutes(5));
    assert_eq!(
        resolved.source,
        AggregationSource::SourcePreset {
            uid: "B".to_owned()
        }
    );
}

#[test]
fn unknown_static_source_preset_falls_through_to_matching() {
    let presets = vec![hour_preset()];
    let query = AggregationQuery {
        static_source_preset_uid: Some("gone"),
        ..static_query(TimeDelta::minutes(60))
    };
    let resolved =
        resolve_aggregation_interval(query, &presets, AggregationTuning::default());

    assert!(matches!(
        resolved.source,
        AggregationSource::ToleranceMatch { .. }
    ));
}

#[test]
fn auto_mode_uses_selected_preset_then_period_table() {
    let presets = vec![hour_preset()];
    let selected = AggregationQuery {
        mode: ChartMode::Auto,
        span: TimeDelta::hours(1),
        static_source_preset_uid: None,
        selected_preset_uid: Some("A"),
        period: ChartPeriod::Custom,
    };
    let resolved =
        resolve_aggregation_interval(selected, &presets, AggregationTuning::default());
    assert_eq!(resolved.interval, TimeDelta::minutes(1));

    let by_period = AggregationQuery {
        selected_preset_uid: None,
        period: ChartPeriod::Last24Hours,
        span: TimeDelta::hours(24),
        ..selected
    };
    let resolved =
        resolve_aggregation_interval(by_period, &presets, AggregationTuning::default());
    assert_eq!(resolved.interval, TimeDelta::minutes(5));
    assert_eq!(
        resolved.source,
        AggregationSource::PeriodDefault {
            period: ChartPeriod::Last24Hours
        }
    );

    let custom = AggregationQuery {
        selected_preset_uid: None,
        period: ChartPeriod::Custom,
        span: TimeDelta::hours(1),
        ..selected
    };
    let resolved = resolve_aggregation_interval(custom, &presets, AggregationTuning::default());
    assert_eq!(resolved.source, AggregationSource::Automatic);
    assert_eq!(resolved.interval, TimeDelta::seconds(15));
}

#[test]
fn auto_mode_never_consults_tolerance_matching() {
    let presets = vec![hour_preset()];
    let query = AggregationQuery {
        mode: ChartMode::Auto,
        span: TimeDelta::minutes(62),
        static_source_preset_uid: None,
        selected_preset_uid: None,
        period: ChartPeriod::Custom,
    };
    let resolved = resolve_aggregation_interval(query, &presets, AggregationTuning::default());
    assert_eq!(resolved.source, AggregationSource::Automatic);
}

#[test]
fn tolerance_match_picks_smallest_deviation_and_first_on_ties() {
    let presets = vec![
        PeriodPreset::new("p50", "50m", 50, PeriodUnit::Minutes, TimeDelta::seconds(10))
            .expect("valid preset"),
        PeriodPreset::new("p60", "60m", 60, PeriodUnit::Minutes, TimeDelta::seconds(20))
            .expect("valid preset"),
        PeriodPreset::new("p60b", "60m again", 60, PeriodUnit::Minutes, TimeDelta::seconds(30))
            .expect("valid preset"),
    ];

    let (best, deviation) =
        match_preset_within_tolerance(TimeDelta::minutes(58), &presets, 20.0)
            .expect("within tolerance");
    assert_eq!(best.uid, "p60");
    assert_abs_diff_eq!(deviation, 2.0 / 60.0, epsilon = 1e-12);

    assert!(match_preset_within_tolerance(TimeDelta::minutes(58), &presets, 0.0).is_none());
    assert!(match_preset_within_tolerance(TimeDelta::minutes(58), &[], 50.0).is_none());
}

#[test]
fn tuning_clamps_out_of_range_values() {
    let tuning = AggregationTuning::new(250.0, 0, 0);
    assert_abs_diff_eq!(tuning.tolerance_percent(), 100.0);
    assert_eq!(tuning.target_point_count(), 2);
    assert_eq!(tuning.rounding_step_seconds(), 1);

    let negative = AggregationTuning::new(-5.0, 300, 15);
    assert_abs_diff_eq!(negative.tolerance_percent(), 0.0);
}

#[test]
fn aggregation_label_formats_interval_or_raw() {
    assert_eq!(
        format_aggregation_label(AggregationFunction::Average, TimeDelta::minutes(5)),
        "Aggregation: 00:05:00"
    );
    assert_eq!(
        format_aggregation_label(AggregationFunction::Raw, TimeDelta::minutes(5)),
        "Aggregation: raw"
    );
    assert_eq!(
        format_aggregation_label(AggregationFunction::Maximum, TimeDelta::seconds(90_061)),
        "Aggregation: 1d 01:01:01"
    );
}
