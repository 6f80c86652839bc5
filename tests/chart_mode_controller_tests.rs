use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use skyguard_charts::ChartModeController;
use skyguard_charts::api::{
    AggregationSource, AggregationTuning, ChartModeConfig, LinkBroadcast, PeriodPresetCatalog,
    PresetRepository,
};
use skyguard_charts::core::{
    BUILTIN_FALLBACK_PRESET_UID, ChartId, ChartPeriod, PeriodPreset, PeriodUnit, TaggedInstant,
};
use skyguard_charts::extensions::{ChartEvent, ChartObserver};
use skyguard_charts::interaction::{ChartMode, InteractionKind, XAxisLimits};

type EventLog = Rc<RefCell<Vec<(ChartId, ChartEvent)>>>;

struct RecordingObserver {
    log: EventLog,
}

impl ChartObserver for RecordingObserver {
    fn id(&self) -> &str {
        "recorder"
    }

    fn on_chart_event(&mut self, chart: ChartId, event: &ChartEvent) {
        self.log.borrow_mut().push((chart, event.clone()));
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).expect("valid instant")
}

fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).expect("utc offset")
}

fn observed(config: ChartModeConfig) -> (ChartModeController, EventLog) {
    let mut chart = ChartModeController::new(ChartId::new(7), config, utc_offset(), at(0));
    let log = EventLog::default();
    chart
        .register_observer(Box::new(RecordingObserver {
            log: Rc::clone(&log),
        }))
        .expect("observer registration");
    (chart, log)
}

fn limits(start: i64, end: i64) -> XAxisLimits {
    XAxisLimits::new(
        (1_700_000_000 + start) as f64,
        (1_700_000_000 + end) as f64,
    )
}

fn catalog() -> PeriodPresetCatalog {
    let mut catalog = PeriodPresetCatalog::new();
    catalog
        .set_presets(vec![
            PeriodPreset::new("hour", "Hour", 1, PeriodUnit::Hours, TimeDelta::seconds(30))
                .expect("valid preset"),
            PeriodPreset::new("day", "Day", 1, PeriodUnit::Days, TimeDelta::minutes(5))
                .expect("valid preset"),
        ])
        .expect("valid catalog");
    catalog
}

#[test]
fn static_range_enters_static_and_broadcasts() {
    let (mut chart, log) = observed(ChartModeConfig::default());

    let broadcast = chart.set_static_range(at(-600), at(0), at(0), true);

    assert_eq!(chart.mode(), ChartMode::Static);
    assert_eq!(
        broadcast,
        Some(LinkBroadcast::StaticRangeChanged {
            start: at(-600),
            end: at(0),
            source_preset_uid: None,
        })
    );
    assert_eq!(
        log.borrow().as_slice(),
        &[
            (
                ChartId::new(7),
                ChartEvent::ModeChanged {
                    mode: ChartMode::Static
                }
            ),
            (
                ChartId::new(7),
                ChartEvent::StaticRangeChanged {
                    start: at(-600),
                    end: at(0)
                }
            ),
        ]
    );
}

#[test]
fn inverted_or_empty_range_is_silently_ignored() {
    let (mut chart, log) = observed(ChartModeConfig::default());

    assert_eq!(chart.set_static_range(at(0), at(0), at(0), true), None);
    assert_eq!(chart.set_static_range(at(10), at(0), at(0), true), None);

    assert_eq!(chart.mode(), ChartMode::Auto);
    assert!(chart.static_range().is_none());
    assert!(log.borrow().is_empty());
}

#[test]
fn re_entering_same_range_only_restarts_countdown() {
    let (mut chart, log) = observed(ChartModeConfig::default().with_static_timeout_seconds(30));
    chart.set_static_range(at(-600), at(0), at(0), true);
    assert_eq!(chart.countdown(at(20)), Some(TimeDelta::seconds(10)));
    log.borrow_mut().clear();

    let broadcast = chart.set_static_range(at(-600), at(0), at(20), true);

    assert_eq!(broadcast, None);
    let range = chart.static_range().expect("still static");
    assert_eq!((range.start, range.end), (at(-600), at(0)));
    assert_eq!(chart.countdown(at(20)), Some(TimeDelta::seconds(30)));
    assert_eq!(
        log.borrow().as_slice(),
        &[(
            ChartId::new(7),
            ChartEvent::CountdownUpdated {
                remaining: TimeDelta::seconds(30)
            }
        )]
    );
}

#[test]
fn timeout_is_clamped_and_expires_exactly_on_tick() {
    let (mut chart, log) = observed(ChartModeConfig::default().with_static_timeout_seconds(3));
    assert_eq!(chart.static_timeout(), TimeDelta::seconds(10));

    chart.set_static_range(at(-600), at(0), at(0), true);
    log.borrow_mut().clear();

    assert_eq!(chart.tick(at(9)), None);
    assert!(chart.is_static());
    assert_eq!(
        log.borrow().last(),
        Some(&(
            ChartId::new(7),
            ChartEvent::CountdownUpdated {
                remaining: TimeDelta::seconds(1)
            }
        ))
    );

    assert_eq!(chart.tick(at(10)), Some(LinkBroadcast::AutoModeRestored));
    assert_eq!(chart.mode(), ChartMode::Auto);
    assert_eq!(chart.countdown(at(10)), None);
    assert_eq!(chart.tick(at(11)), None);
}

#[test]
fn auto_selection_is_restored_after_static() {
    let repository = catalog();
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.set_period_preset("hour", &repository, false);

    chart.set_static_range(at(-86_400), at(-3_600), at(0), false);
    assert_eq!(chart.selected_preset_uid(), None);
    assert_eq!(chart.remembered_preset_uid(), Some("hour"));
    assert_eq!(chart.custom_duration(), Some(TimeDelta::hours(23)));

    assert_eq!(
        chart.exit_static_mode(true),
        Some(LinkBroadcast::AutoModeRestored)
    );
    assert_eq!(chart.selected_preset_uid(), Some("hour"));
    assert_eq!(chart.custom_duration(), Some(TimeDelta::hours(1)));
    assert!(chart.static_range().is_none());

    assert_eq!(chart.exit_static_mode(true), None);
}

#[test]
fn user_limits_freeze_only_after_a_real_change() {
    let (mut chart, _log) = observed(ChartModeConfig::default());

    let unchanged =
        chart.apply_user_x_limits(InteractionKind::Pan, limits(-86_400, 0), at(0), true);
    assert_eq!(unchanged, None);
    assert_eq!(chart.mode(), ChartMode::Auto);

    let mut jitter = limits(-86_400, 0);
    jitter.max += 1e-12;
    assert_eq!(
        chart.apply_user_x_limits(InteractionKind::WheelZoom, jitter, at(1), true),
        None
    );
    assert_eq!(chart.mode(), ChartMode::Auto);

    let broadcast =
        chart.apply_user_x_limits(InteractionKind::DragSelect, limits(-1_800, -600), at(2), true);
    assert_eq!(chart.mode(), ChartMode::Static);
    assert_eq!(
        broadcast,
        Some(LinkBroadcast::StaticRangeChanged {
            start: at(-1_800),
            end: at(-600),
            source_preset_uid: None,
        })
    );
}

#[test]
fn first_gesture_on_a_new_chart_freezes_it() {
    let (mut chart, _log) = observed(ChartModeConfig::default());

    let broadcast =
        chart.apply_user_x_limits(InteractionKind::Pan, limits(-90_000, -3_600), at(1), true);

    assert_eq!(chart.mode(), ChartMode::Static);
    assert_eq!(
        broadcast,
        Some(LinkBroadcast::StaticRangeChanged {
            start: at(-90_000),
            end: at(-3_600),
            source_preset_uid: None,
        })
    );
}

#[test]
fn gesture_after_exit_freezes_again() {
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.set_static_range(at(-600), at(-300), at(0), false);
    chart.exit_static_mode(false);
    assert_eq!(chart.mode(), ChartMode::Auto);

    chart.apply_user_x_limits(InteractionKind::Pan, limits(-90_000, -3_600), at(5), false);

    assert_eq!(chart.mode(), ChartMode::Static);
    assert_eq!(
        chart.static_range().map(|range| (range.start, range.end)),
        Some((at(-90_000), at(-3_600)))
    );
}

#[test]
fn gesture_after_preset_selection_while_static_freezes_again() {
    let repository = catalog();
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.set_static_range(at(-600), at(-300), at(0), false);
    chart.set_period_preset("hour", &repository, false);
    assert_eq!(chart.mode(), ChartMode::Auto);

    let unchanged =
        chart.apply_user_x_limits(InteractionKind::Pan, limits(-3_600, 0), at(0), false);
    assert_eq!(unchanged, None);
    assert_eq!(chart.mode(), ChartMode::Auto);

    chart.apply_user_x_limits(InteractionKind::WheelZoom, limits(-1_800, 0), at(1), false);
    assert_eq!(chart.mode(), ChartMode::Static);
}

#[test]
fn synced_limits_are_a_baseline_not_a_gesture() {
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.sync_x_limits(limits(-3_600, 0));

    let broadcast = chart.apply_user_x_limits(InteractionKind::Pan, limits(-3_500, 100), at(0), false);
    assert_eq!(broadcast, None);
    assert!(chart.is_static());
    assert_eq!(chart.last_x_limits(), Some(limits(-3_500, 100)));
}

#[test]
fn invalid_limits_are_ignored() {
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.sync_x_limits(limits(-3_600, 0));

    let nan = XAxisLimits::new(f64::NAN, 10.0);
    assert_eq!(chart.apply_user_x_limits(InteractionKind::Pan, nan, at(0), true), None);
    assert_eq!(
        chart.apply_user_x_limits(InteractionKind::Pan, limits(10, 0), at(0), true),
        None
    );
    assert_eq!(chart.mode(), ChartMode::Auto);
}

#[test]
fn selecting_preset_while_static_is_an_implicit_exit() {
    let repository = catalog();
    let (mut chart, log) = observed(ChartModeConfig::default());
    chart.set_static_range(at(-600), at(0), at(0), false);
    log.borrow_mut().clear();

    let broadcast = chart.set_period_preset("day", &repository, true);

    assert_eq!(chart.mode(), ChartMode::Auto);
    assert_eq!(chart.selected_preset_uid(), Some("day"));
    assert_eq!(chart.period(), ChartPeriod::Custom);
    assert_eq!(chart.custom_duration(), Some(TimeDelta::days(1)));
    assert_eq!(
        broadcast,
        Some(LinkBroadcast::PeriodChanged {
            preset_uid: "day".to_owned()
        })
    );
    let events = log.borrow();
    assert!(events.iter().any(|(_, event)| *event
        == ChartEvent::ModeChanged {
            mode: ChartMode::Auto
        }));
    assert!(events.iter().any(|(_, event)| *event
        == ChartEvent::PeriodChanged {
            preset_uid: Some("day".to_owned())
        }));
}

#[test]
fn unknown_preset_uid_selects_fallback() {
    let repository = catalog();
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.set_period_preset("deleted", &repository, false);
    assert_eq!(chart.selected_preset_uid(), Some("hour"));

    let empty: Vec<PeriodPreset> = Vec::new();
    chart.set_period_preset("deleted", &empty, false);
    assert_eq!(chart.selected_preset_uid(), Some(BUILTIN_FALLBACK_PRESET_UID));
    assert_eq!(chart.custom_duration(), Some(TimeDelta::hours(24)));
}

#[test]
fn freezing_current_window_keeps_preset_as_aggregation_source() {
    let repository = catalog();
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.set_period_preset("day", &repository, false);

    let broadcast = chart.freeze_current_window(at(0), true);

    assert_eq!(
        broadcast,
        Some(LinkBroadcast::StaticRangeChanged {
            start: at(-86_400),
            end: at(0),
            source_preset_uid: Some("day".to_owned()),
        })
    );
    let window = chart.resolve_window(at(5_000));
    assert!(window.is_static());
    assert_eq!(window.end(), at(0));

    let resolved = chart.resolve_aggregation(window, &repository, AggregationTuning::default());
    assert_eq!(resolved.interval, TimeDelta::minutes(5));
    assert_eq!(
        resolved.source,
        AggregationSource::SourcePreset {
            uid: "day".to_owned()
        }
    );
}

#[test]
fn persisted_frozen_range_starts_static() {
    let config = ChartModeConfig::default().with_frozen_range(
        TaggedInstant::utc(at(-3_600)),
        TaggedInstant::utc(at(-60)),
    );
    let chart = ChartModeController::new(ChartId::new(1), config, utc_offset(), at(0));
    assert!(chart.is_static());
    let range = chart.static_range().expect("frozen range");
    assert_eq!((range.start, range.end), (at(-3_600), at(-60)));

    let inverted = ChartModeConfig::default().with_frozen_range(
        TaggedInstant::utc(at(0)),
        TaggedInstant::utc(at(-60)),
    );
    let chart = ChartModeController::new(ChartId::new(2), inverted, utc_offset(), at(0));
    assert_eq!(chart.mode(), ChartMode::Auto);
}

#[test]
fn resolve_request_combines_window_and_interval() {
    let repository = catalog();
    let (mut chart, log) = observed(ChartModeConfig::default().with_period(ChartPeriod::Last6Hours));

    let request = chart.resolve_request(at(0), &repository, AggregationTuning::default());
    assert_eq!(request.window.span(), TimeDelta::hours(6));
    assert_eq!(request.interval, TimeDelta::minutes(2));
    assert_eq!(request.period, ChartPeriod::Last6Hours);

    chart.publish_refresh(&request);
    assert_eq!(
        log.borrow().last(),
        Some(&(
            ChartId::new(7),
            ChartEvent::Refreshed {
                aggregation_label: "Aggregation: 00:02:00".to_owned()
            }
        ))
    );
}

#[test]
fn reconciling_presets_follows_edits_and_deletions() {
    let mut repository = catalog();
    let (mut chart, _log) = observed(ChartModeConfig::default());
    chart.set_period_preset("day", &repository, false);

    repository
        .set_presets(vec![
            PeriodPreset::new("hour", "Hour", 1, PeriodUnit::Hours, TimeDelta::seconds(30))
                .expect("valid preset"),
            PeriodPreset::new("day", "Two days", 2, PeriodUnit::Days, TimeDelta::minutes(10))
                .expect("valid preset"),
        ])
        .expect("valid catalog");
    chart.reconcile_presets(&repository);
    assert_eq!(chart.selected_preset_uid(), Some("day"));
    assert_eq!(chart.custom_duration(), Some(TimeDelta::days(2)));

    repository
        .set_presets(vec![
            PeriodPreset::new("week", "Week", 7, PeriodUnit::Days, TimeDelta::minutes(30))
                .expect("valid preset"),
        ])
        .expect("valid catalog");
    chart.reconcile_presets(&repository);
    assert_eq!(chart.selected_preset_uid(), Some("week"));
    assert_eq!(chart.custom_duration(), Some(TimeDelta::days(7)));
    assert_eq!(repository.revision(), 3);
}

#[test]
fn observer_ids_must_be_unique() {
    let (mut chart, log) = observed(ChartModeConfig::default());
    let duplicate = chart.register_observer(Box::new(RecordingObserver { log }));
    assert!(duplicate.is_err());
    assert_eq!(chart.observer_count(), 1);
    assert!(chart.unregister_observer("recorder"));
    assert_eq!(chart.observer_count(), 0);
}
