//! AppService integration tests: sampling, change detection and the
//! publish cadence, driven through mock ports.

use aws_sensor::app::events::{AppEvent, SkipReason};
use aws_sensor::app::service::{AppService, CloudState};
use aws_sensor::config::{AWS_NAMESPACE, AppConfig, KEY_CERT, KEY_SSID, WIFI_NAMESPACE};
use aws_sensor::app::ports::StoragePort;
use aws_sensor::reading::AdcReading;

use crate::mock_hw::{MockHardware, MockNvs, MockShadow, RecordingSink, test_params};

fn started(hw: &mut MockHardware, shadow: &mut MockShadow, sink: &mut RecordingSink) -> AppService {
    let mut app = AppService::new(AppConfig::default());
    app.start(shadow, test_params("sensor-1"), hw, sink).unwrap();
    sink.clear();
    app
}

// ── Sampling ──────────────────────────────────────────────────

#[test]
fn sample_failure_keeps_previous_reading() {
    let mut hw = MockHardware::new();
    hw.push_mv(1234.5);
    hw.push_failure();
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(AppConfig::default());

    app.sample(&mut hw, &mut sink);
    app.sample(&mut hw, &mut sink);

    assert_eq!(app.latest(), Some(AdcReading { integer: 1234, micro: 500_000 }));
    assert_eq!(
        sink.events,
        vec![
            AppEvent::Sampled(AdcReading { integer: 1234, micro: 500_000 }),
            AppEvent::SampleFailed,
        ]
    );
}

#[test]
fn sampling_runs_before_cloud_start() {
    let mut hw = MockHardware::with_mv(100.0);
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(AppConfig::default());

    app.tick(&mut hw, &mut shadow, &mut sink, 0).unwrap();

    assert!(app.latest().is_some());
    assert!(shadow.updates.is_empty());
    // No publish attempt at all while the cloud task is not started.
    assert!(!sink.events.iter().any(|e| matches!(e, AppEvent::PublishSkipped(_))));
}

// ── Publishing ────────────────────────────────────────────────

#[test]
fn first_reading_is_published_as_shadow_document() {
    let mut hw = MockHardware::with_mv(742.125);
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = started(&mut hw, &mut shadow, &mut sink);

    app.sample(&mut hw, &mut sink);
    app.publish_cycle(&mut shadow, &mut hw, &mut sink, 0).unwrap();

    assert_eq!(shadow.updates.len(), 1);
    assert_eq!(shadow.updates[0].0, "sensor-1");
    assert_eq!(
        shadow.last_document(),
        Some(r#"{"state":{"reported":{"adc":742.125000}}}"#)
    );
    assert_eq!(app.last_published(), Some(AdcReading { integer: 742, micro: 125_000 }));
    assert_eq!(app.pending_acks(), 1);
}

#[test]
fn no_reading_yet_skips_publish() {
    let mut hw = MockHardware::new();
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = started(&mut hw, &mut shadow, &mut sink);

    app.publish_cycle(&mut shadow, &mut hw, &mut sink, 0).unwrap();

    assert!(shadow.updates.is_empty());
    assert!(sink.contains(&AppEvent::PublishSkipped(SkipReason::NoReading)));
}

#[test]
fn fractional_jitter_is_not_republished() {
    let mut hw = MockHardware::new();
    hw.push_mv(500.1);
    hw.push_mv(500.9);
    hw.push_mv(501.0);
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = started(&mut hw, &mut shadow, &mut sink);

    for now in [0, 5_000, 10_000] {
        app.sample(&mut hw, &mut sink);
        app.publish_cycle(&mut shadow, &mut hw, &mut sink, now).unwrap();
    }

    assert_eq!(shadow.updates.len(), 2);
    assert_eq!(sink.count(&AppEvent::PublishSkipped(SkipReason::Unchanged)), 1);
    assert_eq!(app.last_published().map(|r| r.integer), Some(501));
}

#[test]
fn failed_publish_is_retried_next_cycle() {
    let mut hw = MockHardware::with_mv(42.0);
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = started(&mut hw, &mut shadow, &mut sink);
    shadow.fail_publishes = 1;

    app.sample(&mut hw, &mut sink);
    assert!(app.publish_cycle(&mut shadow, &mut hw, &mut sink, 0).is_err());
    assert_eq!(app.last_published(), None);
    assert!(sink.contains(&AppEvent::PublishFailed));

    // Same reading, but nothing was published yet so it goes out now.
    app.publish_cycle(&mut shadow, &mut hw, &mut sink, 5_000).unwrap();
    assert_eq!(shadow.updates.len(), 1);
    assert_eq!(app.cloud_state(), CloudState::Online);
}

// ── Cadence ───────────────────────────────────────────────────

#[test]
fn tick_honours_fixed_intervals() {
    let mut hw = MockHardware::new();
    hw.push_mv(10.0);
    hw.push_mv(20.0);
    hw.push_mv(30.0);
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = started(&mut hw, &mut shadow, &mut sink);

    let mut now = 0;
    while now < 10_000 {
        app.tick(&mut hw, &mut shadow, &mut sink, now).unwrap();
        now += 100;
    }

    // Due at 0 and 5000 only.
    let sampled = sink.events.iter().filter(|e| matches!(e, AppEvent::Sampled(_))).count();
    assert_eq!(sampled, 2);
    assert_eq!(shadow.updates.len(), 2);

    app.tick(&mut hw, &mut shadow, &mut sink, 10_000).unwrap();
    assert_eq!(shadow.updates.len(), 3);
    assert_eq!(app.latest().map(|r| r.integer), Some(30));
}

#[test]
fn tick_reports_publish_error_but_keeps_cadence() {
    let mut hw = MockHardware::with_mv(7.0);
    let mut shadow = MockShadow::new();
    let mut sink = RecordingSink::new();
    let mut app = started(&mut hw, &mut shadow, &mut sink);
    shadow.fail_publishes = 1;

    assert!(app.tick(&mut hw, &mut shadow, &mut sink, 0).is_err());
    // Not due again until the next interval.
    app.tick(&mut hw, &mut shadow, &mut sink, 100).unwrap();
    assert!(shadow.updates.is_empty());
    app.tick(&mut hw, &mut shadow, &mut sink, 5_000).unwrap();
    assert_eq!(shadow.updates.len(), 1);
}

// ── Factory reset ─────────────────────────────────────────────

#[test]
fn factory_reset_erases_credentials_only() {
    let mut nvs = MockNvs::new();
    nvs.write(AWS_NAMESPACE, KEY_CERT, b"-----BEGIN CERTIFICATE-----").unwrap();
    nvs.write(WIFI_NAMESPACE, KEY_SSID, b"home").unwrap();
    nvs.write("misc", "boots", &[3]).unwrap();
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(AppConfig::default());

    app.factory_reset(&mut nvs, &mut sink).unwrap();

    assert!(!nvs.exists(AWS_NAMESPACE, KEY_CERT));
    assert!(!nvs.exists(WIFI_NAMESPACE, KEY_SSID));
    assert!(nvs.exists("misc", "boots"));
    assert_eq!(sink.events, vec![AppEvent::FactoryReset]);
}
