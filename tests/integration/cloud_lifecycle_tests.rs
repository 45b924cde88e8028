//! Cloud session lifecycle: start, link loss, reconnect, halt and shadow
//! acknowledgements.

use aws_sensor::app::commands::AppCommand;
use aws_sensor::app::events::{AppEvent, SkipReason};
use aws_sensor::app::service::{AppService, CloudState};
use aws_sensor::config::AppConfig;
use aws_sensor::link::{LinkAction, LinkState};
use aws_sensor::shadow::AckStatus;

use crate::mock_hw::{MockHardware, MockShadow, RecordingSink, test_params};

struct Rig {
    app: AppService,
    hw: MockHardware,
    shadow: MockShadow,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        Self {
            app: AppService::new(AppConfig::default()),
            hw: MockHardware::with_mv(321.0),
            shadow: MockShadow::new(),
            sink: RecordingSink::new(),
        }
    }

    fn command(&mut self, cmd: AppCommand) -> LinkAction {
        self.app.handle_command(cmd, &mut self.shadow, &mut self.hw, &mut self.sink)
    }

    /// Link up plus a successful start.
    fn online() -> Self {
        let mut rig = Self::new();
        assert_eq!(rig.command(AppCommand::LinkUp), LinkAction::StartCloud);
        rig.app
            .start(&mut rig.shadow, test_params("thing"), &mut rig.hw, &mut rig.sink)
            .unwrap();
        rig.sink.clear();
        rig
    }

    fn publish(&mut self, now_ms: u64) -> aws_sensor::error::Result<()> {
        self.app.publish_cycle(&mut self.shadow, &mut self.hw, &mut self.sink, now_ms)
    }
}

// ── Start ─────────────────────────────────────────────────────

#[test]
fn start_lights_led_and_goes_online() {
    let rig = Rig::online();
    assert_eq!(rig.app.cloud_state(), CloudState::Online);
    assert!(rig.hw.led_on);
    assert_eq!(rig.shadow.connects, 1);
}

#[test]
fn start_failure_halts_cloud_task() {
    let mut rig = Rig::new();
    rig.shadow.fail_connects = 1;
    rig.command(AppCommand::LinkUp);

    let result = rig.app.start(&mut rig.shadow, test_params("thing"), &mut rig.hw, &mut rig.sink);

    assert!(result.is_err());
    assert_eq!(rig.app.cloud_state(), CloudState::Halted);
    assert!(!rig.hw.led_on);
    assert!(rig.sink.contains(&AppEvent::CloudHalted));

    // Sampling continues, publishing does not.
    rig.app.sample(&mut rig.hw, &mut rig.sink);
    rig.publish(5_000).unwrap();
    assert!(rig.shadow.updates.is_empty());
}

#[test]
fn second_link_up_does_not_restart() {
    let mut rig = Rig::online();
    assert_eq!(rig.command(AppCommand::LinkUp), LinkAction::None);
    assert_eq!(rig.shadow.connects, 1);
}

#[test]
fn connect_failure_before_first_link_is_ignored() {
    let mut rig = Rig::new();
    assert_eq!(rig.command(AppCommand::ConnectFailed), LinkAction::None);
    assert_eq!(rig.app.link_state(), LinkState::Idle);
    assert_eq!(rig.command(AppCommand::LinkUp), LinkAction::StartCloud);
}

// ── Link loss and recovery ────────────────────────────────────

#[test]
fn link_loss_drops_session_and_skips_publishing() {
    let mut rig = Rig::online();

    assert_eq!(rig.command(AppCommand::LinkLost), LinkAction::DropCloud);
    assert_eq!(rig.app.cloud_state(), CloudState::Offline);
    assert_eq!(rig.shadow.disconnects, 1);
    assert!(!rig.hw.led_on);
    assert!(rig.sink.contains(&AppEvent::CloudDropped));

    rig.app.sample(&mut rig.hw, &mut rig.sink);
    rig.publish(5_000).unwrap();
    assert!(rig.sink.contains(&AppEvent::PublishSkipped(SkipReason::Offline)));
    assert!(rig.shadow.updates.is_empty());
}

#[test]
fn link_recovery_reconnects_on_next_publish() {
    let mut rig = Rig::online();
    rig.command(AppCommand::LinkLost);
    rig.command(AppCommand::LinkUp);
    assert_eq!(rig.app.link_state(), LinkState::Reconnected);

    rig.app.sample(&mut rig.hw, &mut rig.sink);
    rig.publish(5_000).unwrap();

    assert_eq!(rig.shadow.connects, 2);
    assert_eq!(rig.app.link_state(), LinkState::Connected);
    assert_eq!(rig.app.cloud_state(), CloudState::Online);
    assert!(rig.hw.led_on);
    assert!(rig.sink.contains(&AppEvent::CloudReconnected));
    assert_eq!(rig.shadow.updates.len(), 1);
}

#[test]
fn reconnect_failure_halts() {
    let mut rig = Rig::online();
    rig.command(AppCommand::LinkLost);
    rig.command(AppCommand::LinkUp);
    rig.shadow.fail_connects = 1;

    rig.app.sample(&mut rig.hw, &mut rig.sink);
    assert!(rig.publish(5_000).is_err());
    assert_eq!(rig.app.cloud_state(), CloudState::Halted);

    // Halted is terminal for this boot.
    rig.publish(10_000).unwrap();
    assert_eq!(rig.shadow.connects, 1);
    assert!(rig.shadow.updates.is_empty());
}

#[test]
fn repeated_link_loss_disconnects_once() {
    let mut rig = Rig::online();
    rig.command(AppCommand::LinkLost);
    rig.command(AppCommand::LinkUp);
    rig.command(AppCommand::LinkLost);
    assert_eq!(rig.shadow.disconnects, 1);
    assert_eq!(rig.app.link_state(), LinkState::Disconnected);
}

// ── Shadow acks ───────────────────────────────────────────────

#[test]
fn accepted_ack_resolves_pending_update() {
    let mut rig = Rig::online();
    rig.app.sample(&mut rig.hw, &mut rig.sink);
    rig.publish(0).unwrap();
    assert_eq!(rig.app.pending_acks(), 1);

    rig.command(AppCommand::ShadowAck(AckStatus::Accepted));

    assert_eq!(rig.app.pending_acks(), 0);
    assert!(rig.sink.contains(&AppEvent::ShadowAck(AckStatus::Accepted)));
}

#[test]
fn unsolicited_ack_emits_nothing() {
    let mut rig = Rig::online();
    rig.command(AppCommand::ShadowAck(AckStatus::Rejected));
    assert!(rig.sink.events.is_empty());
}

#[test]
fn unanswered_update_times_out() {
    let mut rig = Rig::online();
    rig.app.sample(&mut rig.hw, &mut rig.sink);
    rig.publish(0).unwrap();

    rig.app.tick(&mut rig.hw, &mut rig.shadow, &mut rig.sink, 10_000).unwrap();

    assert_eq!(rig.app.pending_acks(), 0);
    assert_eq!(rig.sink.count(&AppEvent::ShadowAck(AckStatus::Timeout)), 1);
}

#[test]
fn link_loss_forgets_pending_acks() {
    let mut rig = Rig::online();
    rig.app.sample(&mut rig.hw, &mut rig.sink);
    rig.publish(0).unwrap();

    rig.command(AppCommand::LinkLost);

    assert_eq!(rig.app.pending_acks(), 0);
}
