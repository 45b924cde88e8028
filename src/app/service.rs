//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the link state, the sampling/publishing cadence and
//! the shadow ack tracker.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!      AdcPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                  │        AppService        │
//!   ShadowPort ◀──│ Link · cadence · acks    │──▶ IndicatorPort
//!                  └──────────────────────────┘
//! ```

use log::{debug, error, info, warn};

use crate::config::{AWS_NAMESPACE, AppConfig, WIFI_NAMESPACE};
use crate::error::{Error, Result};
use crate::link::{Link, LinkAction, LinkState};
use crate::reading::AdcReading;
use crate::shadow::{AckStatus, AckTracker, ShadowDocument};

use super::commands::AppCommand;
use super::events::{AppEvent, SkipReason};
use super::ports::{
    AdcPort, EventSink, IndicatorPort, ShadowError, ShadowParams, ShadowPort, StoragePort,
};

/// Lifecycle of the cloud task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudState {
    /// Waiting for the first link up.
    NotStarted,
    /// Shadow session open.
    Online,
    /// Link lost; session torn down until the link returns.
    Offline,
    /// Connect or reconnect failed.  Sampling continues, publishing stops.
    Halted,
}

pub struct AppService {
    config: AppConfig,
    link: Link,
    cloud: CloudState,
    params: Option<ShadowParams>,
    acks: AckTracker,
    latest: Option<AdcReading>,
    last_published: Option<AdcReading>,
    next_sample_ms: u64,
    next_publish_ms: u64,
}

impl AppService {
    pub fn new(config: AppConfig) -> Self {
        let acks = AckTracker::new(config.shadow_ack_timeout_ms);
        Self {
            config,
            link: Link::new(),
            cloud: CloudState::NotStarted,
            params: None,
            acks,
            latest: None,
            last_published: None,
            next_sample_ms: 0,
            next_publish_ms: 0,
        }
    }

    // ── Cloud lifecycle ───────────────────────────────────────

    /// Open the first shadow session.
    ///
    /// Call after [`AppCommand::LinkUp`] returned [`LinkAction::StartCloud`].
    /// A failure halts the cloud task for the rest of this boot.
    pub fn start(
        &mut self,
        shadow: &mut impl ShadowPort,
        params: ShadowParams,
        led: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if self.cloud != CloudState::NotStarted {
            warn!("cloud already started ({:?})", self.cloud);
            return Ok(());
        }

        info!(
            "shadow: connecting to {}:{} as '{}' (thing '{}')",
            params.cloud.host(),
            params.cloud.port,
            params.cloud.client_id,
            params.cloud.thing_name
        );

        if let Err(e) = shadow.connect(&params) {
            error!("aws shadow connect failed: {}", e);
            self.halt(led, sink);
            return Err(e.into());
        }

        self.params = Some(params);
        self.cloud = CloudState::Online;
        led.set_cloud_led(true);
        sink.emit(&AppEvent::CloudStarted);
        info!("Cloud started");
        Ok(())
    }

    /// Give up on the cloud task without ever connecting (e.g. missing
    /// credentials).
    pub fn abort_start(&mut self, led: &mut impl IndicatorPort, sink: &mut impl EventSink) {
        self.halt(led, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply a link or ack notification.  The returned action tells the
    /// caller whether the cloud session needs starting.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        shadow: &mut impl ShadowPort,
        led: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) -> LinkAction {
        match cmd {
            AppCommand::LinkUp => {
                let action = self.link.on_link_up();
                info!("link up ({:?})", self.link.state());
                action
            }
            AppCommand::LinkLost | AppCommand::ConnectFailed => {
                let action = if cmd == AppCommand::LinkLost {
                    self.link.on_link_lost()
                } else {
                    self.link.on_connect_failed()
                };
                if action == LinkAction::DropCloud {
                    self.drop_cloud(shadow, led, sink);
                }
                action
            }
            AppCommand::ShadowAck(status) => {
                if self.acks.resolve() {
                    log_ack(status);
                    sink.emit(&AppEvent::ShadowAck(status));
                } else {
                    debug!("shadow: unsolicited {} ack ignored", status);
                }
                LinkAction::None
            }
        }
    }

    // ── Periodic work ─────────────────────────────────────────

    /// One main-loop iteration: expire acks, then sample and publish when
    /// their fixed intervals come due.
    ///
    /// `hw` provides both the ADC and the cloud indicator.
    pub fn tick<H: AdcPort + IndicatorPort>(
        &mut self,
        hw: &mut H,
        shadow: &mut impl ShadowPort,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> Result<()> {
        self.expire_acks(sink, now_ms);

        if now_ms >= self.next_sample_ms {
            self.next_sample_ms = now_ms + u64::from(self.config.sample_interval_ms);
            self.sample(hw, sink);
        }

        if now_ms >= self.next_publish_ms {
            self.next_publish_ms = now_ms + u64::from(self.config.publish_interval_ms);
            return self.publish_cycle(shadow, hw, sink, now_ms);
        }
        Ok(())
    }

    /// Read the ADC.  A failed read keeps the previous reading.
    pub fn sample(&mut self, adc: &mut impl AdcPort, sink: &mut impl EventSink) {
        match adc.read_millivolts() {
            Ok(mv) => {
                let reading = AdcReading::from_millivolts(mv);
                debug!("adc: {} mV", reading);
                self.latest = Some(reading);
                sink.emit(&AppEvent::Sampled(reading));
            }
            Err(e) => {
                warn!("adc: {}; keeping previous reading", e);
                sink.emit(&AppEvent::SampleFailed);
            }
        }
    }

    /// Re-establish the session if the link came back, then publish the
    /// latest reading if it changed since the last successful publish.
    pub fn publish_cycle(
        &mut self,
        shadow: &mut impl ShadowPort,
        led: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> Result<()> {
        if matches!(self.cloud, CloudState::NotStarted | CloudState::Halted) {
            return Ok(());
        }

        if self.link.state() == LinkState::Reconnected {
            self.reconnect(shadow, led, sink)?;
        }

        if self.cloud != CloudState::Online {
            sink.emit(&AppEvent::PublishSkipped(SkipReason::Offline));
            return Ok(());
        }

        let Some(reading) = self.latest else {
            sink.emit(&AppEvent::PublishSkipped(SkipReason::NoReading));
            return Ok(());
        };

        if let Some(last) = self.last_published {
            if !reading.differs_from(&last) {
                sink.emit(&AppEvent::PublishSkipped(SkipReason::Unchanged));
                return Ok(());
            }
        }

        let Some(thing) = self.params.as_ref().map(|p| p.cloud.thing_name.clone()) else {
            return Err(ShadowError::NotConnected.into());
        };
        let payload = ShadowDocument::reported_adc(&reading)
            .and_then(|doc| doc.to_json())
            .map_err(|_| Error::Shadow(ShadowError::Serialize))?;

        info!("Publishing '{}' to AWS", payload);
        match shadow.update(&thing, &payload) {
            Ok(()) => {
                self.last_published = Some(reading);
                if let Some(evicted) = self.acks.track(now_ms) {
                    sink.emit(&AppEvent::ShadowAck(evicted));
                }
                sink.emit(&AppEvent::Published { reading });
                Ok(())
            }
            Err(e) => {
                warn!("Sending property failed: {}", e);
                sink.emit(&AppEvent::PublishFailed);
                Err(e.into())
            }
        }
    }

    // ── Factory reset ─────────────────────────────────────────

    /// Wipe AWS and Wi-Fi credentials.  The caller restarts the device.
    pub fn factory_reset(
        &mut self,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        warn!("factory reset: erasing stored credentials");
        storage.erase_namespace(AWS_NAMESPACE)?;
        storage.erase_namespace(WIFI_NAMESPACE)?;
        sink.emit(&AppEvent::FactoryReset);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn latest(&self) -> Option<AdcReading> {
        self.latest
    }

    pub fn last_published(&self) -> Option<AdcReading> {
        self.last_published
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn cloud_state(&self) -> CloudState {
        self.cloud
    }

    pub fn pending_acks(&self) -> usize {
        self.acks.pending()
    }

    // ── Internal ──────────────────────────────────────────────

    fn reconnect(
        &mut self,
        shadow: &mut impl ShadowPort,
        led: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let result = match self.params.as_ref() {
            Some(params) => shadow.connect(params),
            None => Err(ShadowError::NotConnected),
        };
        match result {
            Ok(()) => {
                self.link.cloud_reconnected();
                self.cloud = CloudState::Online;
                led.set_cloud_led(true);
                sink.emit(&AppEvent::CloudReconnected);
                info!("shadow: reconnected");
                Ok(())
            }
            Err(e) => {
                error!("aws shadow reconnect failed: {}", e);
                self.halt(led, sink);
                Err(e.into())
            }
        }
    }

    fn drop_cloud(
        &mut self,
        shadow: &mut impl ShadowPort,
        led: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) {
        if self.cloud != CloudState::Online {
            return;
        }
        if let Err(e) = shadow.disconnect() {
            warn!("aws iot shadow disconnect error: {}", e);
        }
        self.acks.clear();
        self.cloud = CloudState::Offline;
        led.set_cloud_led(false);
        sink.emit(&AppEvent::CloudDropped);
        warn!("link lost: shadow session dropped");
    }

    fn halt(&mut self, led: &mut impl IndicatorPort, sink: &mut impl EventSink) {
        self.cloud = CloudState::Halted;
        self.acks.clear();
        led.set_cloud_led(false);
        sink.emit(&AppEvent::CloudHalted);
    }

    fn expire_acks(&mut self, sink: &mut impl EventSink, now_ms: u64) {
        for _ in 0..self.acks.expire(now_ms) {
            log_ack(AckStatus::Timeout);
            sink.emit(&AppEvent::ShadowAck(AckStatus::Timeout));
        }
    }
}

fn log_ack(status: AckStatus) {
    match status {
        AckStatus::Accepted => info!("Shadow publish state change accepted"),
        AckStatus::Rejected => warn!("Shadow publish state change rejected"),
        AckStatus::Timeout => warn!("Shadow publish state change timeout occurred"),
    }
}
