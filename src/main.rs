//! AWS IoT shadow sensor firmware entry point.
//!
//! Hexagonal architecture with a single event-driven main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   ShadowClient    │
//! │  (Adc+Indicator)   (EventSink)    (Config+NVS) (ShadowPort)    │
//! │  WifiAdapter       Esp32Time      ButtonDriver                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Link state · sample/publish cadence · shadow acks     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::convert::Infallible;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{debug, error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver, Pull};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use aws_sensor::adapters::device_id;
use aws_sensor::adapters::hardware::HardwareAdapter;
use aws_sensor::adapters::log_sink::LogEventSink;
use aws_sensor::adapters::nvs::NvsAdapter;
use aws_sensor::adapters::provisioning::{
    AP_PASSPHRASE, AP_SSID, ProvisioningServer, ProvisioningStatus,
};
use aws_sensor::adapters::shadow_client::ShadowClient;
use aws_sensor::adapters::time::Esp32TimeAdapter;
use aws_sensor::adapters::wifi::{ConnectivityPort, WifiAdapter};
use aws_sensor::app::ports::ConfigPort;
use aws_sensor::app::service::AppService;
use aws_sensor::config::AppConfig;
use aws_sensor::drivers::button::{ButtonDriver, ButtonEvent};
use aws_sensor::drivers::hw_init;
use aws_sensor::drivers::status_led::StatusLed;
use aws_sensor::error::Error;
use aws_sensor::events::{self, Event, push_event};
use aws_sensor::link::LinkAction;
use aws_sensor::pins;
use aws_sensor::sensors::adc::AdcSensor;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AWS sensor v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = AppConfig::default();
    config.validate().map_err(Error::Init)?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs = NvsAdapter::new().map_err(Error::from)?;

    // ── 2. Hardware ───────────────────────────────────────────
    let adc = match hw_init::init_adc(&config.adc) {
        Ok(unit) => AdcSensor::new(unit, config.adc.clone()),
        Err(e) => {
            // Keep running: the cloud side still works, samples just fail.
            error!("ADC init failed: {}", e);
            AdcSensor::unavailable(config.adc.clone())
        }
    };

    // SAFETY: these GPIO numbers are not claimed anywhere else from
    // `peripherals.pins`.
    let led_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::CLOUD_LED_GPIO) })?;
    let mut button_pin = PinDriver::input(unsafe { AnyIOPin::new(pins::BUTTON_GPIO) })?;
    button_pin.set_pull(Pull::Up)?;

    let mut hw = HardwareAdapter::new(adc, StatusLed::new(led_pin));
    let mut button =
        ButtonDriver::new(button_pin, config.button_debounce_ms, config.factory_reset_hold_ms);

    // ── 3. Identity + connectivity ────────────────────────────
    let mac = device_id::read_mac();
    let client_id = device_id::client_id(&mac);
    info!("MAC {} -> client id {}", device_id::format_mac(&mac), client_id);

    let mut wifi =
        WifiAdapter::new(peripherals.modem, sysloop.clone(), nvs_partition).map_err(Error::from)?;

    let status = ProvisioningStatus::read(&nvs);
    let mut nvs = if status.is_complete() {
        nvs
    } else {
        warn!("Device not provisioned ({:?})", status);
        match provisioning_mode(&mut wifi, nvs)? {}
    };

    match wifi.load_credentials(&nvs) {
        Ok(()) => {
            if let Err(e) = wifi.connect() {
                warn!("WiFi: initial connect failed ({}), will retry", e);
            }
        }
        Err(e) => warn!("WiFi: {}", e),
    }

    let mut shadow = ShadowClient::new();
    let mut time = Esp32TimeAdapter::new();
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(config.clone());

    info!("System ready. Entering event loop.");

    // ── 4. Event loop ─────────────────────────────────────────
    loop {
        let now_ms = time.uptime_ms();
        let mut factory_reset = false;

        events::drain_events(|event| {
            if event == Event::ButtonLongPress {
                factory_reset = true;
                return;
            }
            let Some(cmd) = event.to_command() else { return };
            if app.handle_command(cmd, &mut shadow, &mut hw, &mut sink) != LinkAction::StartCloud {
                return;
            }

            // First link up: seed the clock for TLS, then start the cloud.
            time.set_default_time();
            match nvs.load_cloud(&client_id) {
                Ok(params) => {
                    if let Err(e) = app.start(&mut shadow, params, &mut hw, &mut sink) {
                        error!("Cloud start failed: {}", e);
                    }
                }
                Err(e) => {
                    error!("Cloud config: {}", e);
                    app.abort_start(&mut hw, &mut sink);
                }
            }
        });

        if factory_reset {
            info!("Button: long press, resetting to factory settings");
            match app.factory_reset(&mut nvs, &mut sink) {
                Ok(()) => esp_idf_svc::hal::reset::restart(),
                Err(e) => error!("Factory reset failed: {}", e),
            }
        }

        if let Some(ButtonEvent::LongPress) = button.tick(now_ms) {
            push_event(Event::ButtonLongPress);
        }

        if let Err(e) = app.tick(&mut hw, &mut shadow, &mut sink, now_ms) {
            debug!("cycle: {}", e);
        }

        wifi.poll(now_ms);

        FreeRtos::delay_ms(config.loop_tick_ms);
    }
}

/// Serve the provisioning API on the soft AP until a client asks for a
/// restart.  Never returns normally.
fn provisioning_mode(wifi: &mut WifiAdapter, nvs: NvsAdapter) -> Result<Infallible> {
    wifi.start_access_point(AP_SSID, AP_PASSPHRASE).map_err(Error::from)?;
    let server = ProvisioningServer::start(Arc::new(Mutex::new(nvs)))?;
    info!("Provisioning: join '{}' and POST to http://192.168.71.1/api/", AP_SSID);

    loop {
        if server.restart_requested() {
            // Let the reply reach the client first.
            FreeRtos::delay_ms(500);
            esp_idf_svc::hal::reset::restart();
        }
        FreeRtos::delay_ms(200);
    }
}
