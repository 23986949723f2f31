//! Chamber simulator: the full control kernel on a host, with simulated
//! sensors, simulated flash and the HTTP front end.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  SimulatedSource  GpioActuators<SimPin>  LogEventSink        │
//! │  (SensorSource)   (ActuatorPort)         (EventSink)         │
//! │  SimulatedFlash   SystemClock            WebServer           │
//! │  (BlockDevice)    (Clock)                (HTTP)              │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              ChamberService (pure logic)               │  │
//! │  │  Measure FSM · Actions · Heater · History · Storage    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Environment:
//! - `RUST_LOG`: log filter (default `info`)
//! - `CHAMBER_SPEEDUP`: time acceleration factor (default from config)
//! - `CHAMBER_HTTP_ADDR`: listen address (default `127.0.0.1:8080`)
//! - `CHAMBER_SIMULATE_SENSORS`: `false` reads the sensor bus instead of
//!   the simulator.  A host has no bus, so readings stay at zero.

use core::convert::Infallible;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use chamber::adapters::block_device::SimulatedFlash;
use chamber::adapters::hardware::{GpioActuators, NoSensors, Polarity};
use chamber::adapters::log_sink::LogEventSink;
use chamber::adapters::time::SystemClock;
use chamber::app::service::ChamberService;
use chamber::clock::{Clock, elapsed_ms};
use chamber::config::ChamberConfig;
use chamber::sensors::select_source;
use chamber::storage::Storage;
use chamber::web::WebServer;

/// Simulated flash size; the record ring is carved from its tail.
const FLASH_BYTES: usize = 4 * 1024 * 1024;
const FLASH_ERASE_BYTES: usize = 4096;

/// Main loop period.
const LOOP_SLEEP: Duration = Duration::from_millis(5);

/// Interval between status lines (ms, real time).
const STATUS_LOG_MS: u32 = 10_000;

// ── Simulated relay pin ───────────────────────────────────────

/// Output pin that only logs level changes.
struct SimPin {
    name: &'static str,
    high: bool,
}

impl SimPin {
    fn new(name: &'static str) -> Self {
        Self { name, high: false }
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.high {
            debug!("PIN | {} low", self.name);
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if !self.high {
            debug!("PIN | {} high", self.name);
        }
        self.high = true;
        Ok(())
    }
}

// ── Entry point ───────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    info!(
        "Chamber simulator starting (speedup x{}, K={})",
        config.speedup_factor, config.median_sample_count
    );
    if !config.simulate_sensors {
        warn!("No sensor bus on this host, every reading will fail");
    }

    let clock = SystemClock::new();
    let storage = Storage::new(SimulatedFlash::new(FLASH_BYTES, FLASH_ERASE_BYTES), &config);
    let read_timeout = Duration::from_millis(u64::from(config.http_read_timeout_ms));
    let mut sensors = select_source(&config, fastrand::u64(..), NoSensors);

    let mut service = ChamberService::new(config, storage);
    let mut outputs = GpioActuators::new(
        SimPin::new("swirler"),
        SimPin::new("fresh_air"),
        SimPin::new("fogger"),
        SimPin::new("heater"),
        Polarity::ActiveHigh,
    );
    let mut sink = LogEventSink::new();

    let addr = std::env::var("CHAMBER_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
    let mut web = WebServer::bind(addr.as_str(), read_timeout)
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;

    service.start(clock.now_ms(), &mut outputs, &mut sink);
    let mut last_status = clock.now_ms();

    loop {
        let now = clock.now_ms();
        service.tick(now, &mut sensors, &mut outputs, &mut sink);

        // Client errors are already logged by the server.
        let _ = web.poll(&mut service);

        if elapsed_ms(now, last_status) >= STATUS_LOG_MS {
            last_status = now;
            let s = service.status();
            info!(
                "STATUS | {:?} | action={:?}/{:?} | CO2={}ppm RH={:.1}% T={:.1}C | uptime={}s",
                s.measure_stage,
                s.action,
                s.action_stage,
                s.sensors.co2_main(),
                s.sensors.rh_main(),
                s.sensors.temp_main(),
                clock.uptime_secs()
            );
        }

        std::thread::sleep(LOOP_SLEEP);
    }
}

/// Defaults, overridden from the environment, then validated.
fn load_config() -> Result<ChamberConfig> {
    let mut config = ChamberConfig::default();

    if let Ok(raw) = std::env::var("CHAMBER_SPEEDUP") {
        config.speedup_factor = raw
            .trim()
            .parse()
            .with_context(|| format!("CHAMBER_SPEEDUP is not a number: {raw:?}"))?;
    }
    if let Ok(raw) = std::env::var("CHAMBER_SIMULATE_SENSORS") {
        config.simulate_sensors = raw
            .trim()
            .parse()
            .with_context(|| format!("CHAMBER_SIMULATE_SENSORS is not true/false: {raw:?}"))?;
    }

    config
        .validate()
        .map_err(chamber::error::Error::from)
        .context("invalid configuration")?;
    Ok(config)
}
