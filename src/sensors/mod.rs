//! Sensor subsystem: the [`SensorSnapshot`] value and both sample sources.
//!
//! The control kernel never knows which source it talks to.  A
//! [`SimulatedSource`] or a [`HardwareSource`] is picked at construction
//! time and injected through the [`SensorSource`](crate::app::ports::SensorSource)
//! port.

pub mod hardware;
pub mod simulated;

use log::info;
use serde::Serialize;

use crate::app::ports::{SensorDriver, SensorSource};
use crate::clock::TimeScale;
use crate::config::ChamberConfig;

pub use hardware::HardwareSource;
pub use simulated::SimulatedSource;

/// A point-in-time reading of every chamber sensor.
///
/// Index 0 of each group is the main channel used for control; the other
/// channels are only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// CO2 in ppm: main, secondary.
    pub co2_ppm: [i32; 2],
    /// Relative humidity in %: main, secondary.
    pub rh_percent: [f32; 2],
    /// Temperature in °C: inner main, inner secondary, outer.
    pub temp_c: [f32; 3],
}

impl SensorSnapshot {
    pub fn co2_main(&self) -> i32 {
        self.co2_ppm[0]
    }

    pub fn rh_main(&self) -> f32 {
        self.rh_percent[0]
    }

    pub fn temp_main(&self) -> f32 {
        self.temp_c[0]
    }
}

/// Build the source [`ChamberConfig::simulate_sensors`] asks for: the
/// random-walk simulator seeded with `seed`, or `driver` behind a
/// [`HardwareSource`].
pub fn select_source<D>(config: &ChamberConfig, seed: u64, driver: D) -> Box<dyn SensorSource>
where
    D: SensorDriver + 'static,
{
    let scale = TimeScale::new(config.speedup_factor);
    if config.simulate_sensors {
        info!("Sensors: simulated source (seed {})", seed);
        Box::new(SimulatedSource::new(scale, seed))
    } else {
        info!("Sensors: hardware source");
        Box::new(HardwareSource::new(driver, scale))
    }
}
