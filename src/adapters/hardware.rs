//! Hardware adapter: bridges GPIO relay outputs to the actuator port.
//!
//! Any `embedded_hal` [`OutputPin`] works, so the same adapter drives
//! ESP32 GPIOs, an I/O expander, or a mock pin in tests.  This is the only
//! module in the crate that touches output pins.
//!
//! [`NoSensors`] stands in for the sensor bus on a board that has none.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::{ActuatorPort, SensorDriver};
use crate::error::SensorError;
use crate::sensors::SensorSnapshot;

/// Relay polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    /// Typical for opto-isolated relay boards.
    ActiveLow,
}

/// The four chamber relays behind one [`ActuatorPort`].
pub struct GpioActuators<S, F, G, H> {
    swirler: S,
    fresh_air: F,
    fogger: G,
    heater: H,
    polarity: Polarity,
    write_errors: u32,
}

impl<S, F, G, H> GpioActuators<S, F, G, H>
where
    S: OutputPin,
    F: OutputPin,
    G: OutputPin,
    H: OutputPin,
{
    pub fn new(swirler: S, fresh_air: F, fogger: G, heater: H, polarity: Polarity) -> Self {
        Self {
            swirler,
            fresh_air,
            fogger,
            heater,
            polarity,
            write_errors: 0,
        }
    }

    /// Pin writes that returned an error since construction.
    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }

    pub fn release(self) -> (S, F, G, H) {
        (self.swirler, self.fresh_air, self.fogger, self.heater)
    }
}

/// Drive `pin` to the level that means `on` under `polarity`.
fn drive<P: OutputPin>(pin: &mut P, on: bool, polarity: Polarity, name: &str, errors: &mut u32) {
    let high = match polarity {
        Polarity::ActiveHigh => on,
        Polarity::ActiveLow => !on,
    };
    let result = if high { pin.set_high() } else { pin.set_low() };
    if result.is_err() {
        *errors = errors.saturating_add(1);
        warn!("GPIO: failed to switch {} {}", name, if on { "on" } else { "off" });
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<S, F, G, H> ActuatorPort for GpioActuators<S, F, G, H>
where
    S: OutputPin,
    F: OutputPin,
    G: OutputPin,
    H: OutputPin,
{
    fn set_swirler(&mut self, on: bool) {
        drive(&mut self.swirler, on, self.polarity, "swirler", &mut self.write_errors);
    }

    fn set_fresh_air(&mut self, on: bool) {
        drive(&mut self.fresh_air, on, self.polarity, "fresh air", &mut self.write_errors);
    }

    fn set_fogger(&mut self, on: bool) {
        drive(&mut self.fogger, on, self.polarity, "fogger", &mut self.write_errors);
    }

    fn set_heater(&mut self, on: bool) {
        drive(&mut self.heater, on, self.polarity, "heater", &mut self.write_errors);
    }
}

// ── Sensor bus ────────────────────────────────────────────────

/// A board with no sensor bus.  Every measurement reports
/// [`SensorError::NotReady`], so a hardware source holds its last snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSensors;

impl SensorDriver for NoSensors {
    fn measure(&mut self) -> Result<SensorSnapshot, SensorError> {
        Err(SensorError::NotReady)
    }
}
