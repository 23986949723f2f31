//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ChamberService (domain)
//! ```
//!
//! Driven adapters (sensor sources, actuator outputs, event sinks, block
//! devices) implement these traits.  The
//! [`ChamberService`](super::service::ChamberService) consumes them via
//! generics, so the control kernel never touches hardware directly.

use crate::error::{DeviceError, SensorError};
use crate::sensors::SensorSnapshot;

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per tick.
///
/// Must not block.  Implementations refresh at their own cadence and
/// return the cached snapshot in between.
pub trait SensorSource {
    fn read(&mut self, now_ms: u32) -> SensorSnapshot;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn read(&mut self, now_ms: u32) -> SensorSnapshot {
        (**self).read(now_ms)
    }
}

/// Bus-level driver behind a [`HardwareSource`](crate::sensors::HardwareSource).
pub trait SensorDriver {
    /// Perform one full measurement of every channel.
    fn measure(&mut self) -> Result<SensorSnapshot, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the four on/off chamber outputs.
pub trait ActuatorPort {
    /// Air-mixing fan.
    fn set_swirler(&mut self, on: bool);

    /// Fresh-air valve / fan.
    fn set_fresh_air(&mut self, on: bool);

    /// Humidifier.
    fn set_fogger(&mut self, on: bool);

    fn set_heater(&mut self, on: bool);

    /// Switch every output off.
    fn all_off(&mut self) {
        self.set_swirler(false);
        self.set_fresh_air(false);
        self.set_fogger(false);
        self.set_heater(false);
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Block device port (driven adapter: domain ↔ raw flash)
// ───────────────────────────────────────────────────────────────

/// Raw block storage holding the setpoint record ring.
///
/// `init` reserves `region_bytes` at the device tail, divided into
/// `num_slots` slots of `slot_size` bytes.  Every other call fails with
/// [`DeviceError::NotInitialised`] until that reservation succeeded.
/// Calls are synchronous and bounded by the device's program/erase time.
pub trait BlockDevice {
    fn init(&mut self, region_bytes: u32, slot_size: u32, num_slots: u32)
    -> Result<(), DeviceError>;

    /// Read one whole slot; `buf.len()` must equal the slot size.
    fn read_slot(&mut self, index: u32, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Program one whole slot; the slot must be erased first.
    fn write_slot(&mut self, index: u32, data: &[u8]) -> Result<(), DeviceError>;

    /// Erase the entire reserved region.
    fn erase_region(&mut self) -> Result<(), DeviceError>;

    /// `true` once `init` has succeeded.
    fn is_available(&self) -> bool;
}
