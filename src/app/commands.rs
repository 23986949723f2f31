//! Inbound commands to the control kernel.
//!
//! These represent requests from the outside world (HTTP handlers, a
//! serial console, tests) that the
//! [`ChamberService`](super::service::ChamberService) interprets.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// New CO2 target in ppm; clamped to the allowed range.
    SetCo2Setpoint(u16),

    /// New relative-humidity target in percent; clamped.
    SetRhSetpoint(f32),

    /// New temperature target in degrees Celsius; clamped.
    SetTempSetpoint(f32),

    /// Bump the free-running counter.
    IncrementCounter,

    /// Persist pending changes immediately instead of waiting for the
    /// quiet period.
    SaveNow,
}
