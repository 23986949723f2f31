//! Application core: the control kernel, free of I/O.
//!
//! This module holds the business rules for the chamber: measurement
//! cycle orchestration, action dispatch, heater regulation, history
//! sampling and setpoint persistence.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
