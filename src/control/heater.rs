//! Heater hysteresis loop.
//!
//! Runs on its own check interval, independent of the measurement cycle
//! and of any action or lockout.  On below `setpoint - on_threshold`, off
//! at or above `setpoint`.

use log::info;

use crate::clock::elapsed_ms;

#[derive(Debug, Clone)]
pub struct HeaterLoop {
    interval_ms: u32,
    on_threshold_c: f32,
    last_check_ms: Option<u32>,
}

impl HeaterLoop {
    /// `interval_ms` must already be scaled.
    pub fn new(interval_ms: u32, on_threshold_c: f32) -> Self {
        Self {
            interval_ms,
            on_threshold_c,
            last_check_ms: None,
        }
    }

    /// Run one check if due.  Returns the new heater state when it changed.
    pub fn tick(&mut self, now_ms: u32, temp_c: f32, setpoint_c: f32, heater_on: &mut bool) -> Option<bool> {
        if let Some(last) = self.last_check_ms {
            if elapsed_ms(now_ms, last) < self.interval_ms {
                return None;
            }
        }
        self.last_check_ms = Some(now_ms);

        if !*heater_on && temp_c < setpoint_c - self.on_threshold_c {
            *heater_on = true;
            info!("Heater: ON (temp={:.1}, setpoint={:.1})", temp_c, setpoint_c);
            Some(true)
        } else if *heater_on && temp_c >= setpoint_c {
            *heater_on = false;
            info!("Heater: OFF (temp={:.1}, setpoint={:.1})", temp_c, setpoint_c);
            Some(false)
        } else {
            None
        }
    }
}
