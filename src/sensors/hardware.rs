//! Hardware sensor source.
//!
//! Wraps a [`SensorDriver`] (the bus-level drivers live outside this
//! crate) and gives it the same cadence contract as the simulated source.
//! A failed read is logged and the previous good snapshot retained, so a
//! single flaky sensor never stalls the control loop.

use log::warn;

use crate::app::ports::{SensorDriver, SensorSource};
use crate::clock::{TimeScale, elapsed_ms};

use super::SensorSnapshot;

const READ_PERIOD_MS: u32 = 1_000;

pub struct HardwareSource<D: SensorDriver> {
    driver: D,
    period_ms: u32,
    last_read_ms: Option<u32>,
    last_good: SensorSnapshot,
    consecutive_failures: u32,
}

impl<D: SensorDriver> HardwareSource<D> {
    pub fn new(driver: D, scale: TimeScale) -> Self {
        Self {
            driver,
            period_ms: scale.scale(READ_PERIOD_MS),
            last_read_ms: None,
            last_good: SensorSnapshot::default(),
            consecutive_failures: 0,
        }
    }

    /// Reads that failed in a row since the last good one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: SensorDriver> SensorSource for HardwareSource<D> {
    fn read(&mut self, now_ms: u32) -> SensorSnapshot {
        let due = self
            .last_read_ms
            .is_none_or(|last| elapsed_ms(now_ms, last) >= self.period_ms);
        if !due {
            return self.last_good;
        }
        self.last_read_ms = Some(now_ms);

        match self.driver.measure() {
            Ok(snapshot) => {
                self.last_good = snapshot;
                self.consecutive_failures = 0;
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    "Sensors: read failed ({}), keeping last good reading ({} in a row)",
                    e, self.consecutive_failures
                );
            }
        }
        self.last_good
    }
}
