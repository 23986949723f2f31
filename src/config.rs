//! System configuration parameters
//!
//! All tunable parameters for the climate chamber controller.  Durations are
//! stored in real-time milliseconds; the control loop divides them by
//! `speedup_factor` through [`TimeScale`](crate::clock::TimeScale) so a
//! simulated chamber can run many times faster than the real one.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of 16-bit values held by the setpoint store.
pub const STORAGE_NUM_VALUES: usize = 10;

/// Fixed size of one persisted record / storage slot in bytes.
pub const STORAGE_SLOT_SIZE: usize = 64;

/// Capacity of the per-channel history ring buffers.
pub const HISTORY_LEN: usize = 200;

/// Upper bound for the number of samples the median stage can collect.
pub const MEDIAN_SAMPLE_CAPACITY: usize = 10;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberConfig {
    // --- Testing & simulation ---
    /// Divisor applied to every control-loop duration (1 = real time).
    pub speedup_factor: u32,
    /// Use the simulated sensor source instead of hardware drivers.
    pub simulate_sensors: bool,

    // --- History ---
    /// Interval between history samples (ms, scaled).
    pub sample_interval_ms: u32,

    // --- Measurement cycle (ms, scaled) ---
    /// Swirl before sampling so the chamber air is homogeneous.
    pub measure_swirl_ms: u32,
    /// Spacing between samples of one median window.
    pub median_sample_period_ms: u32,
    /// Number of samples reduced to one median (K).
    pub median_sample_count: u8,
    /// Pause between the end of an evaluation and the next swirl.
    pub wait_between_cycles_ms: u32,

    // --- Action stage durations (ms, scaled) ---
    pub co2_swirl_ms: u32,
    pub co2_settle_ms: u32,
    pub rh_down_fresh_air_ms: u32,
    pub rh_down_swirl_ms: u32,
    pub rh_down_settle_ms: u32,
    pub rh_up_fogger_ms: u32,
    pub rh_up_mix_ms: u32,
    pub rh_up_settle_ms: u32,
    pub baseline_fresh_air_ms: u32,
    pub baseline_settle_ms: u32,

    // --- Lockout and baseline (ms, scaled) ---
    /// Window during which the opposing humidity action is blocked.
    pub rh_lockout_ms: u32,
    /// Maximum time without ventilation before a baseline exchange.
    pub baseline_interval_ms: u32,

    // --- Thresholds ---
    /// RH band around the setpoint (± percent).
    pub rh_hysteresis_percent: f32,
    /// Heater switches on this far below the temperature setpoint (°C).
    pub heater_on_threshold_c: f32,
    /// Heater check cadence (ms, scaled).
    pub heater_check_interval_ms: u32,

    // --- Storage ---
    /// Quiet time after the last value change before a flush (ms, not scaled).
    pub persist_quiet_ms: u32,
    /// Number of slots in the record ring.
    pub storage_slots: u32,
    /// Size of one slot in bytes.
    pub storage_slot_size: u32,

    // --- HTTP ---
    /// Per-request read timeout (ms, not scaled).
    pub http_read_timeout_ms: u32,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            speedup_factor: 10,
            simulate_sensors: true,

            sample_interval_ms: 3_000,

            measure_swirl_ms: 5_000,
            median_sample_period_ms: 1_000,
            median_sample_count: 5,
            wait_between_cycles_ms: 60_000,

            co2_swirl_ms: 10_000,
            co2_settle_ms: 20_000,
            rh_down_fresh_air_ms: 10_000,
            rh_down_swirl_ms: 10_000,
            rh_down_settle_ms: 20_000,
            rh_up_fogger_ms: 5_000,
            rh_up_mix_ms: 10_000,
            rh_up_settle_ms: 120_000,
            baseline_fresh_air_ms: 10_000,
            baseline_settle_ms: 10_000,

            rh_lockout_ms: 180_000,      // 3 min
            baseline_interval_ms: 600_000, // 10 min

            rh_hysteresis_percent: 2.0,
            heater_on_threshold_c: 1.0,
            heater_check_interval_ms: 1_000,

            persist_quiet_ms: 5_000,
            storage_slots: 100,
            storage_slot_size: STORAGE_SLOT_SIZE as u32,

            http_read_timeout_ms: 2_000,
        }
    }
}

impl ChamberConfig {
    /// Config tuned for unit tests: real time (no speed-up).
    pub fn real_time() -> Self {
        Self {
            speedup_factor: 1,
            ..Self::default()
        }
    }

    /// Total byte size of the record ring before erase-size rounding.
    pub fn storage_region_bytes(&self) -> u64 {
        u64::from(self.storage_slots) * u64::from(self.storage_slot_size)
    }

    /// Reject configurations the control kernel cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speedup_factor == 0 {
            return Err(ConfigError::ValidationFailed("speedup_factor must be >= 1"));
        }
        if self.median_sample_count == 0
            || usize::from(self.median_sample_count) > MEDIAN_SAMPLE_CAPACITY
        {
            return Err(ConfigError::ValidationFailed(
                "median_sample_count must be 1..=MEDIAN_SAMPLE_CAPACITY",
            ));
        }
        if !(self.rh_hysteresis_percent > 0.0 && self.rh_hysteresis_percent < 20.0) {
            return Err(ConfigError::ValidationFailed(
                "rh_hysteresis_percent must be in (0, 20)",
            ));
        }
        if !(self.heater_on_threshold_c >= 0.0 && self.heater_on_threshold_c <= 10.0) {
            return Err(ConfigError::ValidationFailed(
                "heater_on_threshold_c must be within 0.0..=10.0",
            ));
        }
        if self.storage_slot_size as usize != STORAGE_SLOT_SIZE {
            return Err(ConfigError::ValidationFailed("storage_slot_size must be 64"));
        }
        if self.storage_slots < 2 {
            return Err(ConfigError::ValidationFailed("storage_slots must be >= 2"));
        }
        if self.sample_interval_ms == 0 || self.median_sample_period_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "sampling intervals must be non-zero",
            ));
        }
        Ok(())
    }
}
