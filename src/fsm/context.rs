//! Shared mutable context threaded through every FSM handler.
//!
//! `ChamberContext` is the single struct that measurement-stage handlers
//! read from and write to.  It holds the clock reading and sensor
//! snapshot for the current tick, the actuator outputs, the setpoints,
//! the action machine and the median window.  Think of it as the
//! "blackboard" in a blackboard architecture.

use serde::Serialize;

use crate::clock::TimeScale;
use crate::config::{ChamberConfig, MEDIAN_SAMPLE_CAPACITY};
use crate::control::action::{Action, ActionContext, ActionDurations};
use crate::control::decision::DecisionRules;
use crate::control::median::Medians;
use crate::sensors::SensorSnapshot;

// ---------------------------------------------------------------------------
// Actuator outputs (written by handlers and the action machine)
// ---------------------------------------------------------------------------

/// Desired state of the four chamber outputs.  The service applies these
/// through the actuator port after every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Outputs {
    pub swirler: bool,
    pub fresh_air: bool,
    pub fogger: bool,
    pub heater: bool,
}

impl Outputs {
    /// Everything off.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Setpoints
// ---------------------------------------------------------------------------

/// Operator targets, mirrored from storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Setpoints {
    pub co2_ppm: u16,
    pub rh_percent: f32,
    pub temp_c: f32,
}

// ---------------------------------------------------------------------------
// Measurement window
// ---------------------------------------------------------------------------

/// Samples collected by the Median stage.
#[derive(Debug, Clone, Default)]
pub struct MeasureContext {
    pub stage_start_ms: u32,
    pub next_sample_ms: u32,
    pub sample_index: usize,
    pub co2: [i32; MEDIAN_SAMPLE_CAPACITY],
    pub rh: [f32; MEDIAN_SAMPLE_CAPACITY],
    pub temp: [f32; MEDIAN_SAMPLE_CAPACITY],
}

impl MeasureContext {
    /// Append the main channels of `s`.  Returns `false` when full.
    pub fn record(&mut self, s: &SensorSnapshot) -> bool {
        let i = self.sample_index;
        if i >= MEDIAN_SAMPLE_CAPACITY {
            return false;
        }
        self.co2[i] = s.co2_main();
        self.rh[i] = s.rh_main();
        self.temp[i] = s.temp_main();
        self.sample_index += 1;
        true
    }

    /// Medians over the samples collected so far.
    pub fn medians(&self) -> Medians {
        let n = self.sample_index.min(MEDIAN_SAMPLE_CAPACITY);
        Medians {
            co2_ppm: crate::control::median::median_i32(&self.co2[..n]),
            rh_percent: crate::control::median::median_f32(&self.rh[..n]),
            temp_c: crate::control::median::median_f32(&self.temp[..n]),
        }
    }
}

// ---------------------------------------------------------------------------
// Scaled timings
// ---------------------------------------------------------------------------

/// Measurement-cycle durations after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureTimings {
    pub swirl_ms: u32,
    pub sample_period_ms: u32,
    pub wait_ms: u32,
    /// Number of samples per median (K).
    pub sample_count: usize,
}

impl MeasureTimings {
    pub fn from_config(c: &ChamberConfig, scale: TimeScale) -> Self {
        Self {
            swirl_ms: scale.scale(c.measure_swirl_ms),
            sample_period_ms: scale.scale(c.median_sample_period_ms),
            wait_ms: scale.scale(c.wait_between_cycles_ms),
            sample_count: usize::from(c.median_sample_count).clamp(1, MEDIAN_SAMPLE_CAPACITY),
        }
    }
}

// ---------------------------------------------------------------------------
// ChamberContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct ChamberContext {
    // -- Timing --
    /// Clock reading for the current tick.
    pub now_ms: u32,
    pub scale: TimeScale,
    pub measure_timings: MeasureTimings,
    pub action_durations: ActionDurations,
    pub rules: DecisionRules,

    // -- Inputs --
    /// Latest sensor readings.  Updated before each FSM tick.
    pub sensors: SensorSnapshot,
    pub setpoints: Setpoints,

    // -- Outputs --
    pub outputs: Outputs,

    // -- Control state --
    pub measure: MeasureContext,
    pub action: ActionContext,
    /// Medians from the most recent evaluation.
    pub last_medians: Option<Medians>,
    /// Set by the Evaluate stage when it started an action this tick;
    /// drained by the service.
    pub started_action: Option<Action>,

    // -- Configuration --
    pub config: ChamberConfig,
}

impl ChamberContext {
    pub fn new(config: ChamberConfig, setpoints: Setpoints) -> Self {
        let scale = TimeScale::new(config.speedup_factor);
        Self {
            now_ms: 0,
            scale,
            measure_timings: MeasureTimings::from_config(&config, scale),
            action_durations: ActionDurations::from_config(&config, scale),
            rules: DecisionRules {
                rh_hysteresis_percent: config.rh_hysteresis_percent,
                baseline_interval_ms: scale.scale(config.baseline_interval_ms),
            },
            sensors: SensorSnapshot::default(),
            setpoints,
            outputs: Outputs::all_off(),
            measure: MeasureContext::default(),
            action: ActionContext::new(0),
            last_medians: None,
            started_action: None,
            config,
        }
    }

    /// Milliseconds since the current measurement stage began.
    pub fn ms_in_stage(&self) -> u32 {
        crate::clock::elapsed_ms(self.now_ms, self.measure.stage_start_ms)
    }
}
