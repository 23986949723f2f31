//! Decision engine: picks at most one action from a fresh set of medians.
//!
//! Rules are checked in priority order and the first match wins:
//!
//! 1. CO2 above setpoint → [`Action::Co2`]
//! 2. RH above setpoint + band, RhDown not locked out → [`Action::RhDown`]
//! 3. RH below setpoint − band, RhUp not locked out → [`Action::RhUp`]
//! 4. No ventilation for the baseline interval → [`Action::Baseline`]

use log::info;

use super::action::{Action, ActionContext};
use super::median::Medians;
use crate::clock::elapsed_ms;
use crate::fsm::context::{Outputs, Setpoints};

/// Thresholds the rules need, already scaled where they are durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionRules {
    pub rh_hysteresis_percent: f32,
    pub baseline_interval_ms: u32,
}

/// Which rule fires for these inputs, without side effects.
pub fn decide(
    medians: &Medians,
    setpoints: &Setpoints,
    action: &ActionContext,
    rules: &DecisionRules,
    now_ms: u32,
) -> Action {
    if !action.is_idle() {
        return Action::None;
    }

    if medians.co2_ppm > i32::from(setpoints.co2_ppm) {
        return Action::Co2;
    }

    let rh_high = setpoints.rh_percent + rules.rh_hysteresis_percent;
    if medians.rh_percent > rh_high && action.rh_down_allowed(now_ms) {
        return Action::RhDown;
    }

    let rh_low = setpoints.rh_percent - rules.rh_hysteresis_percent;
    if medians.rh_percent < rh_low && action.rh_up_allowed(now_ms) {
        return Action::RhUp;
    }

    if elapsed_ms(now_ms, action.last_ventilation_ms) >= rules.baseline_interval_ms {
        return Action::Baseline;
    }

    Action::None
}

/// Decide and start the chosen action.  Returns the action started, if any.
pub fn evaluate(
    medians: &Medians,
    setpoints: &Setpoints,
    action: &mut ActionContext,
    outputs: &mut Outputs,
    rules: &DecisionRules,
    now_ms: u32,
) -> Option<Action> {
    let chosen = decide(medians, setpoints, action, rules, now_ms);
    if chosen == Action::None {
        return None;
    }
    info!(
        "Controller: CO2={} ppm RH={:.1}% (setpoints {} ppm / {:.1}%) -> {:?}",
        medians.co2_ppm, medians.rh_percent, setpoints.co2_ppm, setpoints.rh_percent, chosen
    );
    action.start(chosen, now_ms, outputs).then_some(chosen)
}
