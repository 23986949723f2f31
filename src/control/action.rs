//! Non-preemptive action state machine.
//!
//! ```text
//!  Co2       Swirl ──▶ Settle ──▶ done
//!  RhDown    FreshAir ──▶ Swirl ──▶ Settle ──▶ done  (locks RhUp)
//!  RhUp      Fogger ──▶ Mix ──▶ Settle ──▶ done      (locks RhDown)
//!  Baseline  FreshAir ──▶ Settle ──▶ done
//! ```
//!
//! Once started, an action runs every stage to completion; `start` is a
//! no-op while one is in progress.  Stage changes are driven purely by
//! elapsed time since the stage began.  Completion switches every output
//! off, heater included.

use log::{debug, info};
use serde::Serialize;

use crate::clock::{TimeScale, elapsed_ms};
use crate::config::ChamberConfig;
use crate::fsm::context::Outputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    None,
    Co2,
    RhDown,
    RhUp,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionStage {
    Idle,
    Co2Swirl,
    Co2Settle,
    RhDownFreshAir,
    RhDownSwirl,
    RhDownSettle,
    RhUpFogger,
    RhUpMix,
    RhUpSettle,
    BaselineFreshAir,
    BaselineSettle,
}

/// Every action duration, already scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDurations {
    pub co2_swirl: u32,
    pub co2_settle: u32,
    pub rh_down_fresh_air: u32,
    pub rh_down_swirl: u32,
    pub rh_down_settle: u32,
    pub rh_up_fogger: u32,
    pub rh_up_mix: u32,
    pub rh_up_settle: u32,
    pub baseline_fresh_air: u32,
    pub baseline_settle: u32,
    pub rh_lockout: u32,
}

impl ActionDurations {
    pub fn from_config(c: &ChamberConfig, scale: TimeScale) -> Self {
        Self {
            co2_swirl: scale.scale(c.co2_swirl_ms),
            co2_settle: scale.scale(c.co2_settle_ms),
            rh_down_fresh_air: scale.scale(c.rh_down_fresh_air_ms),
            rh_down_swirl: scale.scale(c.rh_down_swirl_ms),
            rh_down_settle: scale.scale(c.rh_down_settle_ms),
            rh_up_fogger: scale.scale(c.rh_up_fogger_ms),
            rh_up_mix: scale.scale(c.rh_up_mix_ms),
            rh_up_settle: scale.scale(c.rh_up_settle_ms),
            baseline_fresh_air: scale.scale(c.baseline_fresh_air_ms),
            baseline_settle: scale.scale(c.baseline_settle_ms),
            rh_lockout: scale.scale(c.rh_lockout_ms),
        }
    }

    /// Duration of `stage`; `Idle` never expires.
    fn of(&self, stage: ActionStage) -> Option<u32> {
        Some(match stage {
            ActionStage::Idle => return None,
            ActionStage::Co2Swirl => self.co2_swirl,
            ActionStage::Co2Settle => self.co2_settle,
            ActionStage::RhDownFreshAir => self.rh_down_fresh_air,
            ActionStage::RhDownSwirl => self.rh_down_swirl,
            ActionStage::RhDownSettle => self.rh_down_settle,
            ActionStage::RhUpFogger => self.rh_up_fogger,
            ActionStage::RhUpMix => self.rh_up_mix,
            ActionStage::RhUpSettle => self.rh_up_settle,
            ActionStage::BaselineFreshAir => self.baseline_fresh_air,
            ActionStage::BaselineSettle => self.baseline_settle,
        })
    }
}

/// Outcome of one [`ActionContext::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStep {
    /// Nothing running, or the current stage has not expired.
    Holding,
    /// Moved into a new stage.
    Advanced(ActionStage),
    /// The named action finished; the machine is idle again.
    Completed(Action),
}

/// State of the action machine plus the humidity lockouts and the
/// ventilation timestamp the baseline rule depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContext {
    pub action: Action,
    pub stage: ActionStage,
    pub stage_start_ms: u32,
    /// RhUp may not start before this instant.
    pub rh_up_lockout_until_ms: Option<u32>,
    /// RhDown may not start before this instant.
    pub rh_down_lockout_until_ms: Option<u32>,
    pub last_ventilation_ms: u32,
}

impl Default for ActionContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ActionContext {
    /// Idle machine with the baseline timer starting at `now_ms`.
    pub fn new(now_ms: u32) -> Self {
        Self {
            action: Action::None,
            stage: ActionStage::Idle,
            stage_start_ms: now_ms,
            rh_up_lockout_until_ms: None,
            rh_down_lockout_until_ms: None,
            last_ventilation_ms: now_ms,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.action == Action::None
    }

    /// Begin `action`.  Returns `false` (and changes nothing) if another
    /// action is still running or `action` is `None`.
    pub fn start(&mut self, action: Action, now_ms: u32, outputs: &mut Outputs) -> bool {
        if !self.is_idle() || action == Action::None {
            return false;
        }

        self.action = action;
        self.stage_start_ms = now_ms;
        self.stage = match action {
            Action::Co2 => {
                outputs.swirler = true;
                ActionStage::Co2Swirl
            }
            Action::RhDown => {
                outputs.fresh_air = true;
                self.last_ventilation_ms = now_ms;
                ActionStage::RhDownFreshAir
            }
            Action::RhUp => {
                outputs.fogger = true;
                ActionStage::RhUpFogger
            }
            Action::Baseline => {
                outputs.fresh_air = true;
                self.last_ventilation_ms = now_ms;
                ActionStage::BaselineFreshAir
            }
            Action::None => ActionStage::Idle,
        };
        info!("Action: {:?} started in {:?}", action, self.stage);
        true
    }

    /// Advance the running action if its current stage has expired.
    /// Also drops lockouts whose deadline has passed.
    pub fn tick(&mut self, now_ms: u32, d: &ActionDurations, outputs: &mut Outputs) -> ActionStep {
        self.expire_lockouts(now_ms);

        let Some(limit) = d.of(self.stage) else {
            return ActionStep::Holding;
        };
        if elapsed_ms(now_ms, self.stage_start_ms) < limit {
            return ActionStep::Holding;
        }

        let next = match self.stage {
            ActionStage::Co2Swirl => {
                outputs.swirler = false;
                ActionStage::Co2Settle
            }
            ActionStage::RhDownFreshAir => {
                outputs.fresh_air = false;
                outputs.swirler = true;
                ActionStage::RhDownSwirl
            }
            ActionStage::RhDownSwirl => {
                outputs.swirler = false;
                ActionStage::RhDownSettle
            }
            ActionStage::RhUpFogger => {
                // Fogger stays on through the mix.
                outputs.swirler = true;
                outputs.fresh_air = true;
                self.last_ventilation_ms = now_ms;
                ActionStage::RhUpMix
            }
            ActionStage::RhUpMix => {
                *outputs = Outputs::all_off();
                ActionStage::RhUpSettle
            }
            ActionStage::BaselineFreshAir => {
                outputs.fresh_air = false;
                ActionStage::BaselineSettle
            }
            ActionStage::Co2Settle
            | ActionStage::RhDownSettle
            | ActionStage::RhUpSettle
            | ActionStage::BaselineSettle => return self.complete(now_ms, d, outputs),
            ActionStage::Idle => return ActionStep::Holding,
        };

        self.stage = next;
        self.stage_start_ms = now_ms;
        info!("Action: {:?} -> {:?}", self.action, next);
        ActionStep::Advanced(next)
    }

    /// `true` once the RhUp lockout (if any) has expired.
    pub fn rh_up_allowed(&self, now_ms: u32) -> bool {
        self.rh_up_lockout_until_ms
            .is_none_or(|until| crate::clock::deadline_reached(now_ms, until))
    }

    /// `true` once the RhDown lockout (if any) has expired.
    pub fn rh_down_allowed(&self, now_ms: u32) -> bool {
        self.rh_down_lockout_until_ms
            .is_none_or(|until| crate::clock::deadline_reached(now_ms, until))
    }

    /// A deadline only compares correctly within 2^31 ms, so an expired
    /// lockout must not be kept around.
    fn expire_lockouts(&mut self, now_ms: u32) {
        if self.rh_up_allowed(now_ms) && self.rh_up_lockout_until_ms.take().is_some() {
            debug!("Action: RhUp lockout expired");
        }
        if self.rh_down_allowed(now_ms) && self.rh_down_lockout_until_ms.take().is_some() {
            debug!("Action: RhDown lockout expired");
        }
    }

    fn complete(&mut self, now_ms: u32, d: &ActionDurations, outputs: &mut Outputs) -> ActionStep {
        let finished = self.action;
        *outputs = Outputs::all_off();
        match finished {
            Action::RhDown => {
                self.rh_up_lockout_until_ms = Some(now_ms.wrapping_add(d.rh_lockout));
                info!("Action: RhDown complete, RhUp locked for {} ms", d.rh_lockout);
            }
            Action::RhUp => {
                self.rh_down_lockout_until_ms = Some(now_ms.wrapping_add(d.rh_lockout));
                info!("Action: RhUp complete, RhDown locked for {} ms", d.rh_lockout);
            }
            _ => info!("Action: {:?} complete", finished),
        }
        self.action = Action::None;
        self.stage = ActionStage::Idle;
        self.stage_start_ms = now_ms;
        ActionStep::Completed(finished)
    }
}
