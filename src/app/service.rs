//! Chamber service: the hexagonal core.
//!
//! [`ChamberService`] owns the measurement FSM, the action machine, the
//! heater loop, the history buffers and the setpoint storage.  It exposes
//! a hardware-agnostic API.  All I/O flows through port traits injected
//! at call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorSource ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                   │        ChamberService        │
//!  ActuatorPort ◀── │ FSM · Actions · Heater · Hist│
//!                   └──────────────┬───────────────┘
//!                                  ▼
//!                         Storage<BlockDevice>
//! ```
//!
//! One call to [`ChamberService::tick`] runs, in order: history sampling,
//! the measurement cycle, the action machine, the heater loop, actuator
//! output and the storage debounce.

use log::{info, warn};

use crate::clock::elapsed_ms;
use crate::config::ChamberConfig;
use crate::control::action::{Action, ActionContext, ActionStage, ActionStep};
use crate::control::heater::HeaterLoop;
use crate::error::StorageError;
use crate::fsm::context::{ChamberContext, Outputs, Setpoints};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, MeasureStage};
use crate::history::{Channel, History, Series};
use crate::storage::{
    Backend, CO2_SETPOINT_DEFAULT, IDX_COUNTER, RH_SETPOINT_DEFAULT, Storage,
    TEMP_SETPOINT_DEFAULT,
};

use super::commands::AppCommand;
use super::events::{AppEvent, StatusSnapshot};
use super::ports::{ActuatorPort, BlockDevice, EventSink, SensorSource};

// ───────────────────────────────────────────────────────────────
// ChamberService
// ───────────────────────────────────────────────────────────────

/// The control kernel.  Several instances can coexist; nothing is global.
pub struct ChamberService<D: BlockDevice> {
    fsm: Fsm,
    ctx: ChamberContext,
    heater: HeaterLoop,
    history: History,
    storage: Storage<D>,
    /// Scaled history sample interval.
    history_interval_ms: u32,
    /// Outputs last written through the actuator port.
    applied: Option<Outputs>,
    started_at_ms: u32,
}

impl<D: BlockDevice> ChamberService<D> {
    /// Construct the service.  Does **not** touch hardware or storage;
    /// call [`start`](Self::start) next.
    pub fn new(config: ChamberConfig, storage: Storage<D>) -> Self {
        let setpoints = Setpoints {
            co2_ppm: CO2_SETPOINT_DEFAULT,
            rh_percent: RH_SETPOINT_DEFAULT,
            temp_c: TEMP_SETPOINT_DEFAULT,
        };
        let ctx = ChamberContext::new(config, setpoints);
        let heater = HeaterLoop::new(
            ctx.scale.scale(ctx.config.heater_check_interval_ms),
            ctx.config.heater_on_threshold_c,
        );
        let history_interval_ms = ctx.scale.scale(ctx.config.sample_interval_ms);

        Self {
            fsm: Fsm::new(build_state_table(), MeasureStage::Idle),
            ctx,
            heater,
            history: History::new(),
            storage,
            history_interval_ms,
            applied: None,
            started_at_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the kernel up: every output off, storage recovered, setpoints
    /// loaded (out-of-range values replaced by defaults and written back),
    /// baseline timer started at `now_ms`.
    pub fn start(&mut self, now_ms: u32, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        info!("Controller: initialising (speedup x{})", self.ctx.scale.speedup());
        self.ctx.now_ms = now_ms;
        self.started_at_ms = now_ms;

        self.ctx.outputs = Outputs::all_off();
        hw.all_off();
        self.applied = Some(self.ctx.outputs);

        let backend = match self.storage.backend() {
            Some(b) => b,
            None => self.storage.init(),
        };
        self.storage.load();
        self.storage.restore_setpoint_defaults(now_ms);
        self.refresh_setpoints();

        self.ctx.action = ActionContext::new(now_ms);
        self.fsm.start(&mut self.ctx);

        let setpoints = self.ctx.setpoints;
        info!(
            "Controller: ready (CO2 {} ppm, RH {:.1}%, T {:.1}C, storage {:?})",
            setpoints.co2_ppm, setpoints.rh_percent, setpoints.temp_c, backend
        );
        sink.emit(&AppEvent::Started { backend, setpoints });
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.  `now_ms` is read once by the caller.
    pub fn tick(
        &mut self,
        now_ms: u32,
        source: &mut impl SensorSource,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;

        // 1. Sensors
        self.ctx.sensors = source.read(now_ms);

        // 2. History
        self.history.sample_tick(
            now_ms,
            self.history_interval_ms,
            &self.ctx.sensors,
            &self.ctx.outputs,
        );

        // 3. Measurement cycle
        let prev = self.fsm.current_stage();
        if let Some(to) = self.fsm.tick(&mut self.ctx) {
            sink.emit(&AppEvent::MeasureStageChanged { from: prev, to });
            if prev == MeasureStage::Evaluate {
                if let Some(m) = self.ctx.last_medians {
                    sink.emit(&AppEvent::MedianEvaluated(m));
                }
            }
        }
        if let Some(started) = self.ctx.started_action.take() {
            sink.emit(&AppEvent::ActionStarted(started));
        }

        // 4. Action machine
        let running = self.ctx.action.action;
        match self
            .ctx
            .action
            .tick(now_ms, &self.ctx.action_durations, &mut self.ctx.outputs)
        {
            ActionStep::Holding => {}
            ActionStep::Advanced(stage) => sink.emit(&AppEvent::ActionStageChanged {
                action: running,
                stage,
            }),
            ActionStep::Completed(done) => sink.emit(&AppEvent::ActionCompleted(done)),
        }

        // 5. Heater
        if let Some(on) = self.heater.tick(
            now_ms,
            self.ctx.sensors.temp_main(),
            self.ctx.setpoints.temp_c,
            &mut self.ctx.outputs.heater,
        ) {
            sink.emit(&AppEvent::HeaterChanged(on));
        }

        // 6. Outputs
        self.apply_actuators(hw);

        // 7. Persistence
        if self.storage.tick(now_ms) {
            sink.emit(&AppEvent::StorageSaved {
                next_slot: self.storage.current_slot(),
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        sink: &mut impl EventSink,
    ) -> Result<(), StorageError> {
        match cmd {
            AppCommand::SetCo2Setpoint(ppm) => {
                self.set_co2_setpoint(ppm);
                sink.emit(&AppEvent::SetpointsChanged(self.ctx.setpoints));
            }
            AppCommand::SetRhSetpoint(percent) => {
                self.set_rh_setpoint(percent);
                sink.emit(&AppEvent::SetpointsChanged(self.ctx.setpoints));
            }
            AppCommand::SetTempSetpoint(celsius) => {
                self.set_temp_setpoint(celsius);
                sink.emit(&AppEvent::SetpointsChanged(self.ctx.setpoints));
            }
            AppCommand::IncrementCounter => {
                self.increment_counter();
            }
            AppCommand::SaveNow => match self.save_now() {
                Ok(()) => sink.emit(&AppEvent::StorageSaved {
                    next_slot: self.storage.current_slot(),
                }),
                Err(e) => {
                    sink.emit(&AppEvent::StorageFailed(e));
                    return Err(e);
                }
            },
        }
        Ok(())
    }

    // ── Setpoints ─────────────────────────────────────────────

    pub fn co2_setpoint(&self) -> u16 {
        self.ctx.setpoints.co2_ppm
    }

    /// Clamp and apply a new CO2 target; persisted after the quiet period.
    pub fn set_co2_setpoint(&mut self, ppm: u16) -> u16 {
        let applied = self.storage.set_co2_setpoint(ppm, self.ctx.now_ms);
        self.refresh_setpoints();
        info!("Controller: CO2 setpoint {} ppm", applied);
        applied
    }

    pub fn rh_setpoint(&self) -> f32 {
        self.ctx.setpoints.rh_percent
    }

    pub fn set_rh_setpoint(&mut self, percent: f32) -> f32 {
        let applied = self.storage.set_rh_setpoint(percent, self.ctx.now_ms);
        self.refresh_setpoints();
        info!("Controller: RH setpoint {:.1}%", applied);
        applied
    }

    pub fn temp_setpoint(&self) -> f32 {
        self.ctx.setpoints.temp_c
    }

    pub fn set_temp_setpoint(&mut self, celsius: f32) -> f32 {
        let applied = self.storage.set_temp_setpoint(celsius, self.ctx.now_ms);
        self.refresh_setpoints();
        info!("Controller: temperature setpoint {:.1}C", applied);
        applied
    }

    pub fn setpoints(&self) -> Setpoints {
        self.ctx.setpoints
    }

    // ── Counter and persistence ───────────────────────────────

    /// Bump the free-running counter and return its new value.
    pub fn increment_counter(&mut self) -> u16 {
        match self.storage.increment(IDX_COUNTER, self.ctx.now_ms) {
            Ok(v) => v,
            Err(e) => {
                warn!("Controller: counter increment failed: {}", e);
                self.counter()
            }
        }
    }

    pub fn counter(&self) -> u16 {
        self.storage.get(IDX_COUNTER).unwrap_or_default()
    }

    /// Persist pending changes now, bypassing the quiet period.
    pub fn save_now(&mut self) -> Result<(), StorageError> {
        self.storage.save_now(self.ctx.now_ms)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_series(&self, channel: Channel) -> Series {
        self.history.read(channel)
    }

    pub fn measure_stage(&self) -> MeasureStage {
        self.fsm.current_stage()
    }

    pub fn action(&self) -> Action {
        self.ctx.action.action
    }

    pub fn action_stage(&self) -> ActionStage {
        self.ctx.action.stage
    }

    pub fn action_context(&self) -> &ActionContext {
        &self.ctx.action
    }

    pub fn outputs(&self) -> Outputs {
        self.ctx.outputs
    }

    pub fn config(&self) -> &ChamberConfig {
        &self.ctx.config
    }

    pub fn backend(&self) -> Option<Backend> {
        self.storage.backend()
    }

    pub fn storage(&self) -> &Storage<D> {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage<D> {
        &mut self.storage
    }

    pub fn into_storage(self) -> Storage<D> {
        self.storage
    }

    /// Snapshot for the status endpoint and periodic logging.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_ms: elapsed_ms(self.ctx.now_ms, self.started_at_ms),
            measure_stage: self.fsm.current_stage(),
            action: self.ctx.action.action,
            action_stage: self.ctx.action.stage,
            outputs: self.ctx.outputs,
            sensors: self.ctx.sensors,
            medians: self.ctx.last_medians,
            setpoints: self.ctx.setpoints,
            counter: self.counter(),
            storage_dirty: self.storage.is_dirty(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn refresh_setpoints(&mut self) {
        self.ctx.setpoints = Setpoints {
            co2_ppm: self.storage.co2_setpoint(),
            rh_percent: self.storage.rh_setpoint(),
            temp_c: self.storage.temp_setpoint(),
        };
    }

    /// Write only the outputs that changed since the last call.
    fn apply_actuators(&mut self, hw: &mut impl ActuatorPort) {
        let want = self.ctx.outputs;
        let have = self.applied;

        if have.is_none_or(|h| h.swirler != want.swirler) {
            hw.set_swirler(want.swirler);
        }
        if have.is_none_or(|h| h.fresh_air != want.fresh_air) {
            hw.set_fresh_air(want.fresh_air);
        }
        if have.is_none_or(|h| h.fogger != want.fogger) {
            hw.set_fogger(want.fogger);
        }
        if have.is_none_or(|h| h.heater != want.heater) {
            hw.set_heater(want.heater);
        }
        self.applied = Some(want);
    }
}
