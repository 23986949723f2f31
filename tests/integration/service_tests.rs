//! Integration tests for the ChamberService → FSM → actions → actuators
//! pipeline, driven with a scripted clock.
//!
//! All runs use the default speed-up of 10, so one measurement cycle
//! (wait 6000 + swirl 500 + five samples 100 ms apart) takes ~6.9 s of
//! simulated time.

use chamber::adapters::block_device::{NoDevice, SimulatedFlash};
use chamber::app::commands::AppCommand;
use chamber::app::events::AppEvent;
use chamber::app::ports::BlockDevice;
use chamber::app::service::ChamberService;
use chamber::config::ChamberConfig;
use chamber::control::action::{Action, ActionStage};
use chamber::error::{DeviceError, StorageError};
use chamber::fsm::MeasureStage;
use chamber::storage::{Backend, Storage};

use crate::mock_hw::{MockHardware, RecordingSink, ScriptedSensors};

const STEP_MS: u32 = 10;

struct Rig<D: BlockDevice> {
    svc: ChamberService<D>,
    hw: MockHardware,
    src: ScriptedSensors,
    sink: RecordingSink,
    now: u32,
}

impl<D: BlockDevice> Rig<D> {
    fn start(device: D, start_ms: u32, src: ScriptedSensors) -> Self {
        let config = ChamberConfig::default();
        let storage = Storage::new(device, &config);
        let mut rig = Self {
            svc: ChamberService::new(config, storage),
            hw: MockHardware::new(),
            src,
            sink: RecordingSink::new(),
            now: start_ms,
        };
        rig.svc.start(start_ms, &mut rig.hw, &mut rig.sink);
        rig
    }

    /// Tick every `STEP_MS` for `duration_ms`; events are paired with the
    /// tick time that produced them.
    fn run_for(&mut self, duration_ms: u32) -> Vec<(u32, AppEvent)> {
        let mut out = Vec::new();
        for _ in 0..duration_ms / STEP_MS {
            self.now = self.now.wrapping_add(STEP_MS);
            self.svc
                .tick(self.now, &mut self.src, &mut self.hw, &mut self.sink);
            out.extend(self.sink.drain().into_iter().map(|e| (self.now, e)));
        }
        out
    }

    /// Run until `pred` matches an event; returns its time.
    fn run_until(&mut self, limit_ms: u32, pred: impl Fn(&AppEvent) -> bool) -> Option<u32> {
        for _ in 0..limit_ms / STEP_MS {
            self.now = self.now.wrapping_add(STEP_MS);
            self.svc
                .tick(self.now, &mut self.src, &mut self.hw, &mut self.sink);
            if self.sink.drain().iter().any(&pred) {
                return Some(self.now);
            }
        }
        None
    }
}

fn flash() -> SimulatedFlash {
    SimulatedFlash::new(64 * 1024, 4096)
}

fn first(events: &[(u32, AppEvent)], wanted: &AppEvent) -> Option<u32> {
    events.iter().find(|(_, e)| e == wanted).map(|(t, _)| *t)
}

/// At most one action runs at a time.
fn assert_non_preemptive(events: &[(u32, AppEvent)]) {
    let mut running: Option<Action> = None;
    for (t, e) in events {
        match e {
            AppEvent::ActionStarted(a) => {
                assert!(running.is_none(), "{a:?} started at {t} while {running:?} ran");
                running = Some(*a);
            }
            AppEvent::ActionCompleted(a) => {
                assert_eq!(running, Some(*a), "completion of {a:?} at {t}");
                running = None;
            }
            _ => {}
        }
    }
}

// ── Measurement cycle ────────────────────────────────────────

#[test]
fn first_cycle_swirls_then_samples() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(700, 89.0, 25.0));
    let events = rig.run_for(1_000);

    let swirl = first(
        &events,
        &AppEvent::MeasureStageChanged {
            from: MeasureStage::Idle,
            to: MeasureStage::Swirl,
        },
    )
    .expect("swirl");
    let median = first(
        &events,
        &AppEvent::MeasureStageChanged {
            from: MeasureStage::Swirl,
            to: MeasureStage::Median,
        },
    )
    .expect("median");
    assert_eq!(median - swirl, 500);

    assert!(events
        .iter()
        .any(|(_, e)| matches!(e, AppEvent::MedianEvaluated(m) if m.co2_ppm == 700)));
    assert_eq!(rig.svc.measure_stage(), MeasureStage::Wait);
}

// ── Actions ──────────────────────────────────────────────────

#[test]
fn high_co2_runs_co2_action_to_completion() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(1_500, 89.0, 25.0));
    let events = rig.run_for(5_000);

    let started = first(&events, &AppEvent::ActionStarted(Action::Co2)).expect("started");
    let settle = first(
        &events,
        &AppEvent::ActionStageChanged {
            action: Action::Co2,
            stage: ActionStage::Co2Settle,
        },
    )
    .expect("settle");
    let done = first(&events, &AppEvent::ActionCompleted(Action::Co2)).expect("completed");

    assert_eq!(settle - started, 1_000);
    assert_eq!(done - started, 3_000);
    assert!(!rig.hw.swirler_on());
    assert_eq!(rig.svc.action(), Action::None);
}

#[test]
fn running_action_is_never_preempted() {
    // RhUp lasts 13.5 s, longer than one measurement cycle.
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(700, 80.0, 25.0));
    let mut events = rig.run_for(2_000);
    assert!(first(&events, &AppEvent::ActionStarted(Action::RhUp)).is_some());

    // CO2 now calls for action, but RhUp still runs.
    rig.src.set(2_000, 80.0, 25.0);
    events.extend(rig.run_for(13_000));

    let done = first(&events, &AppEvent::ActionCompleted(Action::RhUp)).expect("completed");
    let evaluated_while_busy = events
        .iter()
        .filter(|(t, e)| *t < done && matches!(e, AppEvent::MedianEvaluated(m) if m.co2_ppm == 2_000))
        .count();
    assert!(evaluated_while_busy >= 1);

    events.extend(rig.run_for(10_000));
    assert_non_preemptive(&events);
    assert!(first(&events, &AppEvent::ActionStarted(Action::Co2)).is_some_and(|t| t > done));
}

#[test]
fn rh_up_locks_out_rh_down() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(700, 80.0, 25.0));
    let done = rig
        .run_until(20_000, |e| *e == AppEvent::ActionCompleted(Action::RhUp))
        .expect("RhUp completes");
    let lockout = rig
        .svc
        .action_context()
        .rh_down_lockout_until_ms
        .expect("lockout armed");
    assert_eq!(lockout - done, 18_000);

    rig.src.set(700, 95.0, 25.0);
    let events = rig.run_for(40_000);

    let blocked_evaluations = events
        .iter()
        .filter(|(t, e)| *t < lockout && matches!(e, AppEvent::MedianEvaluated(_)))
        .count();
    assert!(blocked_evaluations >= 1);

    let rh_down = first(&events, &AppEvent::ActionStarted(Action::RhDown)).expect("RhDown");
    assert!(rh_down >= lockout);
    assert_non_preemptive(&events);
}

#[test]
fn rh_up_mixes_with_fogger_still_on() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(700, 80.0, 25.0));
    rig.run_until(2_000, |e| {
        *e == AppEvent::ActionStageChanged {
            action: Action::RhUp,
            stage: ActionStage::RhUpMix,
        }
    })
    .expect("mix stage");
    assert!(rig.hw.fogger_on());
    assert!(rig.hw.swirler_on());
    assert!(rig.hw.fresh_air_on());
}

#[test]
fn heater_is_reasserted_after_action_completion() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(1_500, 89.0, 20.0));
    let events = rig.run_for(5_000);

    let heater_on = events
        .iter()
        .filter(|(_, e)| *e == AppEvent::HeaterChanged(true))
        .count();
    assert!(heater_on >= 2, "heater should come back after the all-off");
    assert!(rig.svc.outputs().heater);
    assert!(rig.hw.heater_on());
}

#[test]
fn survives_clock_wraparound() {
    let mut rig = Rig::start(flash(), u32::MAX - 2_000, ScriptedSensors::new(1_500, 89.0, 25.0));
    let events = rig.run_for(6_000);
    assert!(first(&events, &AppEvent::ActionStarted(Action::Co2)).is_some());
    assert!(first(&events, &AppEvent::ActionCompleted(Action::Co2)).is_some());
    assert_non_preemptive(&events);
}

// ── Setpoints and persistence ────────────────────────────────

#[test]
fn setpoints_survive_restart() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(700, 89.0, 25.0));
    assert_eq!(rig.svc.set_co2_setpoint(1_200), 1_200);
    assert!((rig.svc.set_rh_setpoint(85.04) - 85.0).abs() < 1e-3);
    rig.svc.increment_counter();

    let saved = rig.run_until(6_000, |e| matches!(e, AppEvent::StorageSaved { .. }));
    assert_eq!(saved, Some(5_000));

    let device = rig.svc.into_storage().into_device();
    let rig = Rig::start(device, 0, ScriptedSensors::new(700, 89.0, 25.0));
    assert_eq!(rig.svc.co2_setpoint(), 1_200);
    assert!((rig.svc.rh_setpoint() - 85.0).abs() < 1e-3);
    assert!((rig.svc.temp_setpoint() - 25.0).abs() < 1e-3);
    assert_eq!(rig.svc.counter(), 1);
}

#[test]
fn no_device_falls_back_to_ram() {
    let mut rig = Rig::start(NoDevice, 0, ScriptedSensors::new(700, 89.0, 25.0));
    assert_eq!(rig.svc.backend(), Some(Backend::Ram));
    assert!(matches!(
        rig.sink.events.first(),
        Some(AppEvent::Started {
            backend: Backend::Ram,
            ..
        })
    ));

    rig.svc
        .handle_command(AppCommand::SetCo2Setpoint(999), &mut rig.sink)
        .unwrap();
    rig.svc
        .handle_command(AppCommand::SaveNow, &mut rig.sink)
        .unwrap();
    assert_eq!(rig.svc.co2_setpoint(), 999);
    assert!(!rig.svc.storage().is_dirty());

    // The control loop keeps running.
    rig.run_for(2_000);
    assert_eq!(rig.svc.measure_stage(), MeasureStage::Wait);
}

#[test]
fn failed_save_is_retried_after_quiet_period() {
    let mut rig = Rig::start(flash(), 0, ScriptedSensors::new(700, 89.0, 25.0));
    rig.svc.storage_mut().device_mut().fail_next_writes(1);
    rig.svc.set_temp_setpoint(21.0);

    let err = rig
        .svc
        .handle_command(AppCommand::SaveNow, &mut rig.sink)
        .unwrap_err();
    assert_eq!(err, StorageError::Device(DeviceError::ProgramFailed));
    assert!(rig.sink.events.contains(&AppEvent::StorageFailed(err)));
    assert!(rig.svc.storage().is_dirty());

    let saved = rig.run_until(6_000, |e| matches!(e, AppEvent::StorageSaved { .. }));
    assert!(saved.is_some());
    assert!(!rig.svc.storage().is_dirty());
    assert_eq!(rig.svc.storage().device().program_count(), 1);
}

#[test]
fn out_of_range_stored_setpoints_are_replaced() {
    let config = ChamberConfig::default();
    let mut storage = Storage::new(flash(), &config);
    storage.init();
    storage.load();
    storage.set(1, 50, 0).unwrap();
    storage.set(2, 2_000, 0).unwrap();
    storage.save_now(0).unwrap();

    let rig = Rig::start(storage.into_device(), 0, ScriptedSensors::new(700, 89.0, 25.0));
    assert_eq!(rig.svc.co2_setpoint(), 800);
    assert!((rig.svc.rh_setpoint() - 89.0).abs() < 1e-3);
    assert!(rig.svc.storage().is_dirty(), "defaults are written back");
    assert_eq!(rig.svc.storage().get(1), Some(800));
}
