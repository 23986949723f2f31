//! Mock adapters for integration tests.
//!
//! Records every actuator call and every emitted event so tests can
//! assert on the full history without touching real GPIO.

use chamber::app::events::AppEvent;
use chamber::app::ports::{ActuatorPort, EventSink, SensorSource};
use chamber::sensors::SensorSnapshot;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Swirler(bool),
    FreshAir(bool),
    Fogger(bool),
    Heater(bool),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self { calls: Vec::new() }
    }

    pub fn last_call(&self) -> Option<&ActuatorCall> {
        self.calls.last()
    }

    /// Latest commanded level of the output `pick` matches.
    fn level(&self, pick: fn(&ActuatorCall) -> Option<bool>) -> bool {
        self.calls.iter().rev().find_map(pick).unwrap_or(false)
    }

    pub fn swirler_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::Swirler(on) => Some(*on),
            _ => None,
        })
    }

    pub fn fresh_air_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::FreshAir(on) => Some(*on),
            _ => None,
        })
    }

    pub fn fogger_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::Fogger(on) => Some(*on),
            _ => None,
        })
    }

    pub fn heater_on(&self) -> bool {
        self.level(|c| match c {
            ActuatorCall::Heater(on) => Some(*on),
            _ => None,
        })
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn set_swirler(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Swirler(on));
    }

    fn set_fresh_air(&mut self, on: bool) {
        self.calls.push(ActuatorCall::FreshAir(on));
    }

    fn set_fogger(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Fogger(on));
    }

    fn set_heater(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Heater(on));
    }
}

// ── ScriptedSensors ──────────────────────────────────────────

/// Sensor source returning whatever the test last set.
pub struct ScriptedSensors {
    pub snapshot: SensorSnapshot,
}

#[allow(dead_code)]
impl ScriptedSensors {
    pub fn new(co2: i32, rh: f32, temp: f32) -> Self {
        let mut s = Self {
            snapshot: SensorSnapshot::default(),
        };
        s.set(co2, rh, temp);
        s
    }

    pub fn set(&mut self, co2: i32, rh: f32, temp: f32) {
        self.snapshot = SensorSnapshot {
            co2_ppm: [co2, co2 + 5],
            rh_percent: [rh, rh + 0.5],
            temp_c: [temp, temp + 0.2, 12.0],
        };
    }
}

impl SensorSource for ScriptedSensors {
    fn read(&mut self, _now_ms: u32) -> SensorSnapshot {
        self.snapshot
    }
}

// ── RecordingSink ────────────────────────────────────────────

/// Event sink that keeps every event.
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn drain(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
