//! Simulated sensor source: a bounded random walk per channel.
//!
//! Float channels wander with a slowly changing drift plus white noise.
//! CO2 additionally gets occasional +500 ppm pulses lasting ten updates,
//! which is what trips the CO2 action in a simulated run.  The generator
//! is a seeded [`fastrand::Rng`] so tests are reproducible.

use crate::app::ports::SensorSource;
use crate::clock::{TimeScale, elapsed_ms};

use super::SensorSnapshot;

/// Real-time update cadence before scaling.
const UPDATE_PERIOD_MS: u32 = 1_000;

const DRIFT_LIMIT: f32 = 0.05;
const CO2_DRIFT_LIMIT: f32 = 10.0;
const CO2_PULSE_PPM: i32 = 500;
const CO2_PULSE_UPDATES: u8 = 10;
const CO2_MIN: i32 = 450;
const CO2_MAX: i32 = 3_000;

/// Parameters of one float random walk.
#[derive(Debug, Clone, Copy)]
struct WalkParams {
    min: f32,
    max: f32,
    noise: f32,
    drift_speed: f32,
}

const RH_WALK: WalkParams = WalkParams {
    min: 85.0,
    max: 99.5,
    noise: 0.3,
    drift_speed: 0.5,
};

const TEMP_INNER_WALK: WalkParams = WalkParams {
    min: 18.0,
    max: 35.0,
    noise: 0.2,
    drift_speed: 0.3,
};

const TEMP_OUTER_WALK: WalkParams = WalkParams {
    min: 15.0,
    max: 32.0,
    noise: 0.2,
    drift_speed: 0.3,
};

#[derive(Debug, Clone, Copy)]
struct FloatChannel {
    value: f32,
    drift: f32,
    params: WalkParams,
}

impl FloatChannel {
    const fn new(value: f32, params: WalkParams) -> Self {
        Self {
            value,
            drift: 0.0,
            params,
        }
    }

    fn step(&mut self, rng: &mut fastrand::Rng) {
        let p = self.params;
        self.drift += (rng.i32(-100..=100) as f32 / 10_000.0) * p.drift_speed;
        self.drift = self.drift.clamp(-DRIFT_LIMIT, DRIFT_LIMIT);
        let noise = (rng.i32(-100..=100) as f32 / 1_000.0) * p.noise;
        self.value = (self.value + self.drift + noise).clamp(p.min, p.max);
    }
}

#[derive(Debug, Clone, Copy)]
struct Co2Channel {
    value: i32,
    drift: f32,
    pulse_remaining: u8,
    /// Chance per update (out of 1000) that a pulse starts.
    pulse_per_mille: u32,
}

impl Co2Channel {
    const fn new(value: i32, pulse_per_mille: u32) -> Self {
        Self {
            value,
            drift: 0.0,
            pulse_remaining: 0,
            pulse_per_mille,
        }
    }

    fn step(&mut self, rng: &mut fastrand::Rng) {
        self.drift += rng.i32(-100..=100) as f32 / 100.0;
        self.drift = self.drift.clamp(-CO2_DRIFT_LIMIT, CO2_DRIFT_LIMIT);

        let mut next = self.value + self.drift as i32 + rng.i32(-20..=20);
        if self.pulse_remaining > 0 {
            next += CO2_PULSE_PPM;
            self.pulse_remaining -= 1;
        } else if rng.u32(0..1_000) < self.pulse_per_mille {
            self.pulse_remaining = CO2_PULSE_UPDATES;
        }
        self.value = next.clamp(CO2_MIN, CO2_MAX);
    }
}

/// Random-walk chamber used when no sensors are fitted.
pub struct SimulatedSource {
    rng: fastrand::Rng,
    period_ms: u32,
    last_update_ms: Option<u32>,
    co2: [Co2Channel; 2],
    rh: [FloatChannel; 2],
    temp: [FloatChannel; 3],
}

impl SimulatedSource {
    pub fn new(scale: TimeScale, seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            period_ms: scale.scale(UPDATE_PERIOD_MS),
            last_update_ms: None,
            co2: [Co2Channel::new(800, 5), Co2Channel::new(820, 3)],
            rh: [
                FloatChannel::new(92.0, RH_WALK),
                FloatChannel::new(90.5, RH_WALK),
            ],
            temp: [
                FloatChannel::new(25.0, TEMP_INNER_WALK),
                FloatChannel::new(24.0, TEMP_INNER_WALK),
                FloatChannel::new(22.0, TEMP_OUTER_WALK),
            ],
        }
    }

    /// The cached value without advancing the walk.
    pub fn current(&self) -> SensorSnapshot {
        SensorSnapshot {
            co2_ppm: [self.co2[0].value, self.co2[1].value],
            rh_percent: [self.rh[0].value, self.rh[1].value],
            temp_c: [self.temp[0].value, self.temp[1].value, self.temp[2].value],
        }
    }

    fn step(&mut self) {
        for ch in &mut self.rh {
            ch.step(&mut self.rng);
        }
        for ch in &mut self.temp {
            ch.step(&mut self.rng);
        }
        for ch in &mut self.co2 {
            ch.step(&mut self.rng);
        }
    }
}

impl SensorSource for SimulatedSource {
    fn read(&mut self, now_ms: u32) -> SensorSnapshot {
        let due = match self.last_update_ms {
            None => true,
            Some(last) => elapsed_ms(now_ms, last) >= self.period_ms,
        };
        if due {
            self.last_update_ms = Some(now_ms);
            self.step();
        }
        self.current()
    }
}
