//! Fixed-capacity history ring buffers.
//!
//! Every channel the chamber plots (three sensor groups plus the four
//! actuator states) keeps its last [`HISTORY_LEN`] samples.  Samples are
//! taken on a drift-free schedule: the next due time is advanced by the
//! interval, never re-derived from "now", so a late tick does not push
//! every later sample back.

use serde::Serialize;

use crate::clock::deadline_reached;
use crate::config::HISTORY_LEN;
use crate::fsm::context::Outputs;
use crate::sensors::SensorSnapshot;

/// The caller's buffer length did not match the ring capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl core::fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "buffer length {} != capacity {}", self.actual, self.expected)
    }
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// Overwriting ring of `N` values.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    buf: [T; N],
    /// Next write position.
    head: usize,
    count: usize,
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self {
            buf: [T::default(); N],
            head: 0,
            count: 0,
        }
    }

    /// Append a value, overwriting the oldest once full.
    pub fn push(&mut self, value: T) {
        self.buf[self.head] = value;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Number of real samples held (saturates at `N`).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// All `N` slots oldest → newest, zero-prefixed while not yet full.
    pub fn read_all(&self) -> [T; N] {
        let mut out = [T::default(); N];
        self.copy_ordered(&mut out);
        out
    }

    /// Same as [`read_all`](Self::read_all) into a caller-provided buffer.
    pub fn read_into(&self, out: &mut [T]) -> Result<(), LengthMismatch> {
        if out.len() != N {
            return Err(LengthMismatch {
                expected: N,
                actual: out.len(),
            });
        }
        self.copy_ordered(out);
        Ok(())
    }

    fn copy_ordered(&self, out: &mut [T]) {
        let fill = N - self.count;
        for slot in &mut out[..fill] {
            *slot = T::default();
        }
        // Oldest sample sits at `head` once full, at index 0 before that.
        let start = if self.count == N { self.head } else { 0 };
        for i in 0..self.count {
            out[fill + i] = self.buf[(start + i) % N];
        }
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// One plotted history channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Co2Main,
    Co2Secondary,
    RhMain,
    RhSecondary,
    TempInnerMain,
    TempInnerSecondary,
    TempOuter,
    Fogger,
    Swirler,
    FreshAir,
    Heater,
}

impl Channel {
    pub const ALL: [Channel; 11] = [
        Channel::Co2Main,
        Channel::Co2Secondary,
        Channel::RhMain,
        Channel::RhSecondary,
        Channel::TempInnerMain,
        Channel::TempInnerSecondary,
        Channel::TempOuter,
        Channel::Fogger,
        Channel::Swirler,
        Channel::FreshAir,
        Channel::Heater,
    ];

    /// Stable key used in JSON output.
    pub fn key(self) -> &'static str {
        match self {
            Self::Co2Main => "co2",
            Self::Co2Secondary => "co2_2",
            Self::RhMain => "rh",
            Self::RhSecondary => "rh_2",
            Self::TempInnerMain => "temp",
            Self::TempInnerSecondary => "temp_2",
            Self::TempOuter => "temp_outer",
            Self::Fogger => "fogger",
            Self::Swirler => "swirler",
            Self::FreshAir => "fresh_air",
            Self::Heater => "heater",
        }
    }
}

/// A full history read for one channel, typed per channel group.
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    /// CO2 in ppm.
    Ppm([i32; HISTORY_LEN]),
    /// RH % or °C.
    Float([f32; HISTORY_LEN]),
    /// Actuator on/off as 0/1.
    OnOff([u8; HISTORY_LEN]),
}

impl Series {
    pub fn len(&self) -> usize {
        HISTORY_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value at `i` widened to `f32` for charting.
    pub fn get_f32(&self, i: usize) -> Option<f32> {
        match self {
            Self::Ppm(v) => v.get(i).map(|&x| x as f32),
            Self::Float(v) => v.get(i).copied(),
            Self::OnOff(v) => v.get(i).map(|&x| f32::from(x)),
        }
    }
}

impl Serialize for Series {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Ppm(v) => s.collect_seq(v.iter()),
            Self::Float(v) => s.collect_seq(v.iter()),
            Self::OnOff(v) => s.collect_seq(v.iter()),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// The eleven history channels plus the drift-free sampling schedule.
#[derive(Debug, Clone, Default)]
pub struct History {
    co2: [RingBuffer<i32, HISTORY_LEN>; 2],
    rh: [RingBuffer<f32, HISTORY_LEN>; 2],
    temp: [RingBuffer<f32, HISTORY_LEN>; 3],
    fogger: RingBuffer<u8, HISTORY_LEN>,
    swirler: RingBuffer<u8, HISTORY_LEN>,
    fresh_air: RingBuffer<u8, HISTORY_LEN>,
    heater: RingBuffer<u8, HISTORY_LEN>,
    /// `None` until the first sample has been taken.
    next_due_ms: Option<u32>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one sample on every channel if the schedule says so.
    ///
    /// Returns `true` when a sample was taken.
    pub fn sample_tick(
        &mut self,
        now_ms: u32,
        interval_ms: u32,
        snapshot: &SensorSnapshot,
        outputs: &Outputs,
    ) -> bool {
        if let Some(due) = self.next_due_ms {
            if !deadline_reached(now_ms, due) {
                return false;
            }
        }

        self.push(snapshot, outputs);

        self.next_due_ms = Some(match self.next_due_ms {
            None => now_ms.wrapping_add(interval_ms),
            Some(due) => due.wrapping_add(interval_ms),
        });
        true
    }

    /// Append one sample unconditionally.
    pub fn push(&mut self, snapshot: &SensorSnapshot, outputs: &Outputs) {
        for (ring, &v) in self.co2.iter_mut().zip(&snapshot.co2_ppm) {
            ring.push(v);
        }
        for (ring, &v) in self.rh.iter_mut().zip(&snapshot.rh_percent) {
            ring.push(v);
        }
        for (ring, &v) in self.temp.iter_mut().zip(&snapshot.temp_c) {
            ring.push(v);
        }
        self.fogger.push(u8::from(outputs.fogger));
        self.swirler.push(u8::from(outputs.swirler));
        self.fresh_air.push(u8::from(outputs.fresh_air));
        self.heater.push(u8::from(outputs.heater));
    }

    /// Next scheduled sample time, if sampling has started.
    pub fn next_due_ms(&self) -> Option<u32> {
        self.next_due_ms
    }

    /// Number of samples held (identical across channels).
    pub fn len(&self) -> usize {
        self.heater.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heater.is_empty()
    }

    pub fn read(&self, channel: Channel) -> Series {
        match channel {
            Channel::Co2Main => Series::Ppm(self.co2[0].read_all()),
            Channel::Co2Secondary => Series::Ppm(self.co2[1].read_all()),
            Channel::RhMain => Series::Float(self.rh[0].read_all()),
            Channel::RhSecondary => Series::Float(self.rh[1].read_all()),
            Channel::TempInnerMain => Series::Float(self.temp[0].read_all()),
            Channel::TempInnerSecondary => Series::Float(self.temp[1].read_all()),
            Channel::TempOuter => Series::Float(self.temp[2].read_all()),
            Channel::Fogger => Series::OnOff(self.fogger.read_all()),
            Channel::Swirler => Series::OnOff(self.swirler.read_all()),
            Channel::FreshAir => Series::OnOff(self.fresh_air.read_all()),
            Channel::Heater => Series::OnOff(self.heater.read_all()),
        }
    }

    /// Any channel widened to `f32`, written into a caller buffer of
    /// exactly [`HISTORY_LEN`] elements.
    pub fn read_into_f32(&self, channel: Channel, out: &mut [f32]) -> Result<(), LengthMismatch> {
        if out.len() != HISTORY_LEN {
            return Err(LengthMismatch {
                expected: HISTORY_LEN,
                actual: out.len(),
            });
        }
        let series = self.read(channel);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = series.get_f32(i).unwrap_or_default();
        }
        Ok(())
    }
}
