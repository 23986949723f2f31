//! Property and fuzz-style tests for robustness of core data structures.
//!
//! Runs on host only.  proptest is not available for embedded targets,
//! where these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::io::Cursor;
use std::time::Duration;

use chamber::adapters::block_device::SimulatedFlash;
use chamber::app::events::AppEvent;
use chamber::app::ports::{ActuatorPort, EventSink, SensorSource};
use chamber::app::service::ChamberService;
use chamber::config::{ChamberConfig, STORAGE_NUM_VALUES, STORAGE_SLOT_SIZE};
use chamber::control::action::Action;
use chamber::sensors::SensorSnapshot;
use chamber::storage::Storage;
use chamber::storage::record::Record;
use chamber::web::{Request, read_request};
use proptest::prelude::*;

// ── Record decoding ──────────────────────────────────────────

proptest! {
    /// Arbitrary slot contents never panic the decoder, and anything it
    /// accepts re-encodes to the same CRC-covered bytes.
    #[test]
    fn record_decode_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..=2 * STORAGE_SLOT_SIZE)) {
        if let Ok(rec) = Record::decode(&bytes) {
            prop_assert_eq!(bytes.len(), STORAGE_SLOT_SIZE);
            let image = rec.encode();
            prop_assert_eq!(&image[..25], &bytes[..25]);
        }
    }
}

// ── HTTP request head ────────────────────────────────────────

proptest! {
    #[test]
    fn request_line_parser_never_panics(line in ".{0,200}") {
        let _ = Request::parse_line(&line);
    }

    #[test]
    fn request_reader_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..=1024)) {
        let mut reader = Cursor::new(bytes);
        let _ = read_request(&mut reader, Duration::from_secs(1));
    }
}

// ── Storage ring persistence ─────────────────────────────────

#[derive(Debug, Clone)]
enum StoreOp {
    Set(usize, u16),
    Advance(u32),
    SaveNow,
    FailNextWrite,
    Reboot,
}

fn arb_store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        4 => (0..STORAGE_NUM_VALUES, any::<u16>()).prop_map(|(i, v)| StoreOp::Set(i, v)),
        3 => (1u32..=8_000).prop_map(StoreOp::Advance),
        2 => Just(StoreOp::SaveNow),
        1 => Just(StoreOp::FailNextWrite),
        1 => Just(StoreOp::Reboot),
    ]
}

proptest! {
    /// After any mix of edits, saves, write faults and reboots, a reboot
    /// recovers exactly the last values that reached the device.  A
    /// program that fails right after a wrap erase leaves nothing behind.
    #[test]
    fn reboot_recovers_last_persisted_values(
        slots in 2u32..=6,
        ops in proptest::collection::vec(arb_store_op(), 1..=60),
    ) {
        let config = ChamberConfig { storage_slots: slots, ..ChamberConfig::default() };
        let boot = |device: SimulatedFlash| {
            let mut s = Storage::new(device, &config);
            s.init();
            s.load();
            s
        };

        let mut storage = boot(SimulatedFlash::new(16 * 1024, 1024));
        let mut persisted = [0u16; STORAGE_NUM_VALUES];
        let mut now: u32 = 0;

        for op in ops {
            match op {
                StoreOp::Set(i, v) => storage.set(i, v, now).unwrap(),
                StoreOp::Advance(ms) => {
                    now = now.wrapping_add(ms);
                    let erases = storage.device().erase_count();
                    if storage.tick(now) {
                        persisted = *storage.values();
                    } else if storage.device().erase_count() != erases {
                        // Wrapped, erased, then the program failed.
                        persisted = [0; STORAGE_NUM_VALUES];
                    }
                }
                StoreOp::SaveNow => {
                    let erases = storage.device().erase_count();
                    if storage.save_now(now).is_ok() {
                        persisted = *storage.values();
                    } else if storage.device().erase_count() != erases {
                        persisted = [0; STORAGE_NUM_VALUES];
                    }
                }
                StoreOp::FailNextWrite => storage.device_mut().fail_next_writes(1),
                StoreOp::Reboot => {
                    storage = boot(storage.into_device());
                    prop_assert_eq!(storage.values(), &persisted);
                }
            }
        }

        let storage = boot(storage.into_device());
        prop_assert_eq!(storage.values(), &persisted);
    }
}

// ── Action machine ───────────────────────────────────────────

struct NullHw;

impl ActuatorPort for NullHw {
    fn set_swirler(&mut self, _on: bool) {}
    fn set_fresh_air(&mut self, _on: bool) {}
    fn set_fogger(&mut self, _on: bool) {}
    fn set_heater(&mut self, _on: bool) {}
}

#[derive(Default)]
struct Events(Vec<AppEvent>);

impl EventSink for Events {
    fn emit(&mut self, event: &AppEvent) {
        self.0.push(event.clone());
    }
}

struct Levels(SensorSnapshot);

impl SensorSource for Levels {
    fn read(&mut self, _now_ms: u32) -> SensorSnapshot {
        self.0
    }
}

fn snapshot(co2: i32, rh: f32, temp: f32) -> SensorSnapshot {
    SensorSnapshot {
        co2_ppm: [co2, co2],
        rh_percent: [rh, rh],
        temp_c: [temp, temp, temp],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever the air does and however irregular the tick spacing, at
    /// most one action is ever running.
    #[test]
    fn actions_never_overlap(
        start in any::<u32>(),
        phases in proptest::collection::vec(
            (300i32..=3_000, 70.0f32..=99.0, 15.0f32..=30.0, 1u32..=40, 50u32..=400),
            1..=8,
        ),
    ) {
        let config = ChamberConfig::default();
        let storage = Storage::new(SimulatedFlash::new(64 * 1024, 4096), &config);
        let mut svc = ChamberService::new(config, storage);
        let mut events = Events::default();
        svc.start(start, &mut NullHw, &mut events);

        let mut now = start;
        for (co2, rh, temp, step, ticks) in phases {
            let mut src = Levels(snapshot(co2, rh, temp));
            for _ in 0..ticks {
                now = now.wrapping_add(step * 10);
                svc.tick(now, &mut src, &mut NullHw, &mut events);
            }
        }

        let mut running = false;
        for e in &events.0 {
            match e {
                AppEvent::ActionStarted(a) => {
                    prop_assert!(!running, "{:?} started over a running action", a);
                    prop_assert_ne!(*a, Action::None);
                    running = true;
                }
                AppEvent::ActionCompleted(_) => {
                    prop_assert!(running);
                    running = false;
                }
                _ => {}
            }
        }
        prop_assert_eq!(running, svc.action() != Action::None);
    }
}
