//! Storage ring behaviour across simulated reboots.
//!
//! A reboot hands the flash back from one `Storage` to a fresh one, so
//! only what was actually programmed survives.

use chamber::adapters::block_device::SimulatedFlash;
use chamber::app::ports::BlockDevice;
use chamber::config::{ChamberConfig, STORAGE_NUM_VALUES, STORAGE_SLOT_SIZE};
use chamber::error::{DeviceError, StorageError};
use chamber::storage::record::Record;
use chamber::storage::{Backend, IDX_COUNTER, Storage};

fn small_ring(slots: u32) -> ChamberConfig {
    ChamberConfig {
        storage_slots: slots,
        ..ChamberConfig::default()
    }
}

fn boot(device: SimulatedFlash, config: &ChamberConfig) -> Storage<SimulatedFlash> {
    let mut s = Storage::new(device, config);
    s.init();
    s.load();
    s
}

fn reboot(s: Storage<SimulatedFlash>, config: &ChamberConfig) -> Storage<SimulatedFlash> {
    boot(s.into_device(), config)
}

fn flash() -> SimulatedFlash {
    SimulatedFlash::new(64 * 1024, 4096)
}

fn slot_offset(s: &Storage<SimulatedFlash>, slot: usize) -> usize {
    let (base, _) = s.device().region_bounds().expect("region reserved");
    base + slot * STORAGE_SLOT_SIZE
}

fn read_record(s: &mut Storage<SimulatedFlash>, slot: u32) -> Option<Record> {
    let mut buf = [0u8; STORAGE_SLOT_SIZE];
    s.device_mut().read_slot(slot, &mut buf).ok()?;
    Record::decode(&buf).ok()
}

#[test]
fn counter_survives_reboots_across_ring_wraps() {
    let config = small_ring(4);
    let mut s = boot(flash(), &config);

    for expected in 1..=10u16 {
        assert_eq!(s.increment(IDX_COUNTER, 0).unwrap(), expected);
        s.save_now(0).unwrap();
        s = reboot(s, &config);
        assert_eq!(s.backend(), Some(Backend::Device));
        assert_eq!(s.get(IDX_COUNTER), Some(expected));
    }

    // Writes 5 and 9 landed on a used slot 0.
    assert_eq!(s.device().erase_count(), 2);
    assert_eq!(s.device().program_count(), 10);
    assert_eq!(read_record(&mut s, 1).map(|r| r.seq), Some(10));
}

#[test]
fn recovery_continues_after_highest_sequence() {
    let config = small_ring(4);
    let mut s = boot(flash(), &config);

    for (slot, seq) in [(0u32, 3u32), (1, 7), (2, 2)] {
        let mut values = [0u16; STORAGE_NUM_VALUES];
        values[IDX_COUNTER] = seq as u16 * 100;
        let image = Record::new(seq, values).encode();
        s.device_mut().write_slot(slot, &image).unwrap();
    }

    let mut s = reboot(s, &config);
    assert_eq!(s.get(IDX_COUNTER), Some(700));
    assert_eq!(s.current_slot(), 2);

    // Slot 2 holds stale data, so the region is erased before seq 8 goes in.
    s.increment(IDX_COUNTER, 0).unwrap();
    s.save_now(0).unwrap();
    assert_eq!(s.device().erase_count(), 1);

    let mut s = reboot(s, &config);
    assert_eq!(s.get(IDX_COUNTER), Some(701));
    assert_eq!(s.current_slot(), 3);
    assert_eq!(read_record(&mut s, 2).map(|r| r.seq), Some(8));
    assert_eq!(read_record(&mut s, 0), None);
}

#[test]
fn corrupted_newest_record_falls_back_to_previous() {
    let config = small_ring(8);
    let mut s = boot(flash(), &config);

    s.set(IDX_COUNTER, 11, 0).unwrap();
    s.save_now(0).unwrap();
    s.set(IDX_COUNTER, 22, 0).unwrap();
    s.save_now(0).unwrap();

    // Flip one bit inside the value block of slot 1.
    let offset = slot_offset(&s, 1) + 5;
    s.device_mut().corrupt(offset, 0x01);

    let mut s = reboot(s, &config);
    assert_eq!(s.get(IDX_COUNTER), Some(11));
    assert_eq!(s.current_slot(), 1);

    s.set(IDX_COUNTER, 33, 0).unwrap();
    s.save_now(0).unwrap();
    let s = reboot(s, &config);
    assert_eq!(s.get(IDX_COUNTER), Some(33));
}

#[test]
fn failed_erase_on_wrap_is_retried() {
    let config = small_ring(2);
    let mut s = boot(flash(), &config);
    for v in 1..=2 {
        s.set(IDX_COUNTER, v, 0).unwrap();
        s.save_now(0).unwrap();
    }

    s.device_mut().fail_next_erases(1);
    s.set(IDX_COUNTER, 3, 0).unwrap();
    assert_eq!(
        s.save_now(100),
        Err(StorageError::Device(DeviceError::EraseFailed))
    );
    assert!(s.is_dirty());
    assert_eq!(s.current_slot(), 0);

    // The failure restarted the quiet period.
    assert!(!s.tick(5_000));
    assert!(s.tick(5_100));
    assert!(!s.is_dirty());

    let s = reboot(s, &config);
    assert_eq!(s.get(IDX_COUNTER), Some(3));
}

#[test]
fn ram_fallback_forgets_on_reboot() {
    let config = ChamberConfig::default();
    let mut device = flash();
    device.fail_init(true);

    let mut s = boot(device, &config);
    assert_eq!(s.backend(), Some(Backend::Ram));
    s.set(IDX_COUNTER, 42, 0).unwrap();
    s.save_now(0).unwrap();
    assert_eq!(s.get(IDX_COUNTER), Some(42));
    assert_eq!(s.device().program_count(), 0);

    let s = reboot(s, &config);
    assert_eq!(s.backend(), Some(Backend::Ram));
    assert_eq!(s.get(IDX_COUNTER), Some(0));
}

#[test]
fn quiet_period_coalesces_a_burst() {
    let config = ChamberConfig::default();
    let mut s = boot(flash(), &config);

    for (t, v) in [(0u32, 1u16), (1_000, 2), (4_000, 3)] {
        s.set(IDX_COUNTER, v, t).unwrap();
        assert!(!s.tick(t));
    }
    assert!(!s.tick(8_999));
    assert!(s.tick(9_000));
    assert!(!s.tick(20_000));
    assert_eq!(s.device().program_count(), 1);

    let s = reboot(s, &config);
    assert_eq!(s.get(IDX_COUNTER), Some(3));
}
