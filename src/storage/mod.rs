//! Durable setpoint storage: an append-only, CRC-protected ring of
//! fixed-size records over a [`BlockDevice`].
//!
//! ```text
//!   set()/increment() ──▶ values[10] (dirty) ──[quiet period]──▶ persist()
//!                                                                  │
//!   ┌──────┬──────┬──────┬─────┬──────┐                            ▼
//!   │slot 0│slot 1│slot 2│ ... │slot N│  ◀── program at cursor, cursor += 1
//!   └──────┴──────┴──────┴─────┴──────┘      erase whole region on wrap
//! ```
//!
//! Recovery scans every slot for the CRC-valid, non-erased record with
//! the highest sequence number.  When the device cannot be initialised
//! the same ring lives in RAM: values then survive only until reset, but
//! the rest of the firmware cannot tell the difference.
//!
//! Write failures leave the cursor where it is and keep the values dirty;
//! the next attempt happens after another quiet period.

pub mod record;

use log::{debug, error, info, warn};

use crate::app::ports::BlockDevice;
use crate::clock::elapsed_ms;
use crate::config::{ChamberConfig, STORAGE_NUM_VALUES, STORAGE_SLOT_SIZE};
use crate::error::{DeviceError, StorageError};

use record::{Record, SEQ_ERASED, is_erased, read_seq};

// ---------------------------------------------------------------------------
// Value-index contract
// ---------------------------------------------------------------------------

/// Free-running counter (demo / `/inc` endpoint).
pub const IDX_COUNTER: usize = 0;
/// CO2 setpoint in ppm.
pub const IDX_CO2_SETPOINT: usize = 1;
/// RH setpoint × 10.
pub const IDX_RH_SETPOINT: usize = 2;
/// Temperature setpoint × 10.
pub const IDX_TEMP_SETPOINT: usize = 3;

pub const CO2_SETPOINT_MIN: u16 = 400;
pub const CO2_SETPOINT_MAX: u16 = 10_000;
pub const CO2_SETPOINT_DEFAULT: u16 = 800;

pub const RH_SETPOINT_MIN: f32 = 82.0;
pub const RH_SETPOINT_MAX: f32 = 96.0;
pub const RH_SETPOINT_DEFAULT: f32 = 89.0;

pub const TEMP_SETPOINT_MIN: f32 = 18.0;
pub const TEMP_SETPOINT_MAX: f32 = 32.0;
pub const TEMP_SETPOINT_DEFAULT: f32 = 25.0;

/// Where the record ring currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Device,
    Ram,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub struct Storage<D: BlockDevice> {
    device: D,
    backend: Option<Backend>,
    /// Stand-in region used when the device is unavailable.
    ram: Vec<u8>,
    num_slots: u32,
    quiet_ms: u32,
    region_bytes: u64,

    values: [u16; STORAGE_NUM_VALUES],
    current_slot: u32,
    dirty: bool,
    last_change_ms: u32,
}

impl<D: BlockDevice> Storage<D> {
    pub fn new(device: D, config: &ChamberConfig) -> Self {
        Self {
            device,
            backend: None,
            ram: Vec::new(),
            num_slots: config.storage_slots.max(1),
            quiet_ms: config.persist_quiet_ms,
            region_bytes: config.storage_region_bytes(),
            values: [0; STORAGE_NUM_VALUES],
            current_slot: 0,
            dirty: false,
            last_change_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Reserve the region on the device, falling back to RAM on failure.
    pub fn init(&mut self) -> Backend {
        info!(
            "Storage: initialising ring buffer ({} bytes, {} slots)",
            self.region_bytes, self.num_slots
        );

        let reserved = u32::try_from(self.region_bytes)
            .map_err(|_| DeviceError::RegionTooLarge)
            .and_then(|bytes| {
                self.device
                    .init(bytes, STORAGE_SLOT_SIZE as u32, self.num_slots)
            });

        let backend = match reserved {
            Ok(()) => {
                info!("Storage: block device ready");
                Backend::Device
            }
            Err(e) => {
                warn!("Storage: block device unavailable ({}), using RAM ring buffer", e);
                self.ram = vec![0xFF; self.num_slots as usize * STORAGE_SLOT_SIZE];
                Backend::Ram
            }
        };
        self.backend = Some(backend);
        backend
    }

    /// Recover the newest valid record.  Values reset to zero if none is found.
    pub fn load(&mut self) {
        if self.backend.is_none() {
            warn!("Storage: load before init, using zero values");
            self.values = [0; STORAGE_NUM_VALUES];
            return;
        }

        let mut best: Option<(u32, Record)> = None;
        let mut buf = [0u8; STORAGE_SLOT_SIZE];
        for slot in 0..self.num_slots {
            if self.read_raw(slot, &mut buf).is_err() {
                continue;
            }
            let Ok(rec) = Record::decode(&buf) else {
                continue;
            };
            if best.is_none_or(|(_, b)| rec.seq > b.seq) {
                best = Some((slot, rec));
            }
        }

        match best {
            Some((slot, rec)) => {
                self.values = rec.values;
                self.current_slot = (slot + 1) % self.num_slots;
                info!(
                    "Storage: loaded slot {} (seq={}, values[0]={})",
                    slot, rec.seq, rec.values[0]
                );
            }
            None => {
                self.values = [0; STORAGE_NUM_VALUES];
                self.current_slot = 0;
                info!("Storage: no valid records, starting fresh");
            }
        }
        self.dirty = false;
    }

    /// Debounced auto-persist.  Returns `true` if a record was written.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        if self.backend.is_none() || !self.dirty {
            return false;
        }
        if elapsed_ms(now_ms, self.last_change_ms) < self.quiet_ms {
            return false;
        }
        match self.persist(now_ms) {
            Ok(()) => true,
            Err(e) => {
                error!("Storage: auto-save failed: {}", e);
                false
            }
        }
    }

    /// Flush immediately if anything changed.
    pub fn save_now(&mut self, now_ms: u32) -> Result<(), StorageError> {
        if self.backend.is_none() {
            return Err(StorageError::NotInitialised);
        }
        if !self.dirty {
            return Ok(());
        }
        self.persist(now_ms)
    }

    // ── Raw value access ──────────────────────────────────────

    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied()
    }

    pub fn set(&mut self, index: usize, value: u16, now_ms: u32) -> Result<(), StorageError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(StorageError::IndexOutOfRange)?;
        *slot = value;
        self.dirty = true;
        self.last_change_ms = now_ms;
        Ok(())
    }

    /// Add one (wrapping) and return the new value.
    pub fn increment(&mut self, index: usize, now_ms: u32) -> Result<u16, StorageError> {
        let next = self
            .get(index)
            .ok_or(StorageError::IndexOutOfRange)?
            .wrapping_add(1);
        self.set(index, next, now_ms)?;
        Ok(next)
    }

    pub fn values(&self) -> &[u16; STORAGE_NUM_VALUES] {
        &self.values
    }

    // ── Typed setpoints ───────────────────────────────────────

    pub fn co2_setpoint(&self) -> u16 {
        let v = self.values[IDX_CO2_SETPOINT];
        if (CO2_SETPOINT_MIN..=CO2_SETPOINT_MAX).contains(&v) {
            v
        } else {
            CO2_SETPOINT_DEFAULT
        }
    }

    /// Clamp, store, and return the applied value.
    pub fn set_co2_setpoint(&mut self, ppm: u16, now_ms: u32) -> u16 {
        let v = ppm.clamp(CO2_SETPOINT_MIN, CO2_SETPOINT_MAX);
        self.values[IDX_CO2_SETPOINT] = v;
        self.touch(now_ms);
        v
    }

    pub fn rh_setpoint(&self) -> f32 {
        decode_tenths(
            self.values[IDX_RH_SETPOINT],
            RH_SETPOINT_MIN,
            RH_SETPOINT_MAX,
            RH_SETPOINT_DEFAULT,
        )
    }

    pub fn set_rh_setpoint(&mut self, percent: f32, now_ms: u32) -> f32 {
        let raw = encode_tenths(percent, RH_SETPOINT_MIN, RH_SETPOINT_MAX, RH_SETPOINT_DEFAULT);
        self.values[IDX_RH_SETPOINT] = raw;
        self.touch(now_ms);
        f32::from(raw) / 10.0
    }

    pub fn temp_setpoint(&self) -> f32 {
        decode_tenths(
            self.values[IDX_TEMP_SETPOINT],
            TEMP_SETPOINT_MIN,
            TEMP_SETPOINT_MAX,
            TEMP_SETPOINT_DEFAULT,
        )
    }

    pub fn set_temp_setpoint(&mut self, celsius: f32, now_ms: u32) -> f32 {
        let raw = encode_tenths(
            celsius,
            TEMP_SETPOINT_MIN,
            TEMP_SETPOINT_MAX,
            TEMP_SETPOINT_DEFAULT,
        );
        self.values[IDX_TEMP_SETPOINT] = raw;
        self.touch(now_ms);
        f32::from(raw) / 10.0
    }

    /// Write defaults back for any setpoint whose stored value is out of
    /// range.  Returns `true` if anything changed.
    pub fn restore_setpoint_defaults(&mut self, now_ms: u32) -> bool {
        let mut changed = false;
        if self.values[IDX_CO2_SETPOINT] != self.co2_setpoint() {
            self.set_co2_setpoint(CO2_SETPOINT_DEFAULT, now_ms);
            changed = true;
        }
        if self.values[IDX_RH_SETPOINT] != tenths(self.rh_setpoint()) {
            self.set_rh_setpoint(RH_SETPOINT_DEFAULT, now_ms);
            changed = true;
        }
        if self.values[IDX_TEMP_SETPOINT] != tenths(self.temp_setpoint()) {
            self.set_temp_setpoint(TEMP_SETPOINT_DEFAULT, now_ms);
            changed = true;
        }
        if changed {
            info!("Storage: out-of-range setpoints replaced with defaults");
        }
        changed
    }

    // ── Introspection ─────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Slot the next record will be programmed into.
    pub fn current_slot(&self) -> u32 {
        self.current_slot
    }

    /// `None` until [`init`](Self::init) has run.
    pub fn backend(&self) -> Option<Backend> {
        self.backend
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Give the device back, e.g. to simulate a reboot.
    pub fn into_device(self) -> D {
        self.device
    }

    // ── Internal ──────────────────────────────────────────────

    fn touch(&mut self, now_ms: u32) {
        self.dirty = true;
        self.last_change_ms = now_ms;
    }

    fn read_raw(&mut self, slot: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        match self.backend {
            Some(Backend::Device) => self.device.read_slot(slot, buf),
            Some(Backend::Ram) => {
                let at = slot as usize * STORAGE_SLOT_SIZE;
                let src = self
                    .ram
                    .get(at..at + STORAGE_SLOT_SIZE)
                    .ok_or(DeviceError::OutOfBounds)?;
                buf.copy_from_slice(src);
                Ok(())
            }
            None => Err(DeviceError::NotInitialised),
        }
    }

    fn persist(&mut self, now_ms: u32) -> Result<(), StorageError> {
        let backend = self.backend.ok_or(StorageError::NotInitialised)?;

        let prev_slot = (self.current_slot + self.num_slots - 1) % self.num_slots;
        let mut buf = [0u8; STORAGE_SLOT_SIZE];
        let prev_seq = match self.read_raw(prev_slot, &mut buf) {
            Ok(()) => read_seq(&buf),
            Err(_) => SEQ_ERASED,
        };
        // The erased sentinel is never a valid sequence.  Wrapping onto it
        // restarts at 1, and every older record must go first or its
        // higher sequence would win on the next load.
        let next = prev_seq.wrapping_add(1);
        let restart = prev_seq != SEQ_ERASED && next == SEQ_ERASED;
        let seq = if prev_seq == SEQ_ERASED || restart { 1 } else { next };
        if restart {
            warn!("Storage: sequence exhausted, restarting at 1");
        }
        let image = Record::new(seq, self.values).encode();

        let result = match backend {
            Backend::Device => self.program_device(&image, restart),
            Backend::Ram => {
                if restart {
                    self.ram.fill(0xFF);
                }
                let at = self.current_slot as usize * STORAGE_SLOT_SIZE;
                match self.ram.get_mut(at..at + STORAGE_SLOT_SIZE) {
                    Some(dst) => {
                        dst.copy_from_slice(&image);
                        Ok(())
                    }
                    None => Err(DeviceError::OutOfBounds),
                }
            }
        };

        match result {
            Ok(()) => {
                debug!(
                    "Storage: saved to {:?} slot {} (seq={}, values[0]={})",
                    backend, self.current_slot, seq, self.values[0]
                );
                self.current_slot = (self.current_slot + 1) % self.num_slots;
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                // Keep the record pending; retry after another quiet period.
                self.last_change_ms = now_ms;
                error!(
                    "Storage: write to slot {} failed ({}), will retry",
                    self.current_slot, e
                );
                Err(StorageError::Device(e))
            }
        }
    }

    fn program_device(
        &mut self,
        image: &[u8; STORAGE_SLOT_SIZE],
        force_erase: bool,
    ) -> Result<(), DeviceError> {
        let mut existing = [0u8; STORAGE_SLOT_SIZE];
        if force_erase {
            self.device.erase_region()?;
        } else if self.device.read_slot(self.current_slot, &mut existing).is_ok()
            && !is_erased(&existing)
        {
            info!("Storage: slot {} not erased, erasing region", self.current_slot);
            self.device.erase_region()?;
        }
        self.device.write_slot(self.current_slot, image)
    }
}

/// Float setpoint → stored tenths, clamped; non-finite input maps to `default`.
fn encode_tenths(value: f32, min: f32, max: f32, default: f32) -> u16 {
    let v = if value.is_finite() { value } else { default };
    tenths(v.clamp(min, max))
}

fn tenths(value: f32) -> u16 {
    (value * 10.0).round() as u16
}

fn decode_tenths(raw: u16, min: f32, max: f32, default: f32) -> f32 {
    if (tenths(min)..=tenths(max)).contains(&raw) {
        f32::from(raw) / 10.0
    } else {
        default
    }
}
