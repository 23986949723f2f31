//! Block-device adapters.
//!
//! - [`SimulatedFlash`]: an in-memory NOR flash: erase sets bytes to
//!   0xFF, programming can only clear bits.  The record region is carved
//!   from the top of the device and rounded up to the erase granularity.
//!   Faults can be injected for tests.
//! - [`NoDevice`]: a board without storage.  `init` always fails, which
//!   drives [`Storage`](crate::storage::Storage) onto its RAM fallback.

use log::{debug, info};

use crate::app::ports::BlockDevice;
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy)]
struct Region {
    base: usize,
    len: usize,
    slot_size: usize,
    num_slots: usize,
}

impl Region {
    fn slot_range(&self, index: u32, len: usize) -> Result<core::ops::Range<usize>, DeviceError> {
        let index = index as usize;
        if index >= self.num_slots || len != self.slot_size {
            return Err(DeviceError::OutOfBounds);
        }
        let start = self.base + index * self.slot_size;
        Ok(start..start + self.slot_size)
    }
}

/// In-memory NOR flash.
pub struct SimulatedFlash {
    mem: Vec<u8>,
    erase_size: usize,
    region: Option<Region>,

    fail_init: bool,
    fail_writes: u32,
    fail_erases: u32,

    program_count: u32,
    erase_count: u32,
}

impl SimulatedFlash {
    /// A fully erased device of `total_bytes` with `erase_size` sectors.
    pub fn new(total_bytes: usize, erase_size: usize) -> Self {
        Self {
            mem: vec![0xFF; total_bytes],
            erase_size: erase_size.max(1),
            region: None,
            fail_init: false,
            fail_writes: 0,
            fail_erases: 0,
            program_count: 0,
            erase_count: 0,
        }
    }

    // ── Fault injection ───────────────────────────────────────

    /// Make every subsequent `init` fail.
    pub fn fail_init(&mut self, fail: bool) {
        self.fail_init = fail;
    }

    /// Fail the next `n` programs without touching memory.
    pub fn fail_next_writes(&mut self, n: u32) {
        self.fail_writes = n;
    }

    /// Fail the next `n` region erases.
    pub fn fail_next_erases(&mut self, n: u32) {
        self.fail_erases = n;
    }

    // ── Introspection ─────────────────────────────────────────

    /// Successful slot programs since construction.
    pub fn program_count(&self) -> u32 {
        self.program_count
    }

    /// Successful region erases since construction.
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Byte offset and length of the reserved region.
    pub fn region_bounds(&self) -> Option<(usize, usize)> {
        self.region.map(|r| (r.base, r.len))
    }

    /// Flip bits at an absolute offset, bypassing NOR rules.
    pub fn corrupt(&mut self, offset: usize, xor: u8) {
        if let Some(b) = self.mem.get_mut(offset) {
            *b ^= xor;
        }
    }

    fn region(&self) -> Result<Region, DeviceError> {
        self.region.ok_or(DeviceError::NotInitialised)
    }
}

impl BlockDevice for SimulatedFlash {
    fn init(&mut self, region_bytes: u32, slot_size: u32, num_slots: u32) -> Result<(), DeviceError> {
        self.region = None;
        if self.fail_init || self.mem.is_empty() {
            return Err(DeviceError::Unavailable);
        }
        let slot_size = slot_size as usize;
        let num_slots = num_slots as usize;
        let region_bytes = region_bytes as usize;
        if slot_size == 0 || num_slots == 0 || slot_size * num_slots > region_bytes {
            return Err(DeviceError::OutOfBounds);
        }

        let len = region_bytes.div_ceil(self.erase_size) * self.erase_size;
        if len > self.mem.len() {
            return Err(DeviceError::RegionTooLarge);
        }
        let base = self.mem.len() - len;
        self.region = Some(Region {
            base,
            len,
            slot_size,
            num_slots,
        });
        info!(
            "Flash: reserved {} bytes at offset 0x{:X} ({} slots x {} bytes)",
            len, base, num_slots, slot_size
        );
        Ok(())
    }

    fn read_slot(&mut self, index: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        let range = self.region()?.slot_range(index, buf.len())?;
        buf.copy_from_slice(&self.mem[range]);
        Ok(())
    }

    fn write_slot(&mut self, index: u32, data: &[u8]) -> Result<(), DeviceError> {
        let range = self.region()?.slot_range(index, data.len())?;
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(DeviceError::ProgramFailed);
        }
        for (cell, &byte) in self.mem[range].iter_mut().zip(data) {
            *cell &= byte;
        }
        self.program_count += 1;
        Ok(())
    }

    fn erase_region(&mut self) -> Result<(), DeviceError> {
        let region = self.region()?;
        if self.fail_erases > 0 {
            self.fail_erases -= 1;
            return Err(DeviceError::EraseFailed);
        }
        self.mem[region.base..region.base + region.len].fill(0xFF);
        self.erase_count += 1;
        debug!("Flash: region erased ({} total)", self.erase_count);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.region.is_some()
    }
}

/// A board with no block device fitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDevice;

impl BlockDevice for NoDevice {
    fn init(&mut self, _region_bytes: u32, _slot_size: u32, _num_slots: u32) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable)
    }

    fn read_slot(&mut self, _index: u32, _buf: &mut [u8]) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialised)
    }

    fn write_slot(&mut self, _index: u32, _data: &[u8]) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialised)
    }

    fn erase_region(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::NotInitialised)
    }

    fn is_available(&self) -> bool {
        false
    }
}
