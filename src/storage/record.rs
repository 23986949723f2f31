//! On-flash record layout.
//!
//! ```text
//!  0      4                      24   25                        64
//!  ┌──────┬──────────────────────┬────┬──────────────────────────┐
//!  │ seq  │ values[0..10] u16 LE │crc8│ zero padding             │
//!  │ u32LE│                      │    │                          │
//!  └──────┴──────────────────────┴────┴──────────────────────────┘
//! ```
//!
//! `seq == 0xFFFF_FFFF` is what an erased slot reads back as and never
//! marks a valid record.  The CRC covers bytes 0–23.

use crate::config::{STORAGE_NUM_VALUES, STORAGE_SLOT_SIZE};

/// Sequence value of an erased (never programmed) slot.
pub const SEQ_ERASED: u32 = 0xFFFF_FFFF;

const SEQ_OFFSET: usize = 0;
const VALUES_OFFSET: usize = 4;
/// Number of bytes covered by the checksum.
pub const CRC_COVERED: usize = VALUES_OFFSET + STORAGE_NUM_VALUES * 2;
const CRC_OFFSET: usize = CRC_COVERED;

/// CRC-8, polynomial 0x07, initial value 0xFF, no reflection, no final XOR.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// One decoded slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub seq: u32,
    pub values: [u16; STORAGE_NUM_VALUES],
}

/// Why a slot did not decode into a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is not exactly one slot long.
    BadLength,
    /// Stored checksum does not match the recomputed one.
    CrcMismatch,
    /// Slot carries the erased sentinel sequence.
    Erased,
}

impl Record {
    pub fn new(seq: u32, values: [u16; STORAGE_NUM_VALUES]) -> Self {
        Self { seq, values }
    }

    /// Serialise into a full slot image with a fresh checksum.
    pub fn encode(&self) -> [u8; STORAGE_SLOT_SIZE] {
        let mut buf = [0u8; STORAGE_SLOT_SIZE];
        buf[SEQ_OFFSET..SEQ_OFFSET + 4].copy_from_slice(&self.seq.to_le_bytes());
        for (i, v) in self.values.iter().enumerate() {
            let at = VALUES_OFFSET + i * 2;
            buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }
        buf[CRC_OFFSET] = crc8(&buf[..CRC_COVERED]);
        buf
    }

    /// Parse and validate a slot image.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != STORAGE_SLOT_SIZE {
            return Err(DecodeError::BadLength);
        }
        if crc8(&buf[..CRC_COVERED]) != buf[CRC_OFFSET] {
            return Err(DecodeError::CrcMismatch);
        }
        let seq = read_seq(buf);
        if seq == SEQ_ERASED {
            return Err(DecodeError::Erased);
        }
        let mut values = [0u16; STORAGE_NUM_VALUES];
        for (i, v) in values.iter_mut().enumerate() {
            let at = VALUES_OFFSET + i * 2;
            *v = u16::from_le_bytes([buf[at], buf[at + 1]]);
        }
        Ok(Self { seq, values })
    }
}

/// Raw sequence field, without any validation.
pub fn read_seq(buf: &[u8]) -> u32 {
    match buf.get(SEQ_OFFSET..SEQ_OFFSET + 4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => SEQ_ERASED,
    }
}

/// `true` if every byte is 0xFF.
pub fn is_erased(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0xFF)
}
