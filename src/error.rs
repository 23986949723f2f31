//! Unified error types for the chamber firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level loop's error handling uniform.  All variants are `Copy` so they
//! can be handed back from the storage and sensor layers without allocation.
//! None of these are fatal to the control loop: callers log and degrade.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The sensor source could not produce a reading.
    Sensor(SensorError),
    /// The setpoint store rejected or failed an operation.
    Storage(StorageError),
    /// The raw block device failed.
    Device(DeviceError),
    /// An HTTP request could not be read or understood.
    Http(HttpError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Device(e) => write!(f, "device: {e}"),
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction failed or timed out.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Sensor has not produced its first measurement yet.
    NotReady,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotReady => write!(f, "sensor not ready"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Block device errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`BlockDevice`](crate::app::ports::BlockDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The storage region was never reserved (init failed or not called).
    NotInitialised,
    /// The device is absent or reported zero capacity.
    Unavailable,
    /// The requested region does not fit on the device.
    RegionTooLarge,
    /// Slot index or buffer length does not match the reserved geometry.
    OutOfBounds,
    /// Program operation failed.
    ProgramFailed,
    /// Erase operation failed.
    EraseFailed,
    /// Read operation failed.
    ReadFailed,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialised => write!(f, "region not initialised"),
            Self::Unavailable => write!(f, "device unavailable"),
            Self::RegionTooLarge => write!(f, "region larger than device"),
            Self::OutOfBounds => write!(f, "slot or length out of bounds"),
            Self::ProgramFailed => write!(f, "program failed"),
            Self::EraseFailed => write!(f, "erase failed"),
            Self::ReadFailed => write!(f, "read failed"),
        }
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// `init()` has not been called.
    NotInitialised,
    /// Value index outside the ten-slot array.
    IndexOutOfRange,
    /// The backing device failed while persisting.
    Device(DeviceError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialised => write!(f, "storage not initialised"),
            Self::IndexOutOfRange => write!(f, "value index out of range"),
            Self::Device(e) => write!(f, "device: {e}"),
        }
    }
}

impl From<DeviceError> for StorageError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// HTTP errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Peer stayed connected but idle past the deadline.
    Timeout,
    /// Peer closed before the end of the request head.
    Closed,
    /// Request line or header could not be parsed.
    BadRequest,
    /// A line exceeded the maximum accepted length.
    TooLong,
    /// Underlying socket error.
    Io,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Closed => write!(f, "connection closed"),
            Self::BadRequest => write!(f, "bad request"),
            Self::TooLong => write!(f, "request line too long"),
            Self::Io => write!(f, "socket error"),
        }
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation; the text names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
