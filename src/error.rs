//! Error types for the EMS bus driver.
//!
//! Only setup-time and I/O failures are represented here. Protocol-level
//! conditions observed on a live bus (timeouts, checksum mismatches, short
//! frames) are not errors: they are [`crate::stats::Statistics`] counters,
//! because the driver is expected to keep running through them.

use std::io;
use thiserror::Error;

/// Errors that can prevent the driver from starting or keep it from
/// performing a requested operation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("device id {0:#04x} is out of the legal range 0x01..=0x7f")]
    InvalidDeviceId(u8),

    #[error("device id {0:#04x} collides with a write-reply sentinel value")]
    ReservedDeviceId(u8),

    #[error("failed to open UART at {path}: {source}")]
    UartOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("UART I/O error: {0}")]
    Uart(#[from] io::Error),

    #[error("watchdog timer started with no timeout and no handler configured")]
    WatchdogMisuse,

    #[error("driver is already open")]
    AlreadyOpen,

    #[error("driver is not open")]
    NotOpen,
}

pub type DriverResult<T> = Result<T, DriverError>;
