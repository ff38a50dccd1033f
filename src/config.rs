//! Driver configuration and validation.

use std::path::{Path, PathBuf};

use crate::error::{DriverError, DriverResult};
use crate::frame::WRITE_REPLY_SENTINELS;

/// Default serial device node for the on-board UART.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyAMA0";

/// Bus participation mode.
///
/// `Monitor` only observes the bus; `Participate` answers poll/read/write
/// requests addressed to this device id; `Mixed` does both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Monitor,
    Participate,
    Mixed,
}

impl Mode {
    /// Textual form returned by [`crate::driver::Driver::get_mode`].
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Monitor => "Monitor",
            Mode::Participate => "Participate",
            Mode::Mixed => "Participate & monitor",
        }
    }
}

/// Validated configuration for opening a bus driver instance.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub device_id: u8,
    pub mode: Mode,
    pub serial_device_path: PathBuf,
}

impl DriverConfig {
    /// Builds a configuration, rejecting an illegal device id up front.
    ///
    /// A legal device id is in `1..=0x7F` and is not one of the two
    /// write-reply sentinel values (`0x01`, `0x04`), which can never appear
    /// as a real bus address.
    pub fn new(device_id: u8, mode: Mode, serial_device_path: impl AsRef<Path>) -> DriverResult<Self> {
        if device_id == 0 || device_id > 0x7F {
            return Err(DriverError::InvalidDeviceId(device_id));
        }
        if WRITE_REPLY_SENTINELS.contains(&device_id) {
            return Err(DriverError::ReservedDeviceId(device_id));
        }
        Ok(Self {
            device_id,
            mode,
            serial_device_path: serial_device_path.as_ref().to_path_buf(),
        })
    }

    /// Convenience constructor using the default on-board UART device node.
    pub fn with_default_device(device_id: u8, mode: Mode) -> DriverResult<Self> {
        Self::new(device_id, mode, DEFAULT_SERIAL_DEVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_device_id() {
        assert!(matches!(
            DriverConfig::new(0, Mode::Monitor, "/dev/null"),
            Err(DriverError::InvalidDeviceId(0))
        ));
    }

    #[test]
    fn rejects_device_id_above_range() {
        assert!(matches!(
            DriverConfig::new(0x80, Mode::Monitor, "/dev/null"),
            Err(DriverError::InvalidDeviceId(0x80))
        ));
    }

    #[test]
    fn rejects_write_reply_sentinels() {
        assert!(matches!(
            DriverConfig::new(0x01, Mode::Participate, "/dev/null"),
            Err(DriverError::ReservedDeviceId(0x01))
        ));
        assert!(matches!(
            DriverConfig::new(0x04, Mode::Participate, "/dev/null"),
            Err(DriverError::ReservedDeviceId(0x04))
        ));
    }

    #[test]
    fn accepts_legal_device_id() {
        let cfg = DriverConfig::new(0x0B, Mode::Mixed, "/dev/ttyAMA0").unwrap();
        assert_eq!(cfg.device_id, 0x0B);
        assert_eq!(cfg.mode.as_str(), "Participate & monitor");
    }
}
