//! Optional syslog-backed logger, installed on request by an embedding
//! application instead of wiring its own [`log`] subscriber.
//!
//! Messages are tagged under the identity `"EMS"`, with the emitting
//! component name (`bus`, `reader`, `framer`, `idisp`, `edisp`, `writer`,
//! `watchdog`) carried as a `target` on the `log` record, so a syslog
//! consumer can filter by component the same way it would filter by tag.

#![cfg(unix)]

use log::LevelFilter;
use syslog::{BasicLogger, Facility, Formatter3164};

/// Installs a syslog-backed [`log`] logger under the `"EMS"` identity at
/// facility `LOCAL6`. Returns an error if a logger is already installed or
/// the syslog socket can't be reached.
///
/// Calling this is entirely optional: every module here logs through the
/// `log` facade regardless, so an application that installs its own
/// subscriber (`env_logger`, `tracing-log`, ...) instead of this one sees
/// the same messages.
pub fn init_syslog(max_level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let formatter = Formatter3164 {
        facility: Facility::LOG_LOCAL6,
        hostname: None,
        process: "EMS".into(),
        pid: std::process::id() as i32,
    };
    let logger = syslog::unix(formatter)?;
    log::set_boxed_logger(Box::new(BasicLogger::new(logger)))?;
    log::set_max_level(max_level);
    Ok(())
}
