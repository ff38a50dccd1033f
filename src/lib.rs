//! Layer-2 driver for the EMS bus: a half-duplex, 9600bps, asynchronous
//! serial protocol used by heating appliances.
//!
//! The driver attaches to a single UART and acts as a participant on the
//! bus: it reassembles frames from the byte stream, validates them,
//! classifies them, responds to polls addressed to it, serializes outbound
//! frames so they are only transmitted during its poll window, and exposes
//! a frame-level read/write interface to an upstream application.
//!
//! [`driver::Driver`] is the entry point. [`config::DriverConfig`] describes
//! a device id, [`config::Mode`], and serial device node; `Driver::open`
//! starts the five worker threads (ingress dispatch, reader, writer, egress
//! dispatch, plus the framer riding between the reader and ingress
//! dispatch) and returns a handle whose `read_frame`/`write_frame` are the
//! application's only interface to the bus.

pub mod config;
pub mod driver;
pub mod echo;
pub mod egress;
pub mod error;
pub mod frame;
pub mod framer;
pub mod fsm;
pub mod ingress;
pub mod logging;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod uart;
pub mod watchdog;
pub mod writer;

pub use config::{DriverConfig, Mode};
pub use driver::Driver;
pub use error::{DriverError, DriverResult};
pub use frame::{ClassifiedFrame, ErredFrame, FrameKind, OutgoingFrame};
pub use stats::StatisticsSnapshot;
