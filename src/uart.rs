//! UART abstraction consumed by the Reader and Writer threads.
//!
//! The production implementation wraps [`serialport`]'s native TTY port,
//! configured 8-N-1 with no flow control and a short read timeout so the
//! Reader thread can poll a shutdown flag
//! instead of blocking forever), plus the two low-level knobs the EMS bus
//! needs that a generic serial port doesn't expose: parity-marking framing
//! errors, and sending a break.

use std::io;
use std::path::Path;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// How long a blocking read waits before giving the Reader thread a chance
/// to notice a shutdown request. Short relative to the 200ms poll window so
/// shutdown is always prompt.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The 9600bps EMS bus line rate.
pub const BAUD_RATE: u32 = 9600;

/// The operations the rest of the driver needs from a serial connection.
pub trait Uart: Send {
    /// Blocks for up to [`READ_POLL_INTERVAL`] for a single byte. On timeout
    /// returns an `io::Error` of kind [`io::ErrorKind::TimedOut`].
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Drains whatever is already buffered, without blocking. Returns the
    /// number of bytes appended to `buf`.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush_input(&mut self) -> io::Result<()>;
    fn flush_output(&mut self) -> io::Result<()>;

    /// Holds the line low (space) for `duration`, then releases it: the
    /// frame delimiter of the wire protocol.
    fn send_break(&mut self, duration: Duration) -> io::Result<()>;

    /// Enables or disables parity-marking of framing/parity errors
    /// (`PARMRK`), the mechanism the Reader relies on to tell a genuine
    /// break from a `0xFF` run in the data stream.
    fn set_parity_marking(&mut self, enabled: bool) -> io::Result<()>;

    /// Produces a second, independent handle onto the same underlying
    /// connection, so the Reader and Writer threads can each own one
    /// without sharing mutable state.
    fn try_clone(&self) -> io::Result<Box<dyn Uart>>;
}

fn to_io_error(err: serialport::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// A [`Uart`] backed by a real serial device node.
pub struct SerialUart {
    port: Box<dyn SerialPort>,
}

impl SerialUart {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let port_name = path.as_ref().to_string_lossy().into_owned();
        let port = serialport::new(port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL_INTERVAL)
            .open()
            .map_err(to_io_error)?;
        Ok(Self { port })
    }
}

impl Uart for SerialUart {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0_u8; 1];
        self.port.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let waiting = self.port.bytes_to_read().map_err(to_io_error)? as usize;
        if waiting == 0 {
            return Ok(0);
        }
        let start = buf.len();
        buf.resize(start + waiting, 0);
        let read = self.port.read(&mut buf[start..])?;
        buf.truncate(start + read);
        Ok(read)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, bytes)
    }

    fn flush_input(&mut self) -> io::Result<()> {
        self.port.clear(serialport::ClearBuffer::Input).map_err(to_io_error)
    }

    fn flush_output(&mut self) -> io::Result<()> {
        self.port.clear(serialport::ClearBuffer::Output).map_err(to_io_error)
    }

    fn send_break(&mut self, duration: Duration) -> io::Result<()> {
        platform::send_break(platform::raw_fd(&*self.port), duration)
    }

    fn set_parity_marking(&mut self, enabled: bool) -> io::Result<()> {
        platform::set_parity_marking(platform::raw_fd(&*self.port), enabled)
    }

    fn try_clone(&self) -> io::Result<Box<dyn Uart>> {
        let port = self.port.try_clone().map_err(to_io_error)?;
        Ok(Box::new(SerialUart { port }))
    }
}

#[cfg(unix)]
mod platform {
    use std::io;
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::thread;
    use std::time::Duration;

    /// `serialport`'s `SerialPort` trait carries `AsRawFd` as a supertrait on
    /// unix, so this works on the trait object directly.
    pub fn raw_fd(port: &dyn serialport::SerialPort) -> RawFd {
        port.as_raw_fd()
    }

    /// `TIOCSBRK`/`TIOCCBRK` start and stop a break condition on the line,
    /// issued directly via `libc::ioctl` instead of shipping a bundled
    /// native library.
    pub fn send_break(fd: RawFd, duration: Duration) -> io::Result<()> {
        ioctl_no_arg(fd, libc::TIOCSBRK as libc::c_ulong)?;
        thread::sleep(duration);
        ioctl_no_arg(fd, libc::TIOCCBRK as libc::c_ulong)?;
        Ok(())
    }

    pub fn set_parity_marking(fd: RawFd, enabled: bool) -> io::Result<()> {
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            if enabled {
                termios.c_iflag |= libc::PARMRK;
                termios.c_iflag &= !libc::IGNPAR;
            } else {
                termios.c_iflag &= !libc::PARMRK;
            }
            if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn ioctl_no_arg(fd: std::os::unix::io::RawFd, request: libc::c_ulong) -> io::Result<()> {
        let ret = unsafe { libc::ioctl(fd, request as _, 0) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// An in-memory [`Uart`] double, for exercising the Reader/Writer/Driver
/// against synthetic bus traffic without a real TTY. Kept public (rather
/// than `#[cfg(test)]`) so integration tests under `tests/`, which link the
/// crate like any other dependent, can reach it too.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Inner {
        to_read: VecDeque<u8>,
        written: Vec<u8>,
        break_count: usize,
        parity_marking: bool,
    }

    /// The `Uart` end a Reader/Writer thread is handed.
    pub struct MockUart {
        inner: Arc<Mutex<Inner>>,
    }

    /// The test's end: feed bytes in, inspect what was written out.
    #[derive(Clone)]
    pub struct MockUartHandle {
        inner: Arc<Mutex<Inner>>,
    }

    impl Default for MockUart {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockUart {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(Inner::default())),
            }
        }

        pub fn handle(&self) -> MockUartHandle {
            MockUartHandle {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl MockUartHandle {
        /// Queues bytes for the next `read_byte`/`read_available` calls.
        pub fn push_incoming(&self, bytes: &[u8]) {
            self.inner.lock().unwrap().to_read.extend(bytes.iter().copied());
        }

        pub fn written(&self) -> Vec<u8> {
            self.inner.lock().unwrap().written.clone()
        }

        pub fn break_count(&self) -> usize {
            self.inner.lock().unwrap().break_count
        }

        pub fn parity_marking_enabled(&self) -> bool {
            self.inner.lock().unwrap().parity_marking
        }
    }

    impl Uart for MockUart {
        fn read_byte(&mut self) -> io::Result<u8> {
            let mut guard = self.inner.lock().unwrap();
            guard
                .to_read
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no data queued"))
        }

        fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
            let mut guard = self.inner.lock().unwrap();
            let before = buf.len();
            buf.extend(guard.to_read.drain(..));
            Ok(buf.len() - before)
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.inner.lock().unwrap().written.extend_from_slice(bytes);
            Ok(())
        }

        fn flush_input(&mut self) -> io::Result<()> {
            self.inner.lock().unwrap().to_read.clear();
            Ok(())
        }

        fn flush_output(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn send_break(&mut self, _duration: Duration) -> io::Result<()> {
            self.inner.lock().unwrap().break_count += 1;
            Ok(())
        }

        fn set_parity_marking(&mut self, enabled: bool) -> io::Result<()> {
            self.inner.lock().unwrap().parity_marking = enabled;
            Ok(())
        }

        fn try_clone(&self) -> io::Result<Box<dyn Uart>> {
            Ok(Box::new(MockUart { inner: Arc::clone(&self.inner) }))
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::io;
    use std::time::Duration;

    pub fn raw_fd(_port: &dyn serialport::SerialPort) {}

    pub fn send_break(_fd: (), _duration: Duration) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "break generation is only implemented on unix",
        ))
    }

    pub fn set_parity_marking(_fd: (), _enabled: bool) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "parity marking is only implemented on unix",
        ))
    }
}
