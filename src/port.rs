//! The serial transport underneath the line codec.
//!
//! `MdbPort` is the seam between the protocol logic (frame reader, line codec) and the actual
//! UART. The real implementation, [`UnixMdbPort`], opens a `serialport` handle and then reaches
//! past its portable API into raw termios to enable mark/space parity emulation of the MDB 9th
//! bit - `serialport` has no notion of `PARMRK`/`CMSPAR`, so this part is inherently platform
//! specific and confined to `cfg(unix)`.
//!
//! Tests substitute [`MockPort`], a thread-safe in-memory byte pipe that never touches termios.

use std::io;
use std::time::Duration;

use crate::wire::ParityMode;

/// Abstraction over a 9-bit-emulating serial line.
///
/// Implementors are expected to be blocking: `read_byte` waits up to the configured timeout and
/// returns `Ok(None)` on timeout rather than an error, matching the semantics the frame reader
/// relies on to tolerate idle bus time.
pub trait MdbPort: Send {
    /// Read a single raw byte, or `None` if no byte arrived within the port's read timeout.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write raw bytes verbatim, under whatever parity mode is currently configured.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Switch the outbound parity mode. Must only be called between packets - see the timing
    /// requirement in the line codec.
    fn set_output_parity(&mut self, mode: ParityMode) -> io::Result<()>;
}

/// Real serial port backing, implemented against `serialport` plus raw termios on Unix.
pub struct UnixMdbPort {
    inner: Box<dyn serialport::SerialPort>,
}

impl UnixMdbPort {
    /// Open `path` at 9600 baud, 8 data bits, 1 stop bit, and configure the line for MDB's
    /// mark/space parity emulation: parity-error marking on input (so address bytes arrive
    /// prefixed with `FF 00`) and space parity on output to start.
    pub fn open(path: &str, read_timeout: Duration) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, 9600)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::Even)
            .timeout(read_timeout)
            .open()?;

        let mut port = Self { inner: port };
        port.configure_mark_parity_input()?;
        port.set_output_parity(ParityMode::Space)
            .map_err(|e| serialport::Error::new(serialport::ErrorKind::Io(e.kind()), e.to_string()))?;
        Ok(port)
    }

    #[cfg(unix)]
    fn configure_mark_parity_input(&mut self) -> Result<(), serialport::Error> {
        unix_termios::enable_parity_marking(self.inner.as_raw_fd())
            .map_err(|e| serialport::Error::new(serialport::ErrorKind::Io(e.kind()), e.to_string()))
    }

    #[cfg(not(unix))]
    fn configure_mark_parity_input(&mut self) -> Result<(), serialport::Error> {
        log::warn!("mark-parity input marking is only implemented for unix; running unsupported on this platform");
        Ok(())
    }
}

impl MdbPort for UnixMdbPort {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    fn set_output_parity(&mut self, mode: ParityMode) -> io::Result<()> {
        #[cfg(unix)]
        {
            unix_termios::set_output_parity(self.inner.as_raw_fd(), mode)
        }
        #[cfg(not(unix))]
        {
            let _ = mode;
            Ok(())
        }
    }
}

#[cfg(unix)]
trait AsRawFdExt {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd;
}

#[cfg(unix)]
impl AsRawFdExt for Box<dyn serialport::SerialPort> {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.as_raw_fd()
    }
}

#[cfg(unix)]
mod unix_termios {
    //! Raw termios manipulation for MDB's 9th-bit emulation via mark/space parity.
    //!
    //! `CMSPAR` (stick parity) is not exposed by `nix`'s portable `Termios` wrapper, so control
    //! flags are read and written through `tcgetattr`/`tcsetattr` with the bit twiddled directly.

    use std::io;
    use std::os::unix::io::RawFd;

    use nix::sys::termios::{self, SetArg};

    use crate::wire::ParityMode;

    /// Not exposed by `libc`/`nix` portably; value matches Linux's `asm-generic/termbits.h`.
    const CMSPAR: nix::sys::termios::ControlFlags = nix::sys::termios::ControlFlags::from_bits_truncate(0o10000000000);

    pub fn enable_parity_marking(fd: RawFd) -> io::Result<()> {
        let mut tio = termios::tcgetattr(unsafe { borrow(fd) }).map_err(to_io)?;
        tio.input_flags.insert(termios::InputFlags::INPCK);
        tio.input_flags.insert(termios::InputFlags::PARMRK);
        tio.input_flags.remove(termios::InputFlags::IGNPAR);
        tio.control_flags.insert(termios::ControlFlags::PARENB);
        tio.control_flags.remove(termios::ControlFlags::PARODD);
        termios::tcsetattr(unsafe { borrow(fd) }, SetArg::TCSANOW, &tio).map_err(to_io)
    }

    pub fn set_output_parity(fd: RawFd, mode: ParityMode) -> io::Result<()> {
        let mut tio = termios::tcgetattr(unsafe { borrow(fd) }).map_err(to_io)?;
        match mode {
            ParityMode::Space => {
                tio.control_flags.insert(termios::ControlFlags::PARENB);
                tio.control_flags.remove(termios::ControlFlags::PARODD);
                tio.control_flags.remove(CMSPAR);
            }
            ParityMode::Mark => {
                tio.control_flags.insert(termios::ControlFlags::PARENB);
                tio.control_flags.insert(termios::ControlFlags::PARODD);
                tio.control_flags.insert(CMSPAR);
            }
        }
        termios::tcsetattr(unsafe { borrow(fd) }, SetArg::TCSANOW, &tio).map_err(to_io)
    }

    fn to_io(e: nix::Error) -> io::Error {
        io::Error::from_raw_os_error(e as i32)
    }

    unsafe fn borrow(fd: RawFd) -> std::os::unix::io::BorrowedFd<'static> {
        std::os::unix::io::BorrowedFd::borrow_raw(fd)
    }
}

/// In-memory port used by tests: a pair of byte queues standing in for the inbound and outbound
/// halves of the wire. Left ungated by `cfg(test)` (rather than gated and duplicated behind a
/// feature flag) so the crate's own black-box integration tests under `tests/` can drive the
/// reader loop without a real serial device.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct MockPort {
        pub inbound: Arc<Mutex<VecDeque<u8>>>,
        pub outbound: Arc<Mutex<Vec<u8>>>,
        pub parity_log: Arc<Mutex<Vec<ParityMode>>>,
    }

    impl MockPort {
        pub fn push_inbound(&self, bytes: &[u8]) {
            self.inbound.lock().unwrap().extend(bytes.iter().copied());
        }

        pub fn take_outbound(&self) -> Vec<u8> {
            std::mem::take(&mut *self.outbound.lock().unwrap())
        }
    }

    impl MdbPort for MockPort {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            Ok(self.inbound.lock().unwrap().pop_front())
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.outbound.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        fn set_output_parity(&mut self, mode: ParityMode) -> io::Result<()> {
            self.parity_log.lock().unwrap().push(mode);
            Ok(())
        }
    }
}
