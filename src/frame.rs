//! Frame assembly: resynchronises on the `FF 00` parity-error marker the OS prepends to address
//! bytes, then collects a full packet by checksum agreement.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::port::MdbPort;
use crate::wire::{checksum, Status};

/// Longest packet (address byte + data bytes, checksum excluded) the reader will accumulate
/// before giving up and resynchronising. Prevents a stream that has lost framing from
/// concatenating forever looking for a checksum match.
const MAX_FRAME_LEN: usize = 36;

/// A fully assembled inbound unit: either a bare status byte, or an address byte plus its data
/// bytes (checksum already verified by construction - see [`FrameReader`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Status(Status),
    Packet { address: u8, data: Vec<u8> },
}

#[derive(Debug)]
enum State {
    /// Scanning the byte stream for the `FF 00` marker. `saw_ff` is true if the previous byte
    /// was `0xFF`, so the very next `0x00` completes the marker.
    ScanningForMarker { saw_ff: bool },
    /// Marker just seen; the next byte is the address byte.
    AwaitingAddress,
    /// Collecting bytes after a non-special address byte, checking for checksum agreement
    /// after each one.
    Collecting { buf: Vec<u8> },
}

/// Stateful frame assembler. Owns no I/O itself - [`FrameReader::run`] drives a caller-supplied
/// [`MdbPort`] one byte at a time so that state correctly persists across short reads and
/// read timeouts.
pub struct FrameReader {
    state: State,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self {
            state: State::ScanningForMarker { saw_ff: false },
        }
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block (subject to the port's own read timeout) until a full frame is assembled, or until
    /// `stop` is observed set, in which case `Ok(None)` is returned. The stop flag is checked
    /// once per outer loop iteration, i.e. once per port read timeout, so shutdown latency is
    /// bounded by that timeout.
    pub fn run(&mut self, port: &mut dyn MdbPort, stop: &AtomicBool) -> io::Result<Option<Frame>> {
        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match port.read_byte()? {
                None => continue,
                Some(byte) => {
                    if let Some(frame) = self.feed(byte) {
                        return Ok(Some(frame));
                    }
                }
            }
        }
    }

    /// Feed one raw byte into the state machine, returning a completed frame if this byte
    /// finished one.
    fn feed(&mut self, byte: u8) -> Option<Frame> {
        match &mut self.state {
            State::ScanningForMarker { saw_ff } => {
                if *saw_ff && byte == 0x00 {
                    self.state = State::AwaitingAddress;
                } else {
                    *saw_ff = byte == 0xFF;
                }
                None
            }
            State::AwaitingAddress => {
                if let Some(status) = Status::from_byte(byte) {
                    self.state = State::ScanningForMarker { saw_ff: false };
                    return Some(Frame::Status(status));
                }
                self.state = State::Collecting { buf: vec![byte] };
                None
            }
            State::Collecting { buf } => {
                if checksum(buf) == byte {
                    let mut buf = std::mem::take(buf);
                    let address = buf.remove(0);
                    self.state = State::ScanningForMarker { saw_ff: false };
                    return Some(Frame::Packet { address, data: buf });
                }
                buf.push(byte);
                if buf.len() > MAX_FRAME_LEN {
                    log::warn!("frame exceeded {MAX_FRAME_LEN} bytes without a checksum match, resynchronising");
                    self.state = State::ScanningForMarker { saw_ff: false };
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;

    fn run_bytes(bytes: &[u8]) -> Option<Frame> {
        let mut port = MockPort::default();
        port.push_inbound(bytes);
        let mut reader = FrameReader::new();
        // Reading drains the mock queue; once exhausted read_byte returns None forever, so we
        // stop once we expect no further progress is possible.
        loop {
            match reader.feed_next(&mut port) {
                Some(frame) => return Some(frame),
                None => {
                    if port.inbound.lock().unwrap().is_empty() {
                        return None;
                    }
                }
            }
        }
    }

    impl FrameReader {
        fn feed_next(&mut self, port: &mut MockPort) -> Option<Frame> {
            match port.inbound.lock().unwrap().pop_front() {
                Some(b) => self.feed(b),
                None => None,
            }
        }
    }

    #[test]
    fn assembles_reset_packet() {
        let frame = run_bytes(&[0xFF, 0x00, 0x10, 0x10]).unwrap();
        assert_eq!(
            frame,
            Frame::Packet {
                address: 0x10,
                data: vec![]
            }
        );
    }

    #[test]
    fn recognises_status_bytes() {
        assert_eq!(run_bytes(&[0xFF, 0x00, 0x00]), Some(Frame::Status(Status::Ack)));
        assert_eq!(run_bytes(&[0xFF, 0x00, 0xAA]), Some(Frame::Status(Status::Ret)));
    }

    #[test]
    fn discards_overlong_frame_and_resyncs() {
        let mut bytes = vec![0xFF, 0x00, 0x11];
        bytes.extend(std::iter::repeat(0x01).take(40));
        bytes.extend([0xFF, 0x00, 0x10, 0x10]);
        let frame = run_bytes(&bytes).unwrap();
        assert_eq!(
            frame,
            Frame::Packet {
                address: 0x10,
                data: vec![]
            }
        );
    }

    #[test]
    fn accepts_exactly_36_bytes() {
        let data = vec![0x01u8; 35];
        let mut buf = vec![0x11];
        buf.extend(&data);
        let chk = checksum(&buf);
        let mut bytes = vec![0xFF, 0x00];
        bytes.extend(&buf);
        bytes.push(chk);
        let frame = run_bytes(&bytes).unwrap();
        assert_eq!(
            frame,
            Frame::Packet {
                address: 0x11,
                data
            }
        );
    }

    #[test]
    fn payload_containing_ff_00_does_not_cause_false_resync() {
        let buf = vec![0x11u8, 0xFF, 0x00, 0x02];
        let chk = checksum(&buf);
        let mut bytes = vec![0xFF, 0x00];
        bytes.extend(&buf);
        bytes.push(chk);
        let frame = run_bytes(&bytes).unwrap();
        assert_eq!(
            frame,
            Frame::Packet {
                address: 0x11,
                data: vec![0xFF, 0x00, 0x02]
            }
        );
    }
}
