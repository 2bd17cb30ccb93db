//! The line codec: turns a response packet into the correct sequence of parity-mode switches
//! and writes, and computes/appends the checksum.
//!
//! Responses this peripheral sends carry no address byte - the VMC already knows which device it
//! polled - so every outbound packet is: N data bytes under space parity, then one checksum byte
//! under mark parity. A bare status byte (ACK/NAK/RET) is sent as a zero-data-byte packet: it
//! occupies the same 9th-bit-high wire slot as a checksum byte.

use std::io;
use std::thread;
use std::time::Duration;

use crate::port::MdbPort;
use crate::wire::{checksum, ParityMode, Status};

/// Time to write one byte at 9600 baud, with margin. There is no portable way to learn that the
/// UART's output buffer has actually drained, so the codec sleeps this long per byte before
/// flipping parity - flipping early corrupts the in-flight frame.
const BYTE_WRITE_TIME: Duration = Duration::from_micros(1250);

/// Send a full data packet (already built, no address byte) followed by its checksum, flipping
/// to mark parity only for the checksum byte.
pub fn send_packet(port: &mut dyn MdbPort, data: &[u8]) -> io::Result<()> {
    port.set_output_parity(ParityMode::Space)?;
    port.write_bytes(data)?;
    thread::sleep(BYTE_WRITE_TIME * data.len() as u32);

    port.set_output_parity(ParityMode::Mark)?;
    port.write_bytes(&[checksum(data)])?;
    thread::sleep(BYTE_WRITE_TIME);

    port.set_output_parity(ParityMode::Space)?;
    Ok(())
}

/// Send a bare status byte (ACK/NAK/RET): no data bytes, no checksum, sent under mark parity.
pub fn send_status(port: &mut dyn MdbPort, status: Status) -> io::Result<()> {
    port.set_output_parity(ParityMode::Mark)?;
    port.write_bytes(&[status.byte()])?;
    thread::sleep(BYTE_WRITE_TIME);
    port.set_output_parity(ParityMode::Space)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;

    #[test]
    fn send_packet_appends_checksum_and_toggles_parity() {
        let mut port = MockPort::default();
        send_packet(&mut port, &[0x00, 0x00]).unwrap();
        assert_eq!(port.take_outbound(), vec![0x00, 0x00, 0x00]);
        assert_eq!(
            *port.parity_log.lock().unwrap(),
            vec![ParityMode::Space, ParityMode::Mark, ParityMode::Space]
        );
    }

    #[test]
    fn send_status_is_mark_parity_single_byte() {
        let mut port = MockPort::default();
        send_status(&mut port, Status::Ack).unwrap();
        assert_eq!(port.take_outbound(), vec![0x00]);
        assert_eq!(
            *port.parity_log.lock().unwrap(),
            vec![ParityMode::Mark, ParityMode::Space]
        );
    }
}
