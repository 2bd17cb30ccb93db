//! The top-level handle embedding applications construct: owns the reader thread, the shared
//! state machine, and the stop flag described in §5 of the protocol design. Wiring here is
//! deliberately thin - all protocol logic lives in [`crate::state`], [`crate::frame`], and
//! [`crate::codec`]; this module only schedules it onto a thread and exposes the outbound API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::address::DeviceClass;
use crate::codec;
use crate::command::Command;
use crate::error::{ApplicationError, Error};
use crate::event::{Event, EventSink};
use crate::frame::{Frame, FrameReader};
use crate::options::PeripheralOptions;
use crate::port::{MdbPort, UnixMdbPort};
use crate::state::{CashlessStateMachine, PollOutcome, ReaderState};

/// A running cashless peripheral. Dropping this without calling [`Peripheral::stop`] leaves the
/// reader thread running in the background; it is only ever joined by an explicit `stop`.
pub struct Peripheral {
    state: Arc<Mutex<CashlessStateMachine>>,
    stop: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
}

impl Peripheral {
    /// Open `serial_path`, configure it for MDB's 9-bit emulation, and start the reader thread.
    pub fn open<S>(serial_path: &str, event_sink: S, options: PeripheralOptions) -> Result<Self, Error>
    where
        S: EventSink + 'static,
    {
        let port = UnixMdbPort::open(serial_path, options.read_timeout)?;
        Ok(Self::with_port(port, event_sink, options))
    }

    /// Construct a peripheral over any [`MdbPort`], not just a real serial device - this is how
    /// the crate's own integration tests drive the full stack against [`crate::port::mock::MockPort`].
    pub fn with_port<P, S>(port: P, event_sink: S, options: PeripheralOptions) -> Self
    where
        P: MdbPort + 'static,
        S: EventSink + 'static,
    {
        let state = Arc::new(Mutex::new(CashlessStateMachine::new(
            options.queue_capacity,
            options.reader_config,
            options.identity,
        )));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_state = Arc::clone(&state);
        let thread_stop = Arc::clone(&stop);
        let surface_bus_status = options.surface_bus_status;
        let mut port = port;
        let reader_thread = thread::Builder::new()
            .name("mdb-cashless-reader".into())
            .spawn(move || {
                run_reader_loop(&mut port, &thread_state, &thread_stop, &event_sink, surface_bus_status);
            })
            .expect("failed to spawn MDB reader thread");

        Self {
            state,
            stop,
            reader_thread: Some(reader_thread),
        }
    }

    /// Open a purchase session with a known (or unknown) balance. Only legal while the reader is
    /// `Enabled` and no session is already open.
    pub fn start_session(&self, balance_cents: Option<u32>) -> Result<(), ApplicationError> {
        self.state.lock().unwrap().start_session(balance_cents)
    }

    /// Approve the vend currently in progress. Only legal while the reader is `Vend`.
    pub fn approve_vend(&self, amount_cents: u32) -> Result<(), ApplicationError> {
        self.state.lock().unwrap().approve_vend(amount_cents)
    }

    /// Deny the vend currently in progress. Only legal while the reader is `Vend`.
    pub fn deny_vend(&self) -> Result<(), ApplicationError> {
        self.state.lock().unwrap().deny_vend()
    }

    /// Close the currently open session.
    pub fn end_session(&self) -> Result<(), ApplicationError> {
        self.state.lock().unwrap().end_session()
    }

    /// Cancel without a vend decision.
    pub fn cancel(&self) -> Result<(), ApplicationError> {
        self.state.lock().unwrap().cancel()
    }

    /// The reader's current lifecycle state, mainly useful for diagnostics and tests.
    pub fn reader_state(&self) -> ReaderState {
        self.state.lock().unwrap().reader_state()
    }

    /// Signal the reader thread to stop and wait for it to exit. The stop flag is checked once
    /// per loop iteration, so shutdown latency is bounded by the configured read timeout.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

/// The reader thread body: assemble frames, decode cashless commands, ACK immediately, and defer
/// to [`CashlessStateMachine`] for everything state-dependent. Only this loop ever calls
/// [`codec::send_packet`]/[`codec::send_status`], giving the single-writer discipline §5 demands.
fn run_reader_loop(
    port: &mut dyn MdbPort,
    state: &Arc<Mutex<CashlessStateMachine>>,
    stop: &AtomicBool,
    sink: &dyn EventSink,
    surface_bus_status: bool,
) {
    let mut reader = FrameReader::new();
    loop {
        match reader.run(port, stop) {
            Ok(None) => break,
            Ok(Some(Frame::Status(status))) => {
                if surface_bus_status {
                    sink.send_best_effort(Event::BusStatus(status));
                }
            }
            Ok(Some(Frame::Packet { address, data })) => {
                if !DeviceClass::classify(address).is_cashless() {
                    // Not ours: framed correctly (so the reader stays in sync) but never
                    // answered, per the Non-goals on coin-changer/bill-validator traffic.
                    if surface_bus_status {
                        let mut raw = vec![address];
                        raw.extend(data);
                        sink.send_best_effort(Event::Unknown(raw));
                    }
                    continue;
                }

                let scaling = state.lock().unwrap().scaling_factor();
                let command = Command::decode(address, &data, scaling);

                if matches!(command, Command::Poll) {
                    let outcome = state.lock().unwrap().poll();
                    let result = match outcome {
                        PollOutcome::Ack => codec::send_status(port, crate::wire::Status::Ack),
                        PollOutcome::Packet(bytes) => codec::send_packet(port, &bytes),
                    };
                    if let Err(e) = result {
                        terminate(sink, e);
                        break;
                    }
                } else {
                    // Every correctly-checksummed non-POLL command is ACKed immediately, whether
                    // or not it carries a queued follow-up reply (§4.F "Immediate ACK policy") and
                    // whether or not it is legal in the current state (§7 "protocol violation").
                    if let Err(e) = codec::send_status(port, crate::wire::Status::Ack) {
                        terminate(sink, e);
                        break;
                    }
                    let events = state.lock().unwrap().handle_command(command);
                    for event in events {
                        if event.is_important() {
                            sink.send_important(event);
                        } else {
                            sink.send_best_effort(event);
                        }
                    }
                }
            }
            Err(e) => {
                terminate(sink, e);
                break;
            }
        }
    }
}

fn terminate(sink: &dyn EventSink, error: std::io::Error) {
    log::error!("MDB reader thread stopping after fatal I/O error: {error}");
    sink.send_important(Event::Terminated {
        reason: error.to_string(),
    });
}
