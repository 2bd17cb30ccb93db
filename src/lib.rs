//! An MDB (Multi-Drop Bus) cashless-payment peripheral: attaches to a vending machine controller
//! over a 9600-baud serial line, emulates the 9-bit MDB word over an 8-bit UART via mark/space
//! parity, and answers the VMC's cashless-device command set (setup, vend, identity exchange).
//!
//! The crate is organised leaf-first, matching the data flow from wire bytes to application
//! events:
//!
//! - [`wire`] / [`port`] - raw byte-level helpers (checksum, status bytes) and the UART
//!   abstraction the rest of the crate is built against.
//! - [`codec`] - outbound parity-mode sequencing.
//! - [`frame`] - inbound resynchronisation and packet assembly.
//! - [`address`] / [`command`] - address-byte classification and command decoding.
//! - [`response`] - per-opcode wire encoders.
//! - [`state`] - the cashless reader's session state machine and send queue.
//! - [`event`] - the typed event surface delivered to the embedding application.
//! - [`identity`] / [`options`] - configuration (this peripheral's identity, reader-config bytes,
//!   queue sizing, timeouts).
//! - [`peripheral`] - the top-level handle tying a reader thread to all of the above.

pub mod address;
pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod frame;
pub mod identity;
pub mod money;
pub mod options;
pub mod peripheral;
pub mod port;
pub mod response;
pub mod state;
pub mod wire;

pub use command::Command;
pub use error::{ApplicationError, Error};
pub use event::{ChannelEventSink, Event, EventSink};
pub use identity::{Identity, ReaderConfig};
pub use money::Money;
pub use options::PeripheralOptions;
pub use peripheral::Peripheral;
pub use state::ReaderState;
