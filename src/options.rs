//! Construction-time configuration for a [`crate::peripheral::Peripheral`]: everything that used
//! to be hard-coded in protocol logic now lives here with a `Default` reproducing the historical
//! values (see [`crate::identity`]).

use std::time::Duration;

use crate::identity::{Identity, ReaderConfig};

#[derive(Debug, Clone)]
pub struct PeripheralOptions {
    pub baud_rate: u32,
    /// How long a single UART read blocks before returning "nothing arrived". Keep this short so
    /// `stop()` has low latency - the reader thread only checks for a stop request between reads.
    pub read_timeout: Duration,
    /// Maximum number of pre-encoded responses the send queue holds before dropping the oldest.
    pub queue_capacity: usize,
    pub reader_config: ReaderConfig,
    pub identity: Identity,
    /// Surface bare bus status bytes (ACK/NAK/RET) and non-cashless traffic as [`crate::event::Event::BusStatus`].
    /// Off by default: this traffic is frequent and rarely useful to the embedding application.
    pub surface_bus_status: bool,
}

impl Default for PeripheralOptions {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout: Duration::from_millis(10),
            queue_capacity: 8,
            reader_config: ReaderConfig::default(),
            identity: Identity::default(),
            surface_bus_status: false,
        }
    }
}
