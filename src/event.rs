//! Typed events delivered from the peripheral to the embedding application - the outbound half
//! of the event surface. One variant per decoded command of interest (see [`crate::command`]),
//! plus a handful the protocol layer raises itself (protocol violations, bus status bytes,
//! fatal termination).

use crate::command::{ExpansionOpcode, Identity as VmcIdentity};
use crate::money::Money;
use crate::state::ReaderState;
use crate::wire::Status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SetupConfigData {
        feature_level: u8,
        display_columns: u8,
        display_rows: u8,
        display_type: u8,
    },
    SetupPriceData {
        max_price: Money,
        min_price: Money,
    },
    VendRequest {
        item_price: Money,
        item_number: Option<u16>,
    },
    VendCancel,
    VendSuccess {
        item_number: Option<u16>,
    },
    VendFailure,
    VendSessionComplete,
    CashSale {
        item_price: Money,
        item_number: Option<u16>,
    },
    NegativeVendRequest,
    ReaderEnable,
    ReaderDisable,
    ReaderCancel,
    DataEntryResponse,
    RevalueRequest,
    RevalueLimitRequest,
    ExpansionRequestId(VmcIdentity),
    ExpansionOther(ExpansionOpcode),
    /// A packet the command decoder couldn't match to any table entry; the raw bytes are kept
    /// for logging, never dropped silently.
    Unknown(Vec<u8>),
    /// A bare status byte (ACK/NAK/RET) observed on the wire, or traffic addressed to a device
    /// class other than cashless. Suppressed unless [`crate::options::PeripheralOptions::surface_bus_status`]
    /// is set.
    BusStatus(Status),
    /// A command arrived that is not legal in the reader's current state (§7 "protocol
    /// violation"). The peripheral still ACKed it on the wire; this is purely informational.
    ProtocolWarning { command: &'static str, state: ReaderState },
    /// The reader thread has stopped for good, normally due to a fatal I/O error.
    Terminated { reason: String },
}

impl Event {
    /// Events that must never be dropped for backpressure, per §4.G: vend and setup traffic
    /// carries a decision or configuration the application cannot afford to miss. Everything
    /// else (bare opcode observations, protocol warnings, bus status) is best-effort.
    pub fn is_important(&self) -> bool {
        matches!(
            self,
            Event::VendRequest { .. }
                | Event::VendSuccess { .. }
                | Event::VendFailure
                | Event::VendSessionComplete
                | Event::SetupConfigData { .. }
                | Event::SetupPriceData { .. }
                | Event::Terminated { .. }
        )
    }
}

/// Seam the peripheral delivers events through, so the embedding application can substitute any
/// channel-like type in place of the `crossbeam_channel`-backed [`ChannelEventSink`].
pub trait EventSink: Send {
    /// Deliver an event that must not be dropped. Implementations should block rather than lose
    /// it - this is only ever called for events [`Event::is_important`] marks as such.
    fn send_important(&self, event: Event);

    /// Deliver an event that may be dropped under backpressure; implementations should prefer
    /// dropping the event (and logging) over blocking the reader thread.
    fn send_best_effort(&self, event: Event);
}

/// Default [`EventSink`], backed by a bounded `crossbeam_channel`. Important events use a
/// blocking send; best-effort events use a non-blocking send and are dropped (with a logged
/// warning) if the channel is full.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: crossbeam_channel::Sender<Event>,
}

impl ChannelEventSink {
    /// Create a sink/receiver pair backed by a channel bounded at `capacity`.
    pub fn new(capacity: usize) -> (Self, crossbeam_channel::Receiver<Event>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send_important(&self, event: Event) {
        if self.tx.send(event).is_err() {
            log::warn!("event sink disconnected; important event dropped");
        }
    }

    fn send_best_effort(&self, event: Event) {
        if let Err(crossbeam_channel::TrySendError::Full(dropped)) = self.tx.try_send(event) {
            log::warn!("event channel full; dropping best-effort event {dropped:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn important_events_are_the_ones_listed_in_the_backpressure_contract() {
        assert!(Event::VendFailure.is_important());
        assert!(Event::SetupPriceData {
            max_price: Money::new(0, 1),
            min_price: Money::new(0, 1)
        }
        .is_important());
        assert!(!Event::ReaderCancel.is_important());
        assert!(!Event::Unknown(vec![]).is_important());
    }

    #[test]
    fn best_effort_send_drops_silently_when_channel_is_full() {
        let (sink, rx) = ChannelEventSink::new(1);
        sink.send_best_effort(Event::ReaderCancel);
        sink.send_best_effort(Event::ReaderDisable); // channel full: dropped, not blocked
        assert_eq!(rx.try_recv(), Ok(Event::ReaderCancel));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn important_send_blocks_until_room_exists() {
        let (sink, rx) = ChannelEventSink::new(1);
        sink.send_important(Event::VendFailure);
        assert_eq!(rx.try_recv(), Ok(Event::VendFailure));
    }
}
