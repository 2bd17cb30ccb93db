//! The cashless reader's session state machine: the single owner of both the reader's current
//! state and the outbound send queue (see the module doc on why these two live together rather
//! than behind separate locks - a POLL dequeue and the state change it implies must happen
//! atomically, or an application call racing the reader thread could see a queued response with
//! the wrong state already applied).

use std::collections::VecDeque;

use crate::command::Command;
use crate::error::ApplicationError;
use crate::event::Event;
use crate::identity::{Identity, ReaderConfig};
use crate::money::Money;
use crate::response;

/// Where the reader sits in the MDB cashless lifecycle. `VEND`'s "idle" moment - after a decision
/// has been queued but before the VMC's own VEND_SUCCESS/VEND_FAILURE/VEND_SESSION_COMPLETE
/// closes the loop - is not a distinct variant: nothing in the transition table needs to tell it
/// apart from plain `Enabled`, so collapsing it removes a state every match arm would otherwise
/// have to thread through for no behavioural benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Inactive,
    Disabled,
    Enabled,
    Vend,
}

/// What a POLL should produce, decided entirely by [`CashlessStateMachine::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ack,
    Packet(Vec<u8>),
}

/// Owns reader state, the bounded send queue, and this peripheral's configured identity/reader
/// config. One instance per cashless address, guarded by a single mutex in [`crate::peripheral`].
pub struct CashlessStateMachine {
    state: ReaderState,
    queue: VecDeque<Vec<u8>>,
    capacity: usize,
    session_open: bool,
    reader_config: ReaderConfig,
    identity: Identity,
}

impl CashlessStateMachine {
    pub fn new(capacity: usize, reader_config: ReaderConfig, identity: Identity) -> Self {
        Self {
            state: ReaderState::Inactive,
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            session_open: false,
            reader_config,
            identity,
        }
    }

    pub fn reader_state(&self) -> ReaderState {
        self.state
    }

    pub fn scaling_factor(&self) -> u8 {
        self.reader_config.scale_factor
    }

    fn enqueue(&mut self, packet: Vec<u8>) {
        if self.queue.len() >= self.capacity {
            log::warn!(
                "send queue at capacity ({}), dropping oldest queued response to make room",
                self.capacity
            );
            self.queue.pop_front();
        }
        self.queue.push_back(packet);
    }

    fn protocol_warning(&self, command: &'static str) -> Event {
        log::warn!(
            "{command} received while reader state is {:?}; ACKing on the wire but ignoring it otherwise",
            self.state
        );
        Event::ProtocolWarning {
            command,
            state: self.state,
        }
    }

    /// Called only by the reader thread in direct response to a POLL. The only point at which
    /// the peripheral may say anything other than a bare ACK.
    pub fn poll(&mut self) -> PollOutcome {
        match self.state {
            ReaderState::Inactive => {
                self.state = ReaderState::Disabled;
                PollOutcome::Packet(response::just_reset())
            }
            _ => match self.queue.pop_front() {
                Some(packet) => PollOutcome::Packet(packet),
                None => PollOutcome::Ack,
            },
        }
    }

    /// Process a decoded inbound command (never [`Command::Poll`], which [`poll`](Self::poll)
    /// handles directly). Returns the events the command should surface to the application; the
    /// caller has already ACKed the command on the wire before this runs.
    pub fn handle_command(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        match command {
            Command::Reset => {
                self.state = ReaderState::Inactive;
                self.queue.clear();
                self.session_open = false;
            }
            Command::Poll => unreachable!("POLL is handled by CashlessStateMachine::poll"),
            Command::SetupConfigData {
                feature_level,
                display_columns,
                display_rows,
                display_type,
            } => {
                events.push(Event::SetupConfigData {
                    feature_level,
                    display_columns,
                    display_rows,
                    display_type,
                });
                if self.state == ReaderState::Disabled {
                    self.enqueue(response::reader_config_data(&self.reader_config));
                } else {
                    events.push(self.protocol_warning("SETUP_CONFIG_DATA"));
                }
            }
            Command::SetupPriceData { max_price, min_price } => {
                events.push(Event::SetupPriceData { max_price, min_price });
                if self.state != ReaderState::Disabled {
                    events.push(self.protocol_warning("SETUP_PRICE_DATA"));
                }
            }
            Command::VendRequest { item_price, item_number } => {
                events.push(Event::VendRequest { item_price, item_number });
                if self.state == ReaderState::Enabled {
                    self.state = ReaderState::Vend;
                } else {
                    events.push(self.protocol_warning("VEND_REQUEST"));
                }
            }
            Command::VendCancel => {
                events.push(Event::VendCancel);
                if self.state == ReaderState::Vend {
                    self.state = ReaderState::Enabled;
                } else {
                    events.push(self.protocol_warning("VEND_CANCEL"));
                }
            }
            Command::VendSuccess { item_number } => {
                events.push(Event::VendSuccess { item_number });
                if self.state == ReaderState::Vend {
                    self.state = ReaderState::Enabled;
                } else {
                    events.push(self.protocol_warning("VEND_SUCCESS"));
                }
            }
            Command::VendFailure => {
                events.push(Event::VendFailure);
                if self.state == ReaderState::Vend {
                    self.state = ReaderState::Enabled;
                } else {
                    events.push(self.protocol_warning("VEND_FAILURE"));
                }
            }
            Command::VendSessionComplete => {
                events.push(Event::VendSessionComplete);
                if matches!(self.state, ReaderState::Vend | ReaderState::Enabled) {
                    self.enqueue(response::end_session());
                    self.state = ReaderState::Enabled;
                    self.session_open = false;
                } else {
                    events.push(self.protocol_warning("VEND_SESSION_COMPLETE"));
                }
            }
            Command::CashSale { item_price, item_number } => {
                events.push(Event::CashSale { item_price, item_number });
            }
            Command::NegativeVendRequest => events.push(Event::NegativeVendRequest),
            Command::ReaderDisable => {
                events.push(Event::ReaderDisable);
                if self.state == ReaderState::Enabled {
                    self.state = ReaderState::Disabled;
                    self.session_open = false;
                } else {
                    events.push(self.protocol_warning("READER_DISABLE"));
                }
            }
            Command::ReaderEnable => {
                events.push(Event::ReaderEnable);
                if self.state == ReaderState::Disabled {
                    self.state = ReaderState::Enabled;
                } else {
                    events.push(self.protocol_warning("READER_ENABLE"));
                }
            }
            Command::ReaderCancel => {
                events.push(Event::ReaderCancel);
                if self.state == ReaderState::Enabled {
                    self.enqueue(response::cancelled());
                } else {
                    events.push(self.protocol_warning("READER_CANCEL"));
                }
            }
            Command::DataEntryResponse => events.push(Event::DataEntryResponse),
            Command::RevalueRequest => events.push(Event::RevalueRequest),
            Command::RevalueLimitRequest => events.push(Event::RevalueLimitRequest),
            Command::ExpansionRequestId(identity) => {
                events.push(Event::ExpansionRequestId(identity));
                self.enqueue(response::peripheral_id(&self.identity));
            }
            Command::ExpansionOther(opcode) => events.push(Event::ExpansionOther(opcode)),
            Command::Unknown(bytes) => events.push(Event::Unknown(bytes)),
        }
        events
    }

    /// `start_session` is only legal once the reader is enabled and not already mid-session or
    /// mid-vend; it queues BEGIN_SESSION with the given balance (or "unknown" if none is known).
    pub fn start_session(&mut self, balance_cents: Option<u32>) -> Result<(), ApplicationError> {
        if self.state != ReaderState::Enabled || self.session_open {
            return Err(ApplicationError::NotEnabled);
        }
        self.session_open = true;
        let scale = self.scaling_factor();
        let balance = match balance_cents {
            Some(cents) => Money::new(cents, scale),
            None => Money::unknown(scale),
        };
        self.enqueue(response::begin_session(balance));
        Ok(())
    }

    /// Approve the vend currently in progress, queueing APPROVE_VEND and returning the reader to
    /// `Enabled`.
    pub fn approve_vend(&mut self, amount_cents: u32) -> Result<(), ApplicationError> {
        if self.state != ReaderState::Vend {
            return Err(ApplicationError::NotVending);
        }
        let scale = self.scaling_factor();
        self.enqueue(response::approve_vend(Money::new(amount_cents, scale)));
        self.state = ReaderState::Enabled;
        Ok(())
    }

    /// Deny the vend currently in progress (or refuse to open a session at all), queueing
    /// DENY_VEND and returning the reader to `Enabled`.
    pub fn deny_vend(&mut self) -> Result<(), ApplicationError> {
        if self.state != ReaderState::Vend {
            return Err(ApplicationError::NotVending);
        }
        self.enqueue(response::deny_vend());
        self.state = ReaderState::Enabled;
        Ok(())
    }

    /// Application-initiated close of the currently open session, queueing END_SESSION.
    pub fn end_session(&mut self) -> Result<(), ApplicationError> {
        if self.state != ReaderState::Enabled || !self.session_open {
            return Err(ApplicationError::NotEnabled);
        }
        self.session_open = false;
        self.enqueue(response::end_session());
        Ok(())
    }

    /// Application-initiated cancellation, queueing CANCELLED without closing the reader itself.
    pub fn cancel(&mut self) -> Result<(), ApplicationError> {
        if self.state != ReaderState::Enabled {
            return Err(ApplicationError::NotEnabled);
        }
        self.session_open = false;
        self.enqueue(response::cancelled());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> CashlessStateMachine {
        CashlessStateMachine::new(8, ReaderConfig::default(), Identity::default())
    }

    #[test]
    fn poll_from_inactive_emits_just_reset_and_moves_to_disabled() {
        let mut sm = machine();
        assert_eq!(sm.poll(), PollOutcome::Packet(response::just_reset()));
        assert_eq!(sm.reader_state(), ReaderState::Disabled);
    }

    #[test]
    fn poll_with_empty_queue_acks() {
        let mut sm = machine();
        sm.poll(); // -> DISABLED
        assert_eq!(sm.poll(), PollOutcome::Ack);
    }

    #[test]
    fn reset_clears_queue_and_returns_to_inactive_from_any_state() {
        let mut sm = machine();
        sm.poll(); // DISABLED
        sm.handle_command(Command::ReaderEnable); // ENABLED
        sm.start_session(Some(100)).unwrap(); // queues BEGIN_SESSION
        sm.handle_command(Command::Reset);
        assert_eq!(sm.reader_state(), ReaderState::Inactive);
        assert_eq!(sm.poll(), PollOutcome::Packet(response::just_reset()));
    }

    #[test]
    fn setup_config_in_disabled_queues_reader_config_data() {
        let mut sm = machine();
        sm.poll(); // DISABLED
        let events = sm.handle_command(Command::SetupConfigData {
            feature_level: 1,
            display_columns: 20,
            display_rows: 2,
            display_type: 1,
        });
        assert_eq!(events.len(), 1);
        assert_eq!(sm.poll(), PollOutcome::Packet(response::reader_config_data(&ReaderConfig::default())));
    }

    #[test]
    fn vend_request_moves_to_vend_and_approve_returns_to_enabled() {
        let mut sm = machine();
        sm.poll();
        sm.handle_command(Command::ReaderEnable);
        sm.handle_command(Command::VendRequest {
            item_price: Money::new(10, 1),
            item_number: Some(1),
        });
        assert_eq!(sm.reader_state(), ReaderState::Vend);
        sm.approve_vend(10).unwrap();
        assert_eq!(sm.reader_state(), ReaderState::Enabled);
        assert_eq!(sm.poll(), PollOutcome::Packet(response::approve_vend(Money::new(10, 1))));
    }

    #[test]
    fn approve_vend_outside_vend_state_is_refused() {
        let mut sm = machine();
        assert_eq!(sm.approve_vend(10), Err(ApplicationError::NotVending));
    }

    #[test]
    fn protocol_violation_still_acks_and_does_not_change_state() {
        let mut sm = machine();
        // VEND_REQUEST while still INACTIVE: illegal, but handle_command never touches the wire
        // itself (the reader thread always ACKs first) - it only needs to avoid a bogus
        // transition and surface a warning.
        let events = sm.handle_command(Command::VendRequest {
            item_price: Money::new(10, 1),
            item_number: None,
        });
        assert_eq!(sm.reader_state(), ReaderState::Inactive);
        assert!(events.iter().any(|e| matches!(e, Event::ProtocolWarning { .. })));
    }

    #[test]
    fn queue_drops_oldest_on_overflow() {
        let mut sm = CashlessStateMachine::new(1, ReaderConfig::default(), Identity::default());
        sm.poll(); // INACTIVE -> DISABLED
        sm.handle_command(Command::SetupConfigData {
            feature_level: 1,
            display_columns: 20,
            display_rows: 2,
            display_type: 1,
        });
        // Queued above with capacity 1; this second SETUP should evict it before it is ever sent.
        sm.handle_command(Command::SetupConfigData {
            feature_level: 2,
            display_columns: 16,
            display_rows: 4,
            display_type: 0,
        });
        assert_eq!(
            sm.poll(),
            PollOutcome::Packet(response::reader_config_data(&ReaderConfig {
                feature_level: 2,
                ..ReaderConfig::default()
            }))
        );
        // Queue now empty: nothing left to drain.
        assert_eq!(sm.poll(), PollOutcome::Ack);
    }
}
