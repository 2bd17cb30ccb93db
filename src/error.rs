use std::io;

/// Top level error type for the cashless peripheral.
///
/// Transient conditions (read timeouts, a single malformed frame) never reach this type -
/// they are logged and absorbed by the frame reader. Only failures that stop the peripheral,
/// or that the embedding application caused directly, surface here.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Application(#[from] ApplicationError),
}

/// Errors returned to the embedding application when it calls an outbound action that is
/// not legal in the peripheral's current reader state. These never produce wire traffic.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("start_session is only legal while the reader is enabled and idle")]
    NotEnabled,

    #[error("approve_vend/deny_vend are only legal during an active vend")]
    NotVending,
}
