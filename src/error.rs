//! Error taxonomy for the controller
//! Scan and connect failures are fatal to a run; write failures get one
//! recovery attempt before they are. Decode problems never reach here,
//! they are logged and dropped where they occur.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Failures while looking for a hub.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No Bluetooth adapter is present or powered on.
    #[error("no usable Bluetooth adapter on this host")]
    NoAdapter,

    /// The scan window closed without a single matching advertisement.
    #[error("no train hub found; make sure the hub is powered on and in pairing mode")]
    NoDevices,

    #[error("bluetooth error while scanning: {0}")]
    Bluetooth(#[from] bluest::Error),
}

/// Failures while establishing or re-establishing a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A single connection attempt exceeded its deadline.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The device connected but does not expose the train control service.
    #[error("device does not expose control service {0}")]
    ServiceNotFound(Uuid),

    /// The control service is missing the write or notify characteristic.
    #[error("control service is missing characteristic {0}")]
    CharacteristicNotFound(Uuid),

    #[error("bluetooth error while connecting: {0}")]
    Bluetooth(#[from] bluest::Error),
}

/// Failures on the outbound frame path.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The link is not in the connected state.
    #[error("connection is closed")]
    Closed,

    #[error("bluetooth error while writing: {0}")]
    Bluetooth(#[from] bluest::Error),

    /// The single permitted reconnect after a failed write also failed.
    #[error("reconnect after a failed write did not succeed: {0}")]
    ReconnectFailed(#[source] ConnectError),
}

/// Top-level failure of a controller run, tagged with the phase it died in.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("session ended by write failure: {0}")]
    Write(#[from] WriteError),

    /// The interactive terminal could not be set up or read.
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

impl RunError {
    /// Process exit code reported for this failure; zero is reserved for a
    /// clean quit.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Scan(_) => 1,
            RunError::Connect(_) => 2,
            RunError::Write(_) => 3,
            RunError::Terminal(_) => 4,
        }
    }
}
