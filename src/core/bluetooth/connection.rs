//! Bluetooth connection handling for the train hub
//! This module owns the link lifecycle: connecting with retry, the outbound
//! frame path, the inbound notification pump, and disconnect.

use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device};
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{
    CONNECT_ATTEMPT_TIMEOUT_SECS, CONNECT_RETRY_DELAY_MS, MAX_CONNECT_RETRIES,
    NOTIFICATION_QUEUE_CAPACITY, UUID_TRAIN_NOTIFY_CHAR, UUID_TRAIN_SERVICE,
    UUID_TRAIN_WRITE_CHAR,
};
use crate::core::protocol::Frame;
use crate::error::{ConnectError, WriteError};

/// Lifecycle state of the link to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Outbound frame seam between the session and the transport.
///
/// The session drives the link entirely through this trait, so tests can
/// swap the radio for a recording mock.
#[async_trait]
pub trait FrameSender: Send {
    /// Writes one frame as a single GATT write; frames are never split or
    /// batched.
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError>;

    /// Tears the dead link down and dials the same device once more.
    async fn reconnect(&mut self) -> Result<(), ConnectError>;

    /// Releases the link. Idempotent; inner errors are logged, not returned.
    async fn disconnect(&mut self);
}

/// An open link to a train hub.
pub struct TrainConnection {
    adapter: Adapter,
    device: Device,
    write_char: Characteristic,
    notify_tx: mpsc::Sender<Vec<u8>>,
    pump_cancel: CancellationToken,
    state: ConnectionState,
}

impl TrainConnection {
    /// Connects to a previously discovered hub and returns the link together
    /// with the receiving end of the notification queue.
    ///
    /// Each attempt is bounded by [`CONNECT_ATTEMPT_TIMEOUT_SECS`] and
    /// retried up to [`MAX_CONNECT_RETRIES`] times before the error is
    /// returned.
    pub async fn connect(
        adapter: Adapter,
        device: Device,
    ) -> Result<(Self, mpsc::Receiver<Vec<u8>>), ConnectError> {
        info!("Connecting to train hub {}", device.id());
        let (write_char, notify_char) = connect_with_retry(&adapter, &device).await?;

        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
        let pump_cancel = CancellationToken::new();
        spawn_notification_pump(notify_char, notify_tx.clone(), pump_cancel.clone());

        let connection = TrainConnection {
            adapter,
            device,
            write_char,
            notify_tx,
            pump_cancel,
            state: ConnectionState::Connected,
        };
        Ok((connection, notify_rx))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

#[async_trait]
impl FrameSender for TrainConnection {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError> {
        if self.state != ConnectionState::Connected {
            return Err(WriteError::Closed);
        }
        debug!("Writing frame: {:02x?}", frame.as_bytes());
        if let Err(e) = self.write_char.write(frame.as_bytes()).await {
            self.state = ConnectionState::Failed;
            return Err(WriteError::Bluetooth(e));
        }
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), ConnectError> {
        info!("Re-establishing connection to {}", self.device.id());
        self.state = ConnectionState::Connecting;
        self.pump_cancel.cancel();

        // Drop whatever is left of the dead link before dialing again.
        if self.device.is_connected().await {
            if let Err(e) = self.adapter.disconnect_device(&self.device).await {
                debug!("Cleanup disconnect before redial failed: {}", e);
            }
        }

        let attempt_timeout = Duration::from_secs(CONNECT_ATTEMPT_TIMEOUT_SECS);
        let dialed = tokio::time::timeout(attempt_timeout, try_connect(&self.adapter, &self.device))
            .await
            .unwrap_or(Err(ConnectError::Timeout(attempt_timeout)));
        match dialed {
            Ok((write_char, notify_char)) => {
                self.write_char = write_char;
                self.pump_cancel = CancellationToken::new();
                spawn_notification_pump(
                    notify_char,
                    self.notify_tx.clone(),
                    self.pump_cancel.clone(),
                );
                self.state = ConnectionState::Connected;
                info!("Reconnected to {}", self.device.id());
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            debug!("Already disconnected from {}", self.device.id());
            return;
        }
        self.pump_cancel.cancel();
        if self.device.is_connected().await {
            info!("Disconnecting from hub {}", self.device.id());
            if let Err(e) = self.adapter.disconnect_device(&self.device).await {
                warn!("Disconnect from {} failed: {}", self.device.id(), e);
            }
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for TrainConnection {
    fn drop(&mut self) {
        self.pump_cancel.cancel();
    }
}

/// Connect and discover with the standard retry schedule.
async fn connect_with_retry(
    adapter: &Adapter,
    device: &Device,
) -> Result<(Characteristic, Characteristic), ConnectError> {
    let attempt_timeout = Duration::from_secs(CONNECT_ATTEMPT_TIMEOUT_SECS);
    let mut last_error = None;

    for attempt in 1..=MAX_CONNECT_RETRIES {
        let result = tokio::time::timeout(attempt_timeout, try_connect(adapter, device))
            .await
            .unwrap_or(Err(ConnectError::Timeout(attempt_timeout)));
        match result {
            Ok(chars) => {
                info!("Successfully connected to hub");
                return Ok(chars);
            }
            Err(e) => {
                warn!("Connection attempt {} failed: {}", attempt, e);
                last_error = Some(e);

                if attempt < MAX_CONNECT_RETRIES {
                    info!("Retrying connection in {} ms...", CONNECT_RETRY_DELAY_MS);
                    tokio::time::sleep(Duration::from_millis(CONNECT_RETRY_DELAY_MS)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or(ConnectError::Timeout(attempt_timeout)))
}

/// A single connection attempt: dial, then locate the control service and
/// its write and notify characteristics.
async fn try_connect(
    adapter: &Adapter,
    device: &Device,
) -> Result<(Characteristic, Characteristic), ConnectError> {
    if !device.is_connected().await {
        adapter.connect_device(device).await?;
    }

    info!("Connection established, discovering services...");
    let services = device.services().await?;
    let control_service = services
        .iter()
        .find(|s| s.uuid() == UUID_TRAIN_SERVICE)
        .ok_or_else(|| {
            for service in &services {
                debug!("Available service: {}", service.uuid());
            }
            ConnectError::ServiceNotFound(UUID_TRAIN_SERVICE)
        })?
        .clone();

    let mut write_char = None;
    let mut notify_char = None;
    for characteristic in control_service.characteristics().await? {
        let uuid = characteristic.uuid();
        if uuid == UUID_TRAIN_WRITE_CHAR {
            debug!("Found write characteristic: {}", uuid);
            write_char = Some(characteristic);
        } else if uuid == UUID_TRAIN_NOTIFY_CHAR {
            debug!("Found notify characteristic: {}", uuid);
            notify_char = Some(characteristic);
        }
    }

    let write_char =
        write_char.ok_or(ConnectError::CharacteristicNotFound(UUID_TRAIN_WRITE_CHAR))?;
    let notify_char =
        notify_char.ok_or(ConnectError::CharacteristicNotFound(UUID_TRAIN_NOTIFY_CHAR))?;
    Ok((write_char, notify_char))
}

/// Forwards raw notification buffers into the bounded session queue until
/// cancelled or the stream ends. A slow session must never stall the radio,
/// so a full queue drops the frame.
fn spawn_notification_pump(
    notify_char: Characteristic,
    queue: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut stream = match notify_char.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to subscribe to notifications: {}", e);
                return;
            }
        };
        debug!("Notification pump running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Notification pump stopped");
                    break;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(bytes)) => match queue.try_send(bytes) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                warn!("Notification queue full, dropping frame");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        },
                        Some(Err(e)) => warn!("Notification stream error: {}", e),
                        None => {
                            info!("Notification stream ended");
                            break;
                        }
                    }
                }
            }
        }
    });
}
