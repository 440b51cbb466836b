//! Interactive control session
//! This module owns the session state machine: each keystroke event becomes
//! at most one outbound frame, inbound notifications fold into telemetry,
//! and a single event loop serializes every state change.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::core::bluetooth::{FrameSender, STARTUP_FRAME_DELAY_MS};
use crate::core::protocol::{
    self, Command, Direction, Frame, LIGHT_PALETTE_SIZE, NotificationEvent, PORT_HUB,
    PORT_VOLTAGE, SOUND_COUNT, Speed,
};
use crate::error::WriteError;

/// One operator intention, decoded from a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Run the motor in a direction at a speed
    Drive { direction: Direction, speed: Speed },
    /// Brake the motor
    Stop,
    /// Play speaker effect 1..=SOUND_COUNT
    Sound(u8),
    /// Advance the ring light to the next palette color
    CycleColor,
    /// Brake if moving, disconnect, and end the session
    Quit,
}

impl InputEvent {
    /// Resolves an action name from the key binding config. Unknown names
    /// and out-of-range sound numbers return `None`.
    pub fn from_action_name(name: &str) -> Option<Self> {
        match name {
            "forward-slow" => Some(InputEvent::Drive {
                direction: Direction::Forward,
                speed: Speed::Slow,
            }),
            "forward-fast" => Some(InputEvent::Drive {
                direction: Direction::Forward,
                speed: Speed::Fast,
            }),
            "backward-slow" => Some(InputEvent::Drive {
                direction: Direction::Backward,
                speed: Speed::Slow,
            }),
            "backward-fast" => Some(InputEvent::Drive {
                direction: Direction::Backward,
                speed: Speed::Fast,
            }),
            "stop" => Some(InputEvent::Stop),
            "color-cycle" => Some(InputEvent::CycleColor),
            "quit" => Some(InputEvent::Quit),
            _ => name
                .strip_prefix("sound-")
                .and_then(|n| n.parse().ok())
                .filter(|n| (1..=SOUND_COUNT).contains(n))
                .map(InputEvent::Sound),
        }
    }
}

/// Motion the hub is currently commanded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Moving { direction: Direction, speed: Speed },
}

/// Everything the session remembers between events. Telemetry fields are
/// only ever written by [`ControlSession::handle_notification`]; command
/// fields only by [`ControlSession::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub motion: MotionState,
    pub color_index: u8,
    pub last_sound: Option<u8>,
    pub battery_millivolts: Option<u16>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            motion: MotionState::Idle,
            color_index: 0,
            last_sound: None,
            battery_millivolts: None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the event loop should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The interactive session: owns the link and all mutable state.
pub struct ControlSession<S: FrameSender> {
    link: S,
    state: SessionState,
    write_retry_delay: Duration,
}

impl<S: FrameSender> ControlSession<S> {
    pub fn new(link: S, write_retry_delay: Duration) -> Self {
        Self {
            link,
            state: SessionState::new(),
            write_retry_delay,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Asks the hub to push button and voltage updates. The hub stays
    /// silent until these setup frames arrive.
    pub async fn initialize(&mut self) -> Result<(), WriteError> {
        info!("Subscribing to hub telemetry...");
        for port in [PORT_HUB, PORT_VOLTAGE] {
            self.transmit(protocol::subscription_frame(port)).await?;
            sleep(Duration::from_millis(STARTUP_FRAME_DELAY_MS)).await;
        }
        Ok(())
    }

    /// Handles one operator intention: writes at most one frame, then
    /// updates the state. Re-dispatching the same event re-sends the frame
    /// and leaves the state as it was.
    pub async fn dispatch(&mut self, event: InputEvent) -> Result<Flow, WriteError> {
        match event {
            InputEvent::Drive { direction, speed } => {
                self.transmit(Command::Motor { direction, speed }.encode())
                    .await?;
                self.state.motion = MotionState::Moving { direction, speed };
                info!("Driving {:?} at {:?} speed", direction, speed);
            }
            InputEvent::Stop => {
                self.transmit(Command::Stop.encode()).await?;
                self.state.motion = MotionState::Idle;
                info!("Stopped");
            }
            InputEvent::Sound(sound_index) => {
                self.transmit(Command::Sound { sound_index }.encode()).await?;
                self.state.last_sound = Some(sound_index);
                info!("Playing sound {}", sound_index);
            }
            InputEvent::CycleColor => {
                let next = (self.state.color_index + 1) % LIGHT_PALETTE_SIZE;
                self.transmit(Command::Light { color_index: next }.encode())
                    .await?;
                self.state.color_index = next;
                info!("Ring light color {}", next);
            }
            InputEvent::Quit => {
                // Leave the motor braked; losing this frame on the way out
                // is acceptable, so no recovery attempt here.
                if self.state.motion != MotionState::Idle {
                    if let Err(e) = self.link.send_frame(&Command::Stop.encode()).await {
                        warn!("Could not brake before quitting: {}", e);
                    }
                    self.state.motion = MotionState::Idle;
                }
                self.link.disconnect().await;
                info!("Session closed");
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Folds one raw notification buffer into telemetry. Undecodable
    /// buffers are logged and dropped; they never interrupt the session and
    /// never touch the command side of the state.
    pub fn handle_notification(&mut self, bytes: &[u8]) {
        match protocol::decode(bytes) {
            Ok(NotificationEvent::Voltage { millivolts }) => {
                self.state.battery_millivolts = Some(millivolts);
                debug!("Battery at {:.2} V", f64::from(millivolts) / 1000.0);
            }
            Ok(NotificationEvent::Button { pressed }) => {
                info!("Hub button {}", if pressed { "pressed" } else { "released" });
            }
            Ok(NotificationEvent::Unrecognized { message_type, port }) => {
                debug!(
                    "Ignoring notification type {:#04x} on port {:#04x}",
                    message_type, port
                );
            }
            Err(e) => warn!("Dropping notification: {}", e),
        }
    }

    /// Drives the session until quit or a fatal write error. Keystrokes and
    /// notifications are merged here in arrival order; nothing else mutates
    /// session state.
    pub async fn run(
        &mut self,
        mut inputs: mpsc::Receiver<InputEvent>,
        mut notifications: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), WriteError> {
        let mut telemetry_open = true;
        loop {
            tokio::select! {
                event = inputs.recv() => {
                    match event {
                        Some(event) => {
                            debug!("Dispatching {:?}", event);
                            if self.dispatch(event).await? == Flow::Quit {
                                return Ok(());
                            }
                        }
                        None => {
                            // Reader gone means no way left to quit; shut down.
                            warn!("Input channel closed, ending session");
                            self.dispatch(InputEvent::Quit).await?;
                            return Ok(());
                        }
                    }
                }
                maybe_bytes = notifications.recv(), if telemetry_open => {
                    match maybe_bytes {
                        Some(bytes) => self.handle_notification(&bytes),
                        None => {
                            debug!("Notification channel closed");
                            telemetry_open = false;
                        }
                    }
                }
            }
        }
    }

    /// Sends one frame under the write-failure policy: on the first failure,
    /// wait, reconnect once, and re-send once. A failed reconnect or a
    /// second write failure is fatal; the link is released before returning.
    async fn transmit(&mut self, frame: Frame) -> Result<(), WriteError> {
        let first_failure = match self.link.send_frame(&frame).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(
            "Frame write failed ({}), reconnecting in {:?}",
            first_failure, self.write_retry_delay
        );
        sleep(self.write_retry_delay).await;

        if let Err(e) = self.link.reconnect().await {
            self.link.disconnect().await;
            return Err(WriteError::ReconnectFailed(e));
        }
        match self.link.send_frame(&frame).await {
            Ok(()) => {
                info!("Write recovered after reconnect");
                Ok(())
            }
            Err(e) => {
                self.link.disconnect().await;
                Err(e)
            }
        }
    }
}
