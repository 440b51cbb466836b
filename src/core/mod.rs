//! Core functionality for the train controller
//! This module contains the wire protocol codec, the Bluetooth transport,
//! and the interactive session state machine.

pub mod bluetooth;
pub mod protocol;
pub mod session;

// Re-export commonly used types
pub use protocol::{Command, Direction, Frame, NotificationEvent, Speed};
pub use session::{ControlSession, InputEvent, MotionState, SessionState};
