//! Bluetooth functionality for the train controller
//! This module handles all bluetooth operations: scanning for hubs,
//! connecting, writing command frames, and pumping notifications.

mod connection;
mod constants;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use connection::{ConnectionState, FrameSender, TrainConnection};
pub use constants::*; // Re-export all constants
pub use scanner::TrainScanner;
pub use types::{DiscoveredTrain, extract_mac_address};
