//! Constants used throughout the application
//! This module contains the Bluetooth-level constant values: service and
//! characteristic UUIDs, timeouts, and channel capacities.

use uuid::Uuid;

/// The UUID of the train hub control service
pub const UUID_TRAIN_SERVICE: Uuid = Uuid::from_u128(0x00001623_1212_efde_1623_785feabcd123);

/// The UUID of the characteristic outbound command frames are written to
pub const UUID_TRAIN_WRITE_CHAR: Uuid = Uuid::from_u128(0x00001624_1212_efde_1623_785feabcd123);

/// The UUID of the characteristic inbound notification frames arrive on
pub const UUID_TRAIN_NOTIFY_CHAR: Uuid = Uuid::from_u128(0x00001625_1212_efde_1623_785feabcd123);

/// Maximum number of connection attempts before giving up
pub const MAX_CONNECT_RETRIES: usize = 5;

/// Delay between connection attempts in milliseconds
pub const CONNECT_RETRY_DELAY_MS: u64 = 1000;

/// Deadline for a single connection attempt in seconds
pub const CONNECT_ATTEMPT_TIMEOUT_SECS: u64 = 10;

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Advertisements weaker than this RSSI are ignored during scans
pub const MIN_RSSI_THRESHOLD: i16 = -90;

/// Capacity of the inbound notification queue; the pump drops frames
/// rather than block when the session falls this far behind
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 32;

/// Capacity of the keystroke event queue
pub const INPUT_QUEUE_CAPACITY: usize = 16;

/// Pause between the post-connect subscription frames in milliseconds
pub const STARTUP_FRAME_DELAY_MS: u64 = 100;

/// Default pause before the single reconnect attempt after a failed write,
/// in milliseconds; overridable from the config file
pub const DEFAULT_WRITE_RETRY_DELAY_MS: u64 = 1000;
