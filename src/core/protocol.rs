//! Train hub wire protocol
//! This module implements the binary frame codec: encoding of outbound
//! commands, decoding of inbound notifications, and the vendor constant
//! table both directions share.

use thiserror::Error;

/// Motor drive command (0x81)
pub const MSG_MOTOR: u8 = 0x81;
/// Motor brake command (0x82)
pub const MSG_STOP: u8 = 0x82;
/// Ring light color command (0x83)
pub const MSG_LIGHT: u8 = 0x83;
/// Speaker effect command (0x84)
pub const MSG_SOUND: u8 = 0x84;
/// Telemetry subscription setup (0x41)
pub const MSG_SUBSCRIBE: u8 = 0x41;
/// Hub button state notification (0x01)
pub const MSG_BUTTON: u8 = 0x01;
/// Port value notification, carries sensor readings (0x45)
pub const MSG_PORT_VALUE: u8 = 0x45;

/// Output port of the drive motor
pub const PORT_MOTOR: u8 = 0x32;
/// Output port of the ring light
pub const PORT_LIGHT: u8 = 0x33;
/// Output port of the speaker
pub const PORT_SOUND: u8 = 0x34;
/// Input port of the battery voltage sensor
pub const PORT_VOLTAGE: u8 = 0x3b;
/// Pseudo-port for hub-internal sources such as the top button
pub const PORT_HUB: u8 = 0x00;

/// Direction payload byte: drive forward (0x01)
pub const DIR_FORWARD: u8 = 0x01;
/// Direction payload byte: drive backward (0x02)
pub const DIR_BACKWARD: u8 = 0x02;
/// Speed payload byte: cautious speed (0x20)
pub const SPEED_SLOW: u8 = 0x20;
/// Speed payload byte: full speed (0x40)
pub const SPEED_FAST: u8 = 0x40;

/// Number of selectable ring light colors; color indexes wrap at this value
pub const LIGHT_PALETTE_SIZE: u8 = 11;
/// Number of speaker effect slots; valid sound indexes are 1..=SOUND_COUNT
pub const SOUND_COUNT: u8 = 5;

/// Smallest well-formed frame: length, type, port and checksum with no payload
pub const MIN_FRAME_LEN: usize = 4;

/// Running XOR of a byte slice, the accumulator the hub firmware uses.
fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// A complete wire frame, valid by construction.
///
/// Layout is `[length][type][port][payload...][checksum]` where `length`
/// counts every byte of the frame including itself and the checksum, and
/// `checksum` is the XOR of all preceding bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Builds a frame from its type byte, port byte and payload, computing
    /// the length prefix and trailing checksum.
    pub fn from_parts(message_type: u8, port: u8, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= u8::MAX as usize - MIN_FRAME_LEN);
        let len = MIN_FRAME_LEN + payload.len();
        let mut bytes = Vec::with_capacity(len);
        bytes.push(len as u8);
        bytes.push(message_type);
        bytes.push(port);
        bytes.extend_from_slice(payload);
        bytes.push(xor_checksum(&bytes));
        Frame { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn message_type(&self) -> u8 {
        self.bytes[1]
    }

    pub fn port(&self) -> u8 {
        self.bytes[2]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[3..self.bytes.len() - 1]
    }
}

/// Drive direction of the motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn as_byte(self) -> u8 {
        match self {
            Direction::Forward => DIR_FORWARD,
            Direction::Backward => DIR_BACKWARD,
        }
    }
}

/// Drive speed of the motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Slow,
    Fast,
}

impl Speed {
    fn as_byte(self) -> u8 {
        match self {
            Speed::Slow => SPEED_SLOW,
            Speed::Fast => SPEED_FAST,
        }
    }
}

/// Commands the controller can send to the hub.
///
/// Each variant maps to a fixed message type and output port from the
/// constant table above; supporting another hub model is a table edit,
/// not a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the motor in `direction` at `speed`
    Motor { direction: Direction, speed: Speed },
    /// Set the ring light to a palette color
    Light { color_index: u8 },
    /// Play one of the speaker effects (1..=SOUND_COUNT)
    Sound { sound_index: u8 },
    /// Brake the motor
    Stop,
}

impl Command {
    /// Encodes the command into a checksummed wire frame. Never fails: every
    /// representable command is a valid frame.
    pub fn encode(&self) -> Frame {
        match *self {
            Command::Motor { direction, speed } => Frame::from_parts(
                MSG_MOTOR,
                PORT_MOTOR,
                &[direction.as_byte(), speed.as_byte()],
            ),
            Command::Light { color_index } => {
                Frame::from_parts(MSG_LIGHT, PORT_LIGHT, &[color_index])
            }
            Command::Sound { sound_index } => {
                Frame::from_parts(MSG_SOUND, PORT_SOUND, &[sound_index])
            }
            Command::Stop => Frame::from_parts(MSG_STOP, PORT_MOTOR, &[]),
        }
    }
}

/// Builds the setup frame that asks the hub to push updates for a port.
/// Sent once per telemetry source right after connecting; without it the
/// hub stays silent.
pub fn subscription_frame(port: u8) -> Frame {
    Frame::from_parts(MSG_SUBSCRIBE, port, &[0x01])
}

/// A decoded inbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Hub top button pressed or released
    Button { pressed: bool },
    /// Battery voltage reading in millivolts
    Voltage { millivolts: u16 },
    /// Checksum-valid frame this controller does not interpret
    Unrecognized { message_type: u8, port: u8 },
}

/// Reasons an inbound buffer is rejected before interpretation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: {actual} bytes")]
    Truncated { actual: usize },
    #[error("length prefix says {declared} bytes but buffer holds {actual}")]
    LengthMismatch { declared: u8, actual: usize },
    #[error("checksum mismatch: computed {computed:#04x}, frame carries {received:#04x}")]
    Checksum { computed: u8, received: u8 },
}

/// Validates and interprets an inbound notification buffer.
///
/// Validation happens in order: minimum size, length prefix, checksum.
/// Every checksum-valid frame decodes; unknown type/port combinations (or
/// known ones with an unexpected payload width) come back as
/// [`NotificationEvent::Unrecognized`] so telemetry loss never turns into
/// a session error.
pub fn decode(bytes: &[u8]) -> Result<NotificationEvent, DecodeError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(DecodeError::Truncated { actual: bytes.len() });
    }
    let declared = bytes[0];
    if declared as usize != bytes.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let received = bytes[bytes.len() - 1];
    let computed = xor_checksum(&bytes[..bytes.len() - 1]);
    if computed != received {
        return Err(DecodeError::Checksum { computed, received });
    }

    let message_type = bytes[1];
    let port = bytes[2];
    let payload = &bytes[3..bytes.len() - 1];
    let event = match (message_type, port) {
        (MSG_BUTTON, PORT_HUB) if payload.len() == 1 => NotificationEvent::Button {
            pressed: payload[0] != 0,
        },
        (MSG_PORT_VALUE, PORT_VOLTAGE) if payload.len() == 2 => NotificationEvent::Voltage {
            millivolts: u16::from_le_bytes([payload[0], payload[1]]),
        },
        _ => NotificationEvent::Unrecognized { message_type, port },
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voltage_frame(millivolts: u16) -> Frame {
        Frame::from_parts(MSG_PORT_VALUE, PORT_VOLTAGE, &millivolts.to_le_bytes())
    }

    #[test]
    fn motor_frame_has_exact_layout() {
        let frame = Command::Motor {
            direction: Direction::Forward,
            speed: Speed::Fast,
        }
        .encode();
        assert_eq!(frame.as_bytes(), [0x06, 0x81, 0x32, 0x01, 0x40, 0xf4]);
    }

    #[test]
    fn stop_frame_has_exact_layout() {
        let frame = Command::Stop.encode();
        assert_eq!(frame.as_bytes(), [0x04, 0x82, 0x32, 0xb4]);
    }

    #[test]
    fn every_command_carries_its_length_and_checksum() {
        let frames = [
            Command::Motor {
                direction: Direction::Forward,
                speed: Speed::Slow,
            }
            .encode(),
            Command::Motor {
                direction: Direction::Backward,
                speed: Speed::Fast,
            }
            .encode(),
            Command::Light { color_index: 7 }.encode(),
            Command::Sound { sound_index: 3 }.encode(),
            Command::Stop.encode(),
            subscription_frame(PORT_VOLTAGE),
        ];
        for frame in frames {
            let bytes = frame.as_bytes();
            assert_eq!(bytes[0] as usize, bytes.len());
            assert_eq!(
                xor_checksum(&bytes[..bytes.len() - 1]),
                bytes[bytes.len() - 1]
            );
        }
    }

    #[test]
    fn subscription_frame_targets_the_requested_port() {
        let frame = subscription_frame(PORT_HUB);
        assert_eq!(frame.message_type(), MSG_SUBSCRIBE);
        assert_eq!(frame.port(), PORT_HUB);
        assert_eq!(frame.payload(), [0x01]);
    }

    #[test]
    fn decode_reads_button_states() {
        let pressed = Frame::from_parts(MSG_BUTTON, PORT_HUB, &[0x01]);
        let released = Frame::from_parts(MSG_BUTTON, PORT_HUB, &[0x00]);
        assert_eq!(
            decode(pressed.as_bytes()),
            Ok(NotificationEvent::Button { pressed: true })
        );
        assert_eq!(
            decode(released.as_bytes()),
            Ok(NotificationEvent::Button { pressed: false })
        );
    }

    #[test]
    fn decode_reads_voltage_little_endian() {
        let frame = voltage_frame(7421);
        assert_eq!(
            decode(frame.as_bytes()),
            Ok(NotificationEvent::Voltage { millivolts: 7421 })
        );
    }

    #[test]
    fn well_formed_unknown_frames_are_unrecognized() {
        let frame = Frame::from_parts(0x77, 0x99, &[0xde, 0xad]);
        assert_eq!(
            decode(frame.as_bytes()),
            Ok(NotificationEvent::Unrecognized {
                message_type: 0x77,
                port: 0x99
            })
        );
    }

    #[test]
    fn known_type_with_unexpected_payload_width_is_unrecognized() {
        let frame = Frame::from_parts(MSG_PORT_VALUE, PORT_VOLTAGE, &[0x01]);
        assert_eq!(
            decode(frame.as_bytes()),
            Ok(NotificationEvent::Unrecognized {
                message_type: MSG_PORT_VALUE,
                port: PORT_VOLTAGE
            })
        );
    }

    #[test]
    fn empty_and_short_buffers_are_truncated() {
        assert_eq!(decode(&[]), Err(DecodeError::Truncated { actual: 0 }));
        assert_eq!(
            decode(&[0x03, 0x45, 0x46]),
            Err(DecodeError::Truncated { actual: 3 })
        );
    }

    #[test]
    fn truncation_below_declared_length_is_rejected() {
        let frame = voltage_frame(8000);
        let cut = &frame.as_bytes()[..frame.as_bytes().len() - 1];
        assert_eq!(
            decode(cut),
            Err(DecodeError::LengthMismatch {
                declared: 0x06,
                actual: 5
            })
        );
    }

    #[test]
    fn flipping_any_single_byte_fails_decode() {
        let frame = voltage_frame(7421);
        for i in 0..frame.as_bytes().len() {
            let mut corrupted = frame.as_bytes().to_vec();
            corrupted[i] ^= 0xff;
            let err = decode(&corrupted).unwrap_err();
            if i > 0 {
                assert!(
                    matches!(err, DecodeError::Checksum { .. }),
                    "byte {i}: expected checksum rejection, got {err:?}"
                );
            }
        }
    }
}
