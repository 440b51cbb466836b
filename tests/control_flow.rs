//! End-to-end session scenarios over a scripted link: the real event loop
//! with keystrokes and notifications flowing through their channels.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use trainctl::core::bluetooth::FrameSender;
use trainctl::core::protocol::{
    DIR_FORWARD, Frame, MSG_MOTOR, MSG_PORT_VALUE, MSG_STOP, MSG_SUBSCRIBE, PORT_MOTOR,
    PORT_VOLTAGE, SPEED_FAST,
};
use trainctl::core::session::{ControlSession, InputEvent};
use trainctl::core::{Direction, MotionState, Speed};
use trainctl::error::{ConnectError, WriteError};

const FORWARD_FAST: InputEvent = InputEvent::Drive {
    direction: Direction::Forward,
    speed: Speed::Fast,
};

#[derive(Default)]
struct LinkLog {
    frames: Vec<Frame>,
    disconnects: usize,
}

/// Recording link the test can observe while the session owns its clone.
#[derive(Clone, Default)]
struct SharedLink {
    log: Arc<Mutex<LinkLog>>,
}

#[async_trait]
impl FrameSender for SharedLink {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), WriteError> {
        self.log.lock().unwrap().frames.push(frame.clone());
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), ConnectError> {
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }
}

#[tokio::test]
async fn full_session_drives_reads_telemetry_and_quits_cleanly() {
    let link = SharedLink::default();
    let log = link.log.clone();
    let mut session = ControlSession::new(link, Duration::from_millis(1));
    session.initialize().await.unwrap();

    let (input_tx, input_rx) = mpsc::channel(16);
    let (notify_tx, notify_rx) = mpsc::channel(16);

    let voltage = Frame::from_parts(MSG_PORT_VALUE, PORT_VOLTAGE, &7400u16.to_le_bytes());
    let script = async {
        input_tx.send(FORWARD_FAST).await.unwrap();
        notify_tx.send(voltage.as_bytes().to_vec()).await.unwrap();
        input_tx.send(InputEvent::Stop).await.unwrap();
        // Let the loop drain before the terminal event goes in.
        tokio::time::sleep(Duration::from_millis(50)).await;
        input_tx.send(InputEvent::Quit).await.unwrap();
    };
    let (result, ()) = tokio::join!(session.run(input_rx, notify_rx), script);
    result.unwrap();

    assert_eq!(session.state().motion, MotionState::Idle);
    assert_eq!(session.state().battery_millivolts, Some(7400));

    let log = log.lock().unwrap();
    assert_eq!(log.disconnects, 1);
    let types: Vec<u8> = log.frames.iter().map(|f| f.message_type()).collect();
    assert_eq!(types, [MSG_SUBSCRIBE, MSG_SUBSCRIBE, MSG_MOTOR, MSG_STOP]);

    let motor = &log.frames[2];
    assert_eq!(motor.port(), PORT_MOTOR);
    assert_eq!(motor.payload(), [DIR_FORWARD, SPEED_FAST]);
}

#[tokio::test]
async fn quitting_while_moving_brakes_before_disconnecting() {
    let link = SharedLink::default();
    let log = link.log.clone();
    let mut session = ControlSession::new(link, Duration::from_millis(1));

    let (input_tx, input_rx) = mpsc::channel(4);
    let (_notify_tx, notify_rx) = mpsc::channel(4);
    input_tx.send(FORWARD_FAST).await.unwrap();
    input_tx.send(InputEvent::Quit).await.unwrap();

    session.run(input_rx, notify_rx).await.unwrap();

    let log = log.lock().unwrap();
    let types: Vec<u8> = log.frames.iter().map(|f| f.message_type()).collect();
    assert_eq!(types, [MSG_MOTOR, MSG_STOP]);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn dropped_input_channel_shuts_the_session_down() {
    let link = SharedLink::default();
    let log = link.log.clone();
    let mut session = ControlSession::new(link, Duration::from_millis(1));

    let (input_tx, input_rx) = mpsc::channel::<InputEvent>(4);
    let (_notify_tx, notify_rx) = mpsc::channel(4);
    drop(input_tx);

    session.run(input_rx, notify_rx).await.unwrap();

    assert_eq!(log.lock().unwrap().disconnects, 1);
}
