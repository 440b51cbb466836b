//! trainctl library
//! Keyboard-driven controller for a Bluetooth LE toy train hub. The wire
//! codec and session state machine live under the core module; this file
//! wires a complete interactive run together.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod input;

use std::io::{self, Write};
use std::path::Path;

use bluest::Adapter;
use log::info;
use tokio::sync::mpsc;

use config::TrainConfig;
use crate::core::bluetooth::{DiscoveredTrain, INPUT_QUEUE_CAPACITY, TrainConnection, TrainScanner};
use crate::core::session::{ControlSession, InputEvent};
use error::{RunError, ScanError, WriteError};

/// Runs one interactive controller session end to end: scan, select,
/// connect, subscribe, drive, disconnect.
pub async fn run(config_path: &Path) -> Result<(), RunError> {
    let config = TrainConfig::load(config_path).await;

    let adapter = Adapter::default().await.ok_or(ScanError::NoAdapter)?;
    adapter.wait_available().await.map_err(ScanError::from)?;

    let scanner = TrainScanner::new(adapter.clone());
    let trains = scanner.scan(config.scan_duration()).await?;
    if trains.is_empty() {
        return Err(ScanError::NoDevices.into());
    }
    let train = select_train(trains)?;

    let (connection, notify_rx) = TrainConnection::connect(adapter, train.device).await?;

    print_controls(&config);

    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
    input::spawn_key_reader(config.bindings(), input_tx)?;

    let mut session = ControlSession::new(connection, config.write_retry_delay());
    let result = drive(&mut session, input_rx, notify_rx).await;

    // The reader thread may still be parked inside a blocking read on the
    // error paths, so restore the terminal from here as well.
    input::restore_terminal();
    result.map_err(RunError::from)
}

async fn drive(
    session: &mut ControlSession<TrainConnection>,
    input_rx: mpsc::Receiver<InputEvent>,
    notify_rx: mpsc::Receiver<Vec<u8>>,
) -> Result<(), WriteError> {
    session.initialize().await?;
    session.run(input_rx, notify_rx).await
}

/// Lets the operator pick a hub; a single result is selected automatically.
fn select_train(mut trains: Vec<DiscoveredTrain>) -> Result<DiscoveredTrain, RunError> {
    if trains.len() == 1 {
        info!("Selecting the only hub in range: {}", trains[0]);
        return Ok(trains.remove(0));
    }

    println!("Found {} train hubs:", trains.len());
    for (index, train) in trains.iter().enumerate() {
        println!("  {}) {}", index + 1, train);
    }
    loop {
        print!("Select hub [1-{}]: ", trains.len());
        io::stdout().flush().map_err(RunError::Terminal)?;

        let mut line = String::new();
        let read = io::stdin().read_line(&mut line).map_err(RunError::Terminal)?;
        if read == 0 {
            return Err(RunError::Terminal(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed during hub selection",
            )));
        }
        match line.trim().parse::<usize>() {
            Ok(choice) if (1..=trains.len()).contains(&choice) => {
                return Ok(trains.swap_remove(choice - 1));
            }
            _ => println!("Enter a number between 1 and {}.", trains.len()),
        }
    }
}

/// Prints the active key bindings before the terminal goes raw.
fn print_controls(config: &TrainConfig) {
    let mut entries: Vec<(&char, &String)> = config.key_bindings.iter().collect();
    entries.sort();

    println!("Train controls:");
    for (key, action) in entries {
        if InputEvent::from_action_name(action).is_some() {
            println!("  {:<3} {}", key, action);
        }
    }
    println!("  Ctrl-C quits.");
}
