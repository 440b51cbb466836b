//! Train hub discovery
//! Scans Bluetooth advertisements for the control service and collects the
//! hubs seen within the scan window.

use std::time::Duration;

use bluest::Adapter;
use futures_util::StreamExt;
use log::{debug, info};

use crate::core::bluetooth::constants::{MIN_RSSI_THRESHOLD, UUID_TRAIN_SERVICE};
use crate::core::bluetooth::types::DiscoveredTrain;
use crate::error::ScanError;

pub struct TrainScanner {
    adapter: Adapter,
}

impl TrainScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Collects every hub advertising the control service within `duration`,
    /// in arrival order, de-duplicated by platform id.
    ///
    /// Each call starts a fresh scan. An empty result means nothing
    /// advertised in the window; the caller decides whether that is fatal.
    pub async fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredTrain>, ScanError> {
        info!("Scanning for train hubs for {:?}", duration);
        let mut scan_stream = self.adapter.scan(&[UUID_TRAIN_SERVICE]).await?;

        let mut found: Vec<DiscoveredTrain> = Vec::new();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            let device = discovered.device;
                            let rssi = discovered.rssi;
                            debug!("Advertisement - Device: {:?}, RSSI: {:?}", device, rssi);

                            // Only include hubs with medium or stronger signal strength
                            if let Some(signal) = rssi {
                                if signal < MIN_RSSI_THRESHOLD {
                                    continue;
                                }
                            }
                            let id = device.id().to_string();
                            if found.iter().any(|train| train.id == id) {
                                continue;
                            }
                            let name = device
                                .name()
                                .unwrap_or_else(|_| "(unnamed hub)".to_string());
                            let train = DiscoveredTrain::new(device, name, rssi);
                            info!("Found train hub: {}", train);
                            found.push(train);
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    break;
                }
            }
        }

        info!("Scan finished with {} hub(s) in range", found.len());
        Ok(found)
    }
}
