//! Heartbeat delivery

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use tvf_core::api::HeartbeatRequest;
use tvf_core::error::InvalidMacAddress;
use tvf_core::MacAddress;

use crate::backoff::ExponentialBackoff;

/// Path of the heartbeat endpoint on the fleet server
pub const HEARTBEAT_PATH: &str = "/api/terminals/heartbeat";

/// Heartbeat delivery errors
#[derive(Error, Debug)]
pub enum HeartbeatError {
    /// Request could not be sent or timed out
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server rejected heartbeat with status {0}")]
    Rejected(reqwest::StatusCode),

    /// Configured MAC address is malformed
    #[error(transparent)]
    InvalidMac(#[from] InvalidMacAddress),
}

/// Posts heartbeats for one terminal
#[derive(Debug, Clone)]
pub struct HeartbeatClient {
    http: reqwest::Client,
    endpoint: String,
    mac: MacAddress,
}

impl HeartbeatClient {
    /// Create a client for `server_url` reporting `mac_address`
    pub fn new(
        server_url: &str,
        mac_address: &str,
        request_timeout: Duration,
    ) -> Result<Self, HeartbeatError> {
        let mac = MacAddress::parse(mac_address)?;
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let endpoint = format!("{}{}", server_url.trim_end_matches('/'), HEARTBEAT_PATH);

        Ok(Self {
            http,
            endpoint,
            mac,
        })
    }

    /// MAC address this client reports
    pub fn mac_address(&self) -> &MacAddress {
        &self.mac
    }

    /// Full heartbeat URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one heartbeat
    pub async fn send(&self) -> Result<(), HeartbeatError> {
        let request = HeartbeatRequest {
            mac_address: self.mac.to_string(),
        };
        let response = self.http.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HeartbeatError::Rejected(status));
        }
        tracing::trace!("Heartbeat delivered ({})", status);
        Ok(())
    }
}

/// Send heartbeats every `interval` until `cancel` fires.
///
/// After a failed delivery the next attempt waits for the backoff delay
/// instead of the interval; the first success resets the backoff.
pub async fn run_heartbeat_loop(
    client: HeartbeatClient,
    interval: Duration,
    mut backoff: ExponentialBackoff,
    cancel: CancellationToken,
) {
    tracing::info!(
        "Sending heartbeats for {} to {} every {:?}",
        client.mac_address(),
        client.endpoint(),
        interval
    );

    let mut failing = false;
    loop {
        let delay = match client.send().await {
            Ok(()) => {
                if failing {
                    tracing::info!("Heartbeat delivery recovered");
                    failing = false;
                }
                backoff.reset();
                interval
            }
            Err(e) => {
                failing = true;
                let delay = backoff.next_delay();
                tracing::warn!("Heartbeat failed: {}. Retrying in {:?}", e, delay);
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                tracing::info!("Heartbeat loop shutting down");
                break;
            }
        }
    }
}
