//! Network probing between the edge node and the cloud verifier.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ProbeError;
use crate::types::NetworkSample;

/// Attempts considered when estimating packet loss.
const LOSS_WINDOW: usize = 10;

/// Source of edge-to-cloud link readings.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn sample(&self, endpoint: &str) -> Result<NetworkSample, ProbeError>;
}

/// Probe that times a `HEAD {endpoint}/health` request.
///
/// Any HTTP response counts as a successful round trip. Packet loss is
/// estimated as the share of failed attempts among the last ten.
pub struct HttpNetworkProbe {
    client: reqwest::Client,
    attempts: Mutex<AttemptWindow>,
}

impl HttpNetworkProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            attempts: Mutex::new(AttemptWindow::new(LOSS_WINDOW)),
        })
    }

    /// Failure ratio over the recent attempts.
    pub fn loss_ratio(&self) -> f64 {
        self.attempts.lock().failure_ratio()
    }
}

#[async_trait]
impl NetworkProbe for HttpNetworkProbe {
    async fn sample(&self, endpoint: &str) -> Result<NetworkSample, ProbeError> {
        let url = format!("{}/health", endpoint.trim_end_matches('/'));

        let start = Instant::now();
        let result = self.client.head(&url).send().await;
        let rtt_ms = start.elapsed().as_secs_f64() * 1000.0;

        let packet_loss_ratio = {
            let mut attempts = self.attempts.lock();
            attempts.push(result.is_ok());
            attempts.failure_ratio()
        };

        match result {
            Ok(response) => {
                tracing::trace!(%url, status = %response.status(), rtt_ms, "network probe");
                Ok(NetworkSample {
                    rtt_ms,
                    packet_loss_ratio,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Bounded record of probe attempt outcomes.
#[derive(Debug)]
struct AttemptWindow {
    capacity: usize,
    outcomes: VecDeque<bool>,
}

impl AttemptWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outcomes: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, success: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    fn failure_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / self.outcomes.len() as f64
    }
}
