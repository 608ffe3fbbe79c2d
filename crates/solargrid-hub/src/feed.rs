//! Inbound telemetry feed
//!
//! Connects to the backend's WebSocket, deserializes each text frame into
//! an [`EnergyReport`], and hands it to the hub. The connection is
//! retried forever under the configured policy; the backoff counter
//! resets on every successful connect.

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use solargrid_types::{EnergyReport, RetryPolicy};

/// Reconnecting WebSocket client for energy reports
pub struct ReportFeed {
    url: String,
    retry: RetryPolicy,
}

impl ReportFeed {
    pub fn new(url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            retry,
        }
    }

    /// Run until the process is terminated, emitting reports on `reports`.
    ///
    /// Returns only if the receiving side is dropped.
    pub async fn run(self, reports: UnboundedSender<EnergyReport>) {
        let mut attempt: u32 = 0;
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((mut ws, _)) => {
                    info!(url = %self.url, "telemetry feed connected");
                    attempt = 0;
                    while let Some(frame) = ws.next().await {
                        match frame {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<EnergyReport>(&text) {
                                    Ok(report) => {
                                        if reports.send(report).is_err() {
                                            return;
                                        }
                                    }
                                    Err(err) => {
                                        warn!(%err, "undecodable telemetry frame dropped");
                                    }
                                }
                            }
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => {}
                        }
                    }
                    warn!(url = %self.url, "telemetry feed closed");
                }
                Err(err) => {
                    warn!(url = %self.url, %err, "telemetry feed connect failed");
                }
            }

            if reports.is_closed() {
                return;
            }
            let delay = self.retry.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            info!(?delay, "retrying telemetry feed");
            tokio::time::sleep(delay).await;
        }
    }
}
