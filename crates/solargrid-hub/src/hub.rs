//! Round processing: report in, decision broadcast out

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{error, info};

use solargrid_oracle::DecisionOracle;
use solargrid_types::{EnergyReport, RetryPolicy};

use crate::{BroadcastServer, ReportFeed, Result, SubscriberSet};

/// The central decision process
///
/// One instance owns its subscriber set and latest decision; nothing is
/// shared process-wide.
pub struct DecisionHub {
    oracle: Arc<dyn DecisionOracle>,
    subscribers: SubscriberSet,
    latest_decision: RwLock<Option<String>>,
}

impl DecisionHub {
    pub fn new(oracle: Arc<dyn DecisionOracle>) -> Self {
        Self {
            oracle,
            subscribers: SubscriberSet::new(),
            latest_decision: RwLock::new(None),
        }
    }

    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    /// The most recent decision text, if any round has completed
    pub async fn latest_decision(&self) -> Option<String> {
        self.latest_decision.read().await.clone()
    }

    /// Run one settlement round.
    ///
    /// An oracle failure drops the round: the report is stale by the time
    /// a retry could run, so it is logged and discarded. Returns the
    /// number of subscribers the decision was delivered to.
    pub async fn process_report(&self, report: EnergyReport) -> usize {
        info!(
            weather = %report.weather,
            houses = report.houses.len(),
            net_energy = report.net_energy(),
            action = %report.public_grid_action(),
            "processing settlement round"
        );

        let decision = match self.oracle.decide(&report).await {
            Ok(text) => text,
            Err(err) => {
                error!(%err, "oracle failed, dropping round");
                return 0;
            }
        };

        *self.latest_decision.write().await = Some(decision.clone());
        let delivered = self.subscribers.broadcast(&decision).await;
        info!(delivered, "decision broadcast");
        delivered
    }

    /// Run the full hub: broadcast server, telemetry feed, round loop.
    ///
    /// Runs until externally terminated.
    pub async fn run(self: Arc<Self>, listen_addr: &str, feed_url: &str, retry: RetryPolicy) -> Result<()> {
        let server = BroadcastServer::bind(listen_addr, self.subscribers.clone()).await?;
        tokio::spawn(server.run());

        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        tokio::spawn(ReportFeed::new(feed_url, retry).run(report_tx));

        while let Some(report) = report_rx.recv().await {
            self.process_report(report).await;
        }
        Ok(())
    }
}
