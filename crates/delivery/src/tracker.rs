//! Delivery tracker. A Tokio task per campaign that fetches the delivery
//! report, publishes a snapshot, sleeps, and repeats while the campaign is
//! running.
//!
//! At most one fetch is in flight: the next sleep starts only after the
//! previous fetch has been applied. Cancelling through the handle (or
//! dropping it) drops any in-flight fetch and guarantees nothing is
//! published afterwards.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use campaign_core::config::TrackerConfig;
use campaign_core::{CampaignError, CampaignId, CampaignResult, CampaignStatus};
use campaign_management::{CampaignApi, DeliveryReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::progress::DeliverySnapshot;

/// Where delivery reports come from.
#[async_trait]
pub trait DeliverySource: Send + Sync {
    async fn fetch_report(&self, campaign_id: &CampaignId) -> CampaignResult<DeliveryReport>;
}

#[async_trait]
impl<T> DeliverySource for T
where
    T: CampaignApi + ?Sized,
{
    async fn fetch_report(&self, campaign_id: &CampaignId) -> CampaignResult<DeliveryReport> {
        self.delivery_report(campaign_id).await
    }
}

/// Latest published tracker state.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    /// Last successful snapshot. Kept across failed fetches.
    pub snapshot: Option<DeliverySnapshot>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Completed fetches, successful or not.
    pub fetches: u64,
    pub finished: bool,
}

/// Why the tracking task ended.
#[derive(Debug)]
pub enum TrackerExit {
    /// The campaign was observed outside `running`.
    Finished(CampaignStatus),
    Cancelled,
    /// Too many consecutive fetch failures; carries the last one.
    Failed(CampaignError),
}

pub struct DeliveryTracker<S: ?Sized> {
    source: Arc<S>,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

impl<S> DeliveryTracker<S>
where
    S: DeliverySource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, config: &TrackerConfig) -> Self {
        Self {
            source,
            poll_interval: config.poll_interval(),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }

    /// Start tracking a campaign. The first fetch is issued immediately.
    pub fn spawn(&self, campaign_id: CampaignId) -> TrackerHandle {
        let (state_tx, state_rx) = watch::channel(TrackerState::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller = Poller {
            source: self.source.clone(),
            campaign_id,
            poll_interval: self.poll_interval,
            max_consecutive_failures: self.max_consecutive_failures,
        };
        let task = tokio::spawn(poller.run(state_tx, shutdown_rx));

        TrackerHandle {
            updates: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

struct Poller<S: ?Sized> {
    source: Arc<S>,
    campaign_id: CampaignId,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

impl<S> Poller<S>
where
    S: DeliverySource + ?Sized,
{
    async fn run(
        self,
        state_tx: watch::Sender<TrackerState>,
        mut shutdown: watch::Receiver<bool>,
    ) -> TrackerExit {
        info!(
            campaign_id = %self.campaign_id,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Delivery tracker started"
        );
        let mut state = TrackerState::default();

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => return self.cancelled(),
                result = self.source.fetch_report(&self.campaign_id) => result,
            };
            if *shutdown.borrow() {
                return self.cancelled();
            }

            metrics::counter!("tracker.polls").increment(1);
            state.fetches += 1;

            match fetched {
                Ok(report) => {
                    let snapshot = DeliverySnapshot::from_report(&self.campaign_id, report);
                    let status = snapshot.status;
                    debug!(
                        campaign_id = %self.campaign_id,
                        status = %status,
                        progress = snapshot.progress_percent,
                        "Delivery snapshot"
                    );
                    state.snapshot = Some(snapshot);
                    state.last_error = None;
                    state.consecutive_failures = 0;

                    if !status.is_running() {
                        state.finished = true;
                        state_tx.send_replace(state);
                        info!(campaign_id = %self.campaign_id, status = %status, "Delivery tracker finished");
                        return TrackerExit::Finished(status);
                    }
                }
                Err(e) => {
                    metrics::counter!("tracker.poll_errors").increment(1);
                    state.consecutive_failures += 1;
                    state.last_error = Some(e.to_string());
                    warn!(
                        campaign_id = %self.campaign_id,
                        error = %e,
                        failures = state.consecutive_failures,
                        "Delivery report fetch failed"
                    );

                    if state.consecutive_failures >= self.max_consecutive_failures {
                        state.finished = true;
                        state_tx.send_replace(state);
                        warn!(campaign_id = %self.campaign_id, "Delivery tracker giving up");
                        return TrackerExit::Failed(e);
                    }
                }
            }

            state_tx.send_replace(state.clone());

            tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => return self.cancelled(),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn cancelled(&self) -> TrackerExit {
        debug!(campaign_id = %self.campaign_id, "Delivery tracker cancelled");
        TrackerExit::Cancelled
    }
}

/// Resolves once shutdown is requested or the handle is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Owner of a running tracker. Dropping the handle cancels the task.
pub struct TrackerHandle {
    updates: watch::Receiver<TrackerState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<TrackerExit>>,
}

impl TrackerHandle {
    pub fn current(&self) -> TrackerState {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.updates.clone()
    }

    /// Waits for the next published state. Returns `false` once the tracker
    /// has stopped and every state has been seen.
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }

    /// Latest state, marking it as seen.
    pub fn latest(&mut self) -> TrackerState {
        self.updates.borrow_and_update().clone()
    }

    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Cancels the task and waits for it to exit.
    pub async fn stop(mut self) -> TrackerExit {
        self.cancel();
        self.join_task().await
    }

    /// Waits for the tracker to end on its own.
    pub async fn join(mut self) -> TrackerExit {
        self.join_task().await
    }

    async fn join_task(&mut self) -> TrackerExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                TrackerExit::Failed(CampaignError::Internal(anyhow!("tracker task failed: {e}")))
            }),
            None => TrackerExit::Cancelled,
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
