use std::sync::Arc;

use campaign_core::{CampaignError, CampaignId, CampaignResult, CampaignStatus};
use tracing::{debug, info, warn};

use crate::api::CampaignApi;

/// Describes a single valid campaign status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CampaignStatus,
    pub to: CampaignStatus,
    pub trigger: &'static str,
}

/// `draft -> running` is the only transition caused locally; the rest are
/// made by the delivery worker and discovered by polling. `scheduled` has no
/// transitions at all.
pub const TRANSITIONS: &[StateTransition] = &[
    StateTransition {
        from: CampaignStatus::Draft,
        to: CampaignStatus::Running,
        trigger: "start",
    },
    StateTransition {
        from: CampaignStatus::Running,
        to: CampaignStatus::Completed,
        trigger: "delivery_complete",
    },
    StateTransition {
        from: CampaignStatus::Running,
        to: CampaignStatus::Failed,
        trigger: "delivery_failed",
    },
];

pub fn can_transition(from: CampaignStatus, to: CampaignStatus) -> bool {
    TRANSITIONS.iter().any(|t| t.from == from && t.to == to)
}

/// Client-side view of one campaign's status.
///
/// `start()` is two calls: the status update, then the dispatch trigger. If
/// the trigger fails the campaign stays `running` with dispatch pending, and
/// the next `start()` only repeats the trigger.
pub struct CampaignLifecycle {
    api: Arc<dyn CampaignApi>,
    campaign_id: CampaignId,
    status: CampaignStatus,
    dispatch_pending: bool,
}

impl CampaignLifecycle {
    pub fn new(api: Arc<dyn CampaignApi>, campaign_id: CampaignId, status: CampaignStatus) -> Self {
        Self {
            api,
            campaign_id,
            status,
            dispatch_pending: false,
        }
    }

    pub async fn load(api: Arc<dyn CampaignApi>, campaign_id: CampaignId) -> CampaignResult<Self> {
        let campaign = api.get_campaign(&campaign_id).await?;
        debug!(campaign_id = %campaign.id, status = %campaign.status, "Loaded campaign");
        Ok(Self::new(api, campaign.id, campaign.status))
    }

    pub fn campaign_id(&self) -> &CampaignId {
        &self.campaign_id
    }

    pub fn status(&self) -> CampaignStatus {
        self.status
    }

    /// `running` on the backend, but the dispatch trigger has not gone through.
    pub fn is_dispatch_pending(&self) -> bool {
        self.dispatch_pending
    }

    /// Only a draft can be started, or a running campaign whose dispatch
    /// trigger failed.
    pub fn can_start(&self) -> bool {
        self.status == CampaignStatus::Draft
            || (self.status == CampaignStatus::Running && self.dispatch_pending)
    }

    /// Marks a campaign loaded as `running` as still waiting for its dispatch
    /// trigger, so that `start()` re-triggers it. Used when the failed trigger
    /// happened in an earlier session.
    pub fn resume_pending_dispatch(&mut self) -> CampaignResult<()> {
        if self.status != CampaignStatus::Running {
            return Err(CampaignError::InvalidOperation(format!(
                "campaign {} is {}, not running",
                self.campaign_id, self.status
            )));
        }
        self.dispatch_pending = true;
        Ok(())
    }

    pub async fn start(&mut self) -> CampaignResult<()> {
        match self.status {
            CampaignStatus::Draft => {
                self.api
                    .update_status(&self.campaign_id, CampaignStatus::Running)
                    .await?;
                info!(campaign_id = %self.campaign_id, "Campaign status set to running");
                self.status = CampaignStatus::Running;
                self.dispatch_pending = true;
            }
            CampaignStatus::Running if self.dispatch_pending => {
                info!(campaign_id = %self.campaign_id, "Re-triggering dispatch");
            }
            from => {
                return Err(CampaignError::InvalidTransition {
                    from,
                    to: CampaignStatus::Running,
                })
            }
        }

        let message = match self.api.trigger_dispatch(&self.campaign_id).await {
            Ok(response) if response.accepted => {
                self.dispatch_pending = false;
                info!(campaign_id = %self.campaign_id, "Dispatch triggered");
                return Ok(());
            }
            Ok(_) => "dispatch request was not accepted".to_string(),
            Err(e) => e.to_string(),
        };

        metrics::counter!("lifecycle.dispatch_errors").increment(1);
        warn!(
            campaign_id = %self.campaign_id,
            error = %message,
            "Campaign is running but dispatch was not triggered"
        );
        Err(CampaignError::DispatchTrigger {
            campaign_id: self.campaign_id.clone(),
            message,
        })
    }

    /// Applies a status reported by the backend. Returns whether the local
    /// status changed. Terminal statuses are final; later observations are
    /// ignored.
    pub fn observe(&mut self, observed: CampaignStatus) -> CampaignResult<bool> {
        if observed == self.status {
            return Ok(false);
        }
        if self.status.is_terminal() {
            debug!(
                campaign_id = %self.campaign_id,
                status = %self.status,
                observed = %observed,
                "Ignoring status reported after a terminal status"
            );
            return Ok(false);
        }
        if !can_transition(self.status, observed) {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: observed,
            });
        }

        info!(
            campaign_id = %self.campaign_id,
            from = %self.status,
            to = %observed,
            "Campaign status changed"
        );
        self.status = observed;
        if observed.is_terminal() {
            self.dispatch_pending = false;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;

    fn lifecycle(api: &Arc<FakeApi>, status: CampaignStatus) -> CampaignLifecycle {
        api.set_status(status);
        CampaignLifecycle::new(api.clone(), CampaignId::from("camp-1"), status)
    }

    #[test]
    fn test_transition_table() {
        assert!(can_transition(CampaignStatus::Draft, CampaignStatus::Running));
        assert!(can_transition(CampaignStatus::Running, CampaignStatus::Failed));
        assert!(!can_transition(CampaignStatus::Draft, CampaignStatus::Completed));
        assert!(!can_transition(CampaignStatus::Completed, CampaignStatus::Running));
        assert!(TRANSITIONS
            .iter()
            .all(|t| t.from != CampaignStatus::Scheduled && t.to != CampaignStatus::Scheduled));
    }

    #[tokio::test]
    async fn test_start_updates_status_then_dispatches() {
        let api = Arc::new(FakeApi::new());
        let mut lifecycle = lifecycle(&api, CampaignStatus::Draft);

        lifecycle.start().await.unwrap();
        assert_eq!(lifecycle.status(), CampaignStatus::Running);
        assert!(!lifecycle.is_dispatch_pending());
        assert_eq!(api.calls(), vec!["update_status", "trigger_dispatch"]);
        assert_eq!(api.status(), CampaignStatus::Running);
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_running_with_distinct_error() {
        let api = Arc::new(FakeApi::new());
        api.fail_dispatches(1);
        let mut lifecycle = lifecycle(&api, CampaignStatus::Draft);

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, CampaignError::DispatchTrigger { .. }));
        assert_eq!(lifecycle.status(), CampaignStatus::Running);
        assert!(lifecycle.is_dispatch_pending());
        assert!(lifecycle.can_start());

        // Retrying only repeats the trigger.
        lifecycle.start().await.unwrap();
        assert!(!lifecycle.is_dispatch_pending());
        assert_eq!(
            api.calls(),
            vec!["update_status", "trigger_dispatch", "trigger_dispatch"]
        );
    }

    #[tokio::test]
    async fn test_rejected_dispatch_is_dispatch_error() {
        let api = Arc::new(FakeApi::new());
        api.reject_dispatch();
        let mut lifecycle = lifecycle(&api, CampaignStatus::Draft);

        let err = lifecycle.start().await.unwrap_err();
        assert!(err.to_string().contains("not accepted"));
        assert!(lifecycle.is_dispatch_pending());
    }

    #[tokio::test]
    async fn test_status_update_failure_keeps_draft() {
        let api = Arc::new(FakeApi::new());
        api.fail_status_updates();
        let mut lifecycle = lifecycle(&api, CampaignStatus::Draft);

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, CampaignError::Api { status: 500, .. }));
        assert_eq!(lifecycle.status(), CampaignStatus::Draft);
        assert_eq!(api.calls(), vec!["update_status"]);
    }

    #[tokio::test]
    async fn test_start_refused_outside_draft() {
        for status in [
            CampaignStatus::Running,
            CampaignStatus::Scheduled,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
        ] {
            let api = Arc::new(FakeApi::new());
            let mut lifecycle = lifecycle(&api, status);
            assert!(!lifecycle.can_start());
            let err = lifecycle.start().await.unwrap_err();
            assert!(matches!(err, CampaignError::InvalidTransition { .. }));
            assert!(api.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_load_reads_backend_status() {
        let api = Arc::new(FakeApi::new());
        api.set_status(CampaignStatus::Running);
        let lifecycle = CampaignLifecycle::load(api.clone(), CampaignId::from("camp-7"))
            .await
            .unwrap();
        assert_eq!(lifecycle.campaign_id().as_str(), "camp-7");
        assert_eq!(lifecycle.status(), CampaignStatus::Running);
        assert!(!lifecycle.can_start());
    }

    #[tokio::test]
    async fn test_resumed_dispatch_only_triggers() {
        let api = Arc::new(FakeApi::new());
        let mut lifecycle = lifecycle(&api, CampaignStatus::Running);
        lifecycle.resume_pending_dispatch().unwrap();
        lifecycle.start().await.unwrap();
        assert_eq!(api.calls(), vec!["trigger_dispatch"]);

        let mut draft =
            CampaignLifecycle::new(api.clone(), CampaignId::from("camp-2"), CampaignStatus::Draft);
        assert!(draft.resume_pending_dispatch().is_err());
        assert!(!draft.is_dispatch_pending());
    }

    #[test]
    fn test_observed_statuses_are_monotonic() {
        let api = Arc::new(FakeApi::new());
        let mut lifecycle = lifecycle(&api, CampaignStatus::Running);

        assert!(!lifecycle.observe(CampaignStatus::Running).unwrap());
        assert!(lifecycle.observe(CampaignStatus::Completed).unwrap());
        assert!(!lifecycle.observe(CampaignStatus::Running).unwrap());
        assert!(!lifecycle.observe(CampaignStatus::Failed).unwrap());
        assert_eq!(lifecycle.status(), CampaignStatus::Completed);
    }

    #[test]
    fn test_observe_rejects_skipped_states() {
        let api = Arc::new(FakeApi::new());
        let mut lifecycle = lifecycle(&api, CampaignStatus::Draft);
        assert!(lifecycle.observe(CampaignStatus::Completed).is_err());
        assert_eq!(lifecycle.status(), CampaignStatus::Draft);
    }
}
