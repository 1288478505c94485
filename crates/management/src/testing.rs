//! Recording in-memory backend used by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use campaign_core::{
    Campaign, CampaignError, CampaignId, CampaignResult, CampaignStats, CampaignStatus,
};
use campaign_segmentation::ConditionGroup;

use crate::api::CampaignApi;
use crate::models::*;

pub struct FakeApi {
    calls: Mutex<Vec<&'static str>>,
    segment_ids: AtomicU32,
    segment_id_present: AtomicBool,
    campaign_id_present: AtomicBool,
    campaign_failures: AtomicU32,
    status_update_fails: AtomicBool,
    dispatch_failures: AtomicU32,
    dispatch_accepted: AtomicBool,
    status: Mutex<CampaignStatus>,
    segment_requests: Mutex<Vec<CreateSegmentRequest>>,
    campaign_requests: Mutex<Vec<CreateCampaignRequest>>,
    suggestion_requests: Mutex<Vec<SuggestionRequest>>,
    converted_rules: Mutex<Vec<ConditionGroup>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            segment_ids: AtomicU32::new(0),
            segment_id_present: AtomicBool::new(true),
            campaign_id_present: AtomicBool::new(true),
            campaign_failures: AtomicU32::new(0),
            status_update_fails: AtomicBool::new(false),
            dispatch_failures: AtomicU32::new(0),
            dispatch_accepted: AtomicBool::new(true),
            status: Mutex::new(CampaignStatus::Draft),
            segment_requests: Mutex::new(Vec::new()),
            campaign_requests: Mutex::new(Vec::new()),
            suggestion_requests: Mutex::new(Vec::new()),
            converted_rules: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn omit_segment_id(&self) {
        self.segment_id_present.store(false, Ordering::SeqCst);
    }

    pub fn omit_campaign_id(&self) {
        self.campaign_id_present.store(false, Ordering::SeqCst);
    }

    pub fn fail_campaign_creations(&self, times: u32) {
        self.campaign_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_status_updates(&self) {
        self.status_update_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_dispatches(&self, times: u32) {
        self.dispatch_failures.store(times, Ordering::SeqCst);
    }

    pub fn reject_dispatch(&self) {
        self.dispatch_accepted.store(false, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: CampaignStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn status(&self) -> CampaignStatus {
        *self.status.lock().unwrap()
    }

    pub fn set_converted_rules(&self, groups: Vec<ConditionGroup>) {
        *self.converted_rules.lock().unwrap() = groups;
    }

    pub fn last_segment_request(&self) -> Option<CreateSegmentRequest> {
        self.segment_requests.lock().unwrap().last().cloned()
    }

    pub fn last_campaign_request(&self) -> Option<CreateCampaignRequest> {
        self.campaign_requests.lock().unwrap().last().cloned()
    }

    pub fn last_suggestion_request(&self) -> Option<SuggestionRequest> {
        self.suggestion_requests.lock().unwrap().last().cloned()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    /// Decrements a failure budget, reporting whether this call should fail.
    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn campaign(&self, id: &CampaignId) -> Campaign {
        Campaign {
            id: id.clone(),
            name: "Winback".into(),
            description: "Lapsed big spenders".into(),
            message_content: "We miss you".into(),
            message_template: campaign_core::types::DEFAULT_MESSAGE_TEMPLATE.into(),
            segment_id: None,
            status: self.status(),
            stats: CampaignStats::default(),
        }
    }
}

#[async_trait]
impl CampaignApi for FakeApi {
    async fn create_segment(
        &self,
        request: &CreateSegmentRequest,
    ) -> CampaignResult<CreatedResource> {
        self.record("create_segment");
        self.segment_requests.lock().unwrap().push(request.clone());
        let n = self.segment_ids.fetch_add(1, Ordering::SeqCst) + 1;
        let id = self
            .segment_id_present
            .load(Ordering::SeqCst)
            .then(|| format!("seg-{n}"));
        Ok(CreatedResource { id, status: None })
    }

    async fn create_campaign(
        &self,
        request: &CreateCampaignRequest,
    ) -> CampaignResult<CreatedResource> {
        self.record("create_campaign");
        self.campaign_requests.lock().unwrap().push(request.clone());
        if Self::take_failure(&self.campaign_failures) {
            return Err(CampaignError::Network("request timed out".into()));
        }
        let id = self
            .campaign_id_present
            .load(Ordering::SeqCst)
            .then(|| "camp-1".to_string());
        Ok(CreatedResource {
            id,
            status: Some(CampaignStatus::Draft),
        })
    }

    async fn list_campaigns(&self) -> CampaignResult<Vec<Campaign>> {
        self.record("list_campaigns");
        Ok(vec![self.campaign(&CampaignId::from("camp-1"))])
    }

    async fn get_campaign(&self, id: &CampaignId) -> CampaignResult<Campaign> {
        self.record("get_campaign");
        Ok(self.campaign(id))
    }

    async fn update_status(&self, _id: &CampaignId, status: CampaignStatus) -> CampaignResult<()> {
        self.record("update_status");
        if self.status_update_fails.load(Ordering::SeqCst) {
            return Err(CampaignError::Api {
                status: 500,
                message: "database unavailable".into(),
            });
        }
        self.set_status(status);
        Ok(())
    }

    async fn trigger_dispatch(&self, _id: &CampaignId) -> CampaignResult<DispatchResponse> {
        self.record("trigger_dispatch");
        if Self::take_failure(&self.dispatch_failures) {
            return Err(CampaignError::Network("connection reset".into()));
        }
        Ok(DispatchResponse {
            accepted: self.dispatch_accepted.load(Ordering::SeqCst),
        })
    }

    async fn delivery_report(&self, _id: &CampaignId) -> CampaignResult<DeliveryReport> {
        self.record("delivery_report");
        Ok(DeliveryReport {
            logs: Vec::new(),
            campaign_status: self.status(),
            stats: CampaignStats::default(),
        })
    }

    async fn delete_campaign(&self, _id: &CampaignId) -> CampaignResult<()> {
        self.record("delete_campaign");
        Ok(())
    }

    async fn message_suggestions(
        &self,
        request: &SuggestionRequest,
    ) -> CampaignResult<Vec<String>> {
        self.record("message_suggestions");
        self.suggestion_requests.lock().unwrap().push(request.clone());
        Ok(vec![
            "Hi {{customerName}}, Hi {{customerName}}, come back for 10% off".to_string(),
        ])
    }

    async fn convert_rules(&self, _natural_language: &str) -> CampaignResult<Vec<ConditionGroup>> {
        self.record("convert_rules");
        Ok(self.converted_rules.lock().unwrap().clone())
    }
}
