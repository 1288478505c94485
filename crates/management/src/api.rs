//! Boundary to the campaign backend.

use async_trait::async_trait;
use campaign_core::{Campaign, CampaignId, CampaignResult, CampaignStatus};
use campaign_segmentation::ConditionGroup;

use crate::models::{
    CreateCampaignRequest, CreateSegmentRequest, CreatedResource, DeliveryReport,
    DispatchResponse, SuggestionRequest,
};

/// Campaign and segment persistence, dispatch, and delivery reporting.
///
/// Audience previews go through
/// [`AudienceEvaluator`](campaign_segmentation::AudienceEvaluator) instead.
#[async_trait]
pub trait CampaignApi: Send + Sync {
    async fn create_segment(&self, request: &CreateSegmentRequest)
        -> CampaignResult<CreatedResource>;

    async fn create_campaign(
        &self,
        request: &CreateCampaignRequest,
    ) -> CampaignResult<CreatedResource>;

    async fn list_campaigns(&self) -> CampaignResult<Vec<Campaign>>;

    async fn get_campaign(&self, id: &CampaignId) -> CampaignResult<Campaign>;

    async fn update_status(&self, id: &CampaignId, status: CampaignStatus) -> CampaignResult<()>;

    /// Asks the backend to start sending. Re-triggering a running campaign
    /// must be tolerated by the backend.
    async fn trigger_dispatch(&self, id: &CampaignId) -> CampaignResult<DispatchResponse>;

    async fn delivery_report(&self, id: &CampaignId) -> CampaignResult<DeliveryReport>;

    async fn delete_campaign(&self, id: &CampaignId) -> CampaignResult<()>;

    async fn message_suggestions(&self, request: &SuggestionRequest)
        -> CampaignResult<Vec<String>>;

    /// Converts a free-text audience description into condition groups.
    async fn convert_rules(&self, natural_language: &str) -> CampaignResult<Vec<ConditionGroup>>;
}
