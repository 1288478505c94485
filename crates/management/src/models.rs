//! Wire types for the campaign REST endpoints.

use campaign_core::{CampaignId, CampaignStats, CampaignStatus, DeliveryLog, SegmentId};
use campaign_segmentation::ConditionGroup;
use serde::{Deserialize, Serialize};

// ─── Segments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreviewRequest {
    pub conditions: Vec<ConditionGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub audience_size: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateSegmentRequest {
    pub name: String,
    pub description: String,
    pub conditions: Vec<ConditionGroup>,
}

/// Response of the create endpoints. Only the identifier matters to the
/// caller; its absence is a persistence failure, not a decode failure.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CreatedResource {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub segment_id: SegmentId,
    pub name: String,
    pub description: String,
    pub message_content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpdateStatusRequest {
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DispatchResponse {
    /// A success response without the flag counts as accepted.
    #[serde(default = "default_accepted")]
    pub accepted: bool,
}

fn default_accepted() -> bool {
    true
}

/// Current delivery state of one campaign, always a full replacement of the
/// previous report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    #[serde(default)]
    pub logs: Vec<DeliveryLog>,
    pub campaign_status: CampaignStatus,
    #[serde(default)]
    pub stats: CampaignStats,
}

impl DeliveryReport {
    pub fn belongs_to(&self, campaign_id: &CampaignId) -> bool {
        self.logs.iter().all(|log| &log.campaign_id == campaign_id)
    }
}

// ─── Assistive endpoints ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub campaign_objective: String,
    pub audience_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRulesRequest {
    pub natural_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRulesResponse {
    #[serde(default)]
    pub rules: Option<Vec<ConditionGroup>>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
