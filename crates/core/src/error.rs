use thiserror::Error;

use crate::types::{CampaignId, CampaignStatus, SegmentId};

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    /// Local, pre-network rejection. Never reaches the backend.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Campaign creation failed after its segment was already persisted.
    #[error("Campaign creation failed, segment {segment_id} left without a campaign: {source}")]
    OrphanedSegment {
        segment_id: SegmentId,
        #[source]
        source: Box<CampaignError>,
    },

    #[error("Audience preview failed: {0}")]
    Preview(String),

    /// Status was moved to `running` but the dispatch trigger did not go through.
    #[error("Campaign {campaign_id} is running but dispatch was not triggered: {message}")]
    DispatchTrigger {
        campaign_id: CampaignId,
        message: String,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Whether re-issuing the same user action can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CampaignError::Network(_)
            | CampaignError::Preview(_)
            | CampaignError::DispatchTrigger { .. }
            | CampaignError::OrphanedSegment { .. } => true,
            CampaignError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CampaignError::Validation(_))
    }
}

impl From<config::ConfigError> for CampaignError {
    fn from(e: config::ConfigError) -> Self {
        CampaignError::Config(e.to_string())
    }
}
