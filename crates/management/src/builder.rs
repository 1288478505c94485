//! Campaign builder. Edits a draft and its audience rules, previews the
//! audience size, and persists segment plus campaign.
//!
//! Saving is two backend calls (segment, then campaign) with no transaction
//! around them. When the second call fails the segment already exists; the
//! builder keeps its id and reuses it on the next save as long as the rules
//! are unchanged, so a retry never creates a second segment.

use std::sync::Arc;

use anyhow::anyhow;
use campaign_core::config::SegmentationConfig;
use campaign_core::{
    CampaignDraft, CampaignError, CampaignId, CampaignResult, CampaignStatus, SegmentId,
};
use campaign_segmentation::{AudienceEvaluator, ConditionGroup, Field, RuleSet};
use tracing::{info, warn};

use crate::api::CampaignApi;
use crate::models::{CreateCampaignRequest, CreateSegmentRequest, SuggestionRequest};

/// Identifiers of a freshly persisted campaign and its segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCampaign {
    pub campaign_id: CampaignId,
    pub segment_id: SegmentId,
    pub status: CampaignStatus,
}

#[derive(Debug, Clone)]
struct PersistedSegment {
    id: SegmentId,
    request: CreateSegmentRequest,
}

struct SaveFailure {
    segment_id: Option<SegmentId>,
    request: CreateSegmentRequest,
    error: CampaignError,
}

pub struct CampaignBuilder {
    api: Arc<dyn CampaignApi>,
    evaluator: Arc<dyn AudienceEvaluator>,
    draft: CampaignDraft,
    rules: RuleSet,
    strict_operators: bool,
    audience_size: Option<u64>,
    persisted_segment: Option<PersistedSegment>,
}

impl CampaignBuilder {
    pub fn new(
        api: Arc<dyn CampaignApi>,
        evaluator: Arc<dyn AudienceEvaluator>,
        config: &SegmentationConfig,
    ) -> Self {
        Self {
            api,
            evaluator,
            draft: CampaignDraft::default(),
            rules: RuleSet::new(),
            strict_operators: config.strict_operators,
            audience_size: None,
            persisted_segment: None,
        }
    }

    pub fn with_draft(mut self, draft: CampaignDraft) -> Self {
        self.draft = draft;
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn draft(&self) -> &CampaignDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut CampaignDraft {
        &mut self.draft
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Any rule edit invalidates the last previewed audience size.
    pub fn rules_mut(&mut self) -> &mut RuleSet {
        self.audience_size = None;
        &mut self.rules
    }

    /// Last successful preview for the current rules.
    pub fn audience_size(&self) -> Option<u64> {
        self.audience_size
    }

    /// Segment left behind by a failed save, reused by the next one.
    pub fn pending_segment(&self) -> Option<&SegmentId> {
        self.persisted_segment.as_ref().map(|p| &p.id)
    }

    pub fn validate_rules(&self) -> CampaignResult<()> {
        let validation = if self.strict_operators {
            self.rules.validate_strict()
        } else {
            self.rules.validate_for_save()
        };
        validation.into_result()
    }

    pub fn validate(&self) -> CampaignResult<()> {
        self.draft.validate()?;
        self.validate_rules()
    }

    /// Asks the evaluator for the current audience size. A failure leaves the
    /// rules untouched and can be retried.
    pub async fn preview(&mut self) -> CampaignResult<u64> {
        self.validate_rules()?;
        match self.evaluator.audience_size(self.rules.groups()).await {
            Ok(size) => {
                info!(audience_size = size, "Audience preview");
                self.audience_size = Some(size);
                Ok(size)
            }
            Err(e) => {
                warn!(error = %e, "Audience preview failed");
                Err(CampaignError::Preview(e.to_string()))
            }
        }
    }

    /// Validates locally, then creates the segment and the campaign
    /// referencing it. Once the segment call is issued the campaign call is
    /// attempted even if the caller stops waiting.
    pub async fn save(&mut self) -> CampaignResult<SavedCampaign> {
        self.validate()?;

        let request = CreateSegmentRequest {
            name: self.draft.segment_name(),
            description: self.draft.description.clone(),
            conditions: self.rules.groups().to_vec(),
        };
        let reuse = self
            .persisted_segment
            .as_ref()
            .filter(|p| p.request == request)
            .map(|p| p.id.clone());
        if let Some(segment_id) = &reuse {
            info!(segment_id = %segment_id, "Reusing segment persisted by an earlier save");
        }

        let api = self.api.clone();
        let draft = self.draft.clone();
        let outcome = tokio::spawn(persist(api, draft, request, reuse))
            .await
            .map_err(|e| CampaignError::Internal(anyhow!("save task failed: {e}")))?;

        match outcome {
            Ok(saved) => {
                metrics::counter!("builder.saves").increment(1);
                info!(
                    campaign_id = %saved.campaign_id,
                    segment_id = %saved.segment_id,
                    "Campaign saved"
                );
                self.persisted_segment = None;
                Ok(saved)
            }
            Err(SaveFailure {
                segment_id: Some(segment_id),
                request,
                error,
            }) => {
                metrics::counter!("builder.orphaned_segments").increment(1);
                warn!(
                    segment_id = %segment_id,
                    error = %error,
                    "Segment persisted but campaign creation failed"
                );
                self.persisted_segment = Some(PersistedSegment {
                    id: segment_id.clone(),
                    request,
                });
                Err(CampaignError::OrphanedSegment {
                    segment_id,
                    source: Box::new(error),
                })
            }
            Err(SaveFailure { error, .. }) => {
                warn!(error = %error, "Segment creation failed");
                Err(error)
            }
        }
    }

    pub async fn suggest_messages(&self, objective: &str) -> CampaignResult<Vec<String>> {
        let request = SuggestionRequest {
            campaign_objective: objective.to_string(),
            audience_type: audience_hint(self.rules.groups()).to_string(),
        };
        self.api.message_suggestions(&request).await
    }

    pub fn apply_suggestion(&mut self, suggestion: &str) {
        self.draft.set_message_content(suggestion);
    }

    /// Replaces the rules with the backend's reading of a free-text audience
    /// description. The current rules stay in place if the result is unusable.
    pub async fn apply_natural_language(&mut self, description: &str) -> CampaignResult<()> {
        let groups = self.api.convert_rules(description).await?;
        let rules = RuleSet::from_groups(groups)?;
        info!(groups = rules.groups().len(), "Converted audience description into rules");
        self.rules = rules;
        self.audience_size = None;
        Ok(())
    }
}

async fn persist(
    api: Arc<dyn CampaignApi>,
    draft: CampaignDraft,
    request: CreateSegmentRequest,
    reuse: Option<SegmentId>,
) -> Result<SavedCampaign, SaveFailure> {
    let segment_id = match reuse {
        Some(id) => id,
        None => {
            let created = api
                .create_segment(&request)
                .await
                .map_err(|error| SaveFailure {
                    segment_id: None,
                    request: request.clone(),
                    error,
                })?;
            match created.id {
                Some(id) => SegmentId::from(id),
                None => {
                    return Err(SaveFailure {
                        segment_id: None,
                        request,
                        error: CampaignError::Persistence(
                            "segment response did not include an identifier".to_string(),
                        ),
                    })
                }
            }
        }
    };

    let campaign_request = CreateCampaignRequest {
        segment_id: segment_id.clone(),
        name: draft.name,
        description: draft.description,
        message_content: draft.message_content,
    };
    let created = match api.create_campaign(&campaign_request).await {
        Ok(created) => created,
        Err(error) => {
            return Err(SaveFailure {
                segment_id: Some(segment_id),
                request,
                error,
            })
        }
    };
    let Some(campaign_id) = created.id else {
        return Err(SaveFailure {
            segment_id: Some(segment_id),
            request,
            error: CampaignError::Persistence(
                "campaign response did not include an identifier".to_string(),
            ),
        });
    };

    Ok(SavedCampaign {
        campaign_id: CampaignId::from(campaign_id),
        segment_id,
        status: created.status.unwrap_or(CampaignStatus::Draft),
    })
}

/// Audience label sent along with suggestion requests, taken from the first
/// rule of the first group.
pub fn audience_hint(groups: &[ConditionGroup]) -> &'static str {
    let first_field = groups
        .first()
        .and_then(|g| g.rules.first())
        .and_then(|r| r.field);
    match first_field {
        Some(Field::LastPurchase) => "Inactive Customers",
        Some(Field::TotalSpend) => "High-Value Customers",
        _ => "General Audience",
    }
}
