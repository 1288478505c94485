//! REST client for the campaign backend.

use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::ApiConfig;
use campaign_core::{Campaign, CampaignError, CampaignId, CampaignResult, CampaignStatus};
use campaign_segmentation::{AudienceEvaluator, ConditionGroup};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::api::CampaignApi;
use crate::models::*;

pub struct HttpCampaignApi {
    base_url: Url,
    client: Client,
    list_timeout: Duration,
}

impl HttpCampaignApi {
    pub fn new(config: &ApiConfig) -> CampaignResult<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            CampaignError::Config(format!("invalid api.base_url '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CampaignError::Config(format!(
                "api.base_url '{}' cannot carry a path",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CampaignError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            client,
            list_timeout: config.list_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> CampaignResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CampaignError::Config("api.base_url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> CampaignResult<R> {
        let response = self.execute(request).await?;
        response.json::<R>().await.map_err(transport_error)
    }

    async fn execute(&self, request: RequestBuilder) -> CampaignResult<reqwest::Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "Backend responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!(status = status.as_u16(), error = %message, "Backend rejected request");
            return Err(CampaignError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Timeouts, refused connections and unreadable bodies all surface as
/// network failures; none of them is retried here.
fn transport_error(e: reqwest::Error) -> CampaignError {
    if e.is_timeout() {
        CampaignError::Network(format!("request timed out: {e}"))
    } else if e.is_decode() {
        CampaignError::Network(format!("unreadable response body: {e}"))
    } else {
        CampaignError::Network(e.to_string())
    }
}

/// Prefers the backend's `{ "error": ... }` field, then `message`, then the raw body.
fn error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        if let Some(message) = parsed.error.or(parsed.message) {
            return Some(message);
        }
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl AudienceEvaluator for HttpCampaignApi {
    async fn audience_size(&self, groups: &[ConditionGroup]) -> CampaignResult<u64> {
        let url = self.endpoint(&["campaigns", "segments", "preview"])?;
        let body = PreviewRequest {
            conditions: groups.to_vec(),
        };
        let response: PreviewResponse = self.send(self.client.post(url).json(&body)).await?;
        Ok(response.audience_size)
    }
}

#[async_trait]
impl CampaignApi for HttpCampaignApi {
    async fn create_segment(
        &self,
        request: &CreateSegmentRequest,
    ) -> CampaignResult<CreatedResource> {
        let url = self.endpoint(&["campaigns", "segments"])?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn create_campaign(
        &self,
        request: &CreateCampaignRequest,
    ) -> CampaignResult<CreatedResource> {
        let url = self.endpoint(&["campaigns", "from-segment"])?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn list_campaigns(&self) -> CampaignResult<Vec<Campaign>> {
        let url = self.endpoint(&["campaigns"])?;
        self.send(self.client.get(url).timeout(self.list_timeout))
            .await
    }

    async fn get_campaign(&self, id: &CampaignId) -> CampaignResult<Campaign> {
        let url = self.endpoint(&["campaigns", id.as_str()])?;
        self.send(self.client.get(url)).await
    }

    async fn update_status(&self, id: &CampaignId, status: CampaignStatus) -> CampaignResult<()> {
        let url = self.endpoint(&["campaigns", id.as_str(), "status"])?;
        let body = UpdateStatusRequest { status };
        self.execute(self.client.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn trigger_dispatch(&self, id: &CampaignId) -> CampaignResult<DispatchResponse> {
        let url = self.endpoint(&["campaigns", id.as_str(), "send"])?;
        let response = self.execute(self.client.post(url)).await?;
        let body = response.text().await.map_err(transport_error)?;
        if body.trim().is_empty() {
            return Ok(DispatchResponse { accepted: true });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn delivery_report(&self, id: &CampaignId) -> CampaignResult<DeliveryReport> {
        let url = self.endpoint(&["campaigns", id.as_str(), "logs"])?;
        self.send(self.client.get(url)).await
    }

    async fn delete_campaign(&self, id: &CampaignId) -> CampaignResult<()> {
        let url = self.endpoint(&["campaigns", id.as_str()])?;
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    async fn message_suggestions(
        &self,
        request: &SuggestionRequest,
    ) -> CampaignResult<Vec<String>> {
        let url = self.endpoint(&["campaigns", "generate-suggestions"])?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn convert_rules(&self, natural_language: &str) -> CampaignResult<Vec<ConditionGroup>> {
        let url = self.endpoint(&["campaigns", "generate-suggestions", "convert-rules"])?;
        let body = ConvertRulesRequest {
            natural_language: natural_language.to_string(),
        };
        let response: ConvertRulesResponse = self.send(self.client.post(url).json(&body)).await?;
        Ok(response.rules.unwrap_or_default())
    }
}
