use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, CampaignResult};

/// Greeting template applied to every outgoing message unless overridden.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Hi {{customerName}}, {{message}}";

const CUSTOMER_NAME_PLACEHOLDER: &str = "{{customerName}}";
const MESSAGE_PLACEHOLDER: &str = "{{message}}";
const DUPLICATED_GREETING: &str = "Hi {{customerName}}, Hi {{customerName}}";
const GREETING: &str = "Hi {{customerName}}";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Backend-assigned campaign identifier (`_id` on the wire).
    CampaignId
);
string_id!(
    /// Backend-assigned segment identifier (`_id` on the wire).
    SegmentId
);

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(rename = "_id", alias = "id")]
    pub id: CampaignId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub message_content: String,
    #[serde(default = "default_message_template")]
    pub message_template: String,
    #[serde(default)]
    pub segment_id: Option<SegmentId>,
    pub status: CampaignStatus,
    #[serde(default)]
    pub stats: CampaignStats,
}

fn default_message_template() -> String {
    DEFAULT_MESSAGE_TEMPLATE.to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[serde(alias = "DRAFT")]
    Draft,
    /// Declared but never entered by any transition; never actionable.
    #[serde(alias = "SCHEDULED")]
    Scheduled,
    #[serde(alias = "RUNNING")]
    Running,
    #[serde(alias = "COMPLETED")]
    Completed,
    #[serde(alias = "FAILED")]
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, CampaignStatus::Running)
    }

    /// No transition leads out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "running" => Ok(CampaignStatus::Running),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(CampaignError::Validation(format!(
                "unknown campaign status '{other}'"
            ))),
        }
    }
}

/// Aggregate delivery counters. `audience_size` is fixed when the campaign is
/// created; delivery only moves `sent` and `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    #[serde(default)]
    pub audience_size: u64,
    #[serde(default)]
    pub sent: u64,
    #[serde(default)]
    pub failed: u64,
}

impl CampaignStats {
    pub fn completed(&self) -> u64 {
        self.sent.saturating_add(self.failed)
    }

    /// `sent + failed <= audience_size`
    pub fn is_consistent(&self) -> bool {
        self.completed() <= self.audience_size
    }

    /// Share of the audience already processed, in `[0, 100]`. Zero-audience
    /// campaigns report 0.
    pub fn progress_percent(&self) -> f64 {
        if self.audience_size == 0 {
            return 0.0;
        }
        let progress = self.completed() as f64 / self.audience_size as f64 * 100.0;
        progress.min(100.0)
    }
}

// ─── Delivery Log ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLog {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub campaign_id: CampaignId,
    pub customer_id: String,
    #[serde(default)]
    pub message: String,
    pub status: LogStatus,
    #[serde(default)]
    pub delivery_receipt: DeliveryReceipt,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "sent")]
    Sent,
    #[serde(alias = "failed")]
    Failed,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogStatus::Pending => "PENDING",
            LogStatus::Sent => "SENT",
            LogStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ─── Draft ─────────────────────────────────────────────────────────────────

/// Campaign fields edited before the first save.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignDraft {
    pub name: String,
    pub description: String,
    pub message_content: String,
    pub message_template: String,
}

impl Default for CampaignDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            message_content: String::new(),
            message_template: default_message_template(),
        }
    }
}

impl CampaignDraft {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        message_content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            message_content: normalize_message(&message_content.into()),
            ..Self::default()
        }
    }

    pub fn set_message_content(&mut self, content: &str) {
        self.message_content = normalize_message(content);
    }

    /// Checks the required fields in display order and names the first missing one.
    pub fn validate(&self) -> CampaignResult<()> {
        let required = [
            ("name", &self.name),
            ("description", &self.description),
            ("messageContent", &self.message_content),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CampaignError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }

    pub fn segment_name(&self) -> String {
        format!("{} Segment", self.name)
    }

    pub fn render_for(&self, customer_name: &str) -> String {
        render_message(&self.message_template, customer_name, &self.message_content)
    }
}

/// Collapses a doubled greeting, which appears when a suggestion that already
/// starts with the greeting is pasted behind the template's own.
pub fn normalize_message(text: &str) -> String {
    if text.contains(DUPLICATED_GREETING) {
        text.replacen(DUPLICATED_GREETING, GREETING, 1)
    } else {
        text.to_string()
    }
}

pub fn render_message(template: &str, customer_name: &str, message: &str) -> String {
    template
        .replace(CUSTOMER_NAME_PLACEHOLDER, customer_name)
        .replace(MESSAGE_PLACEHOLDER, message)
}
