use campaign_core::{CampaignId, CampaignStats, CampaignStatus, DeliveryLog, LogStatus};
use campaign_management::DeliveryReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Log entries per delivery status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryCounts {
    pub fn tally(logs: &[DeliveryLog]) -> Self {
        logs.iter().fold(Self::default(), |mut counts, log| {
            match log.status {
                LogStatus::Pending => counts.pending += 1,
                LogStatus::Sent => counts.sent += 1,
                LogStatus::Failed => counts.failed += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.pending + self.sent + self.failed
    }
}

/// The tracker's view of one campaign after a successful fetch. Each snapshot
/// replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySnapshot {
    pub campaign_id: CampaignId,
    pub status: CampaignStatus,
    pub stats: CampaignStats,
    pub progress_percent: f64,
    pub counts: DeliveryCounts,
    pub logs: Vec<DeliveryLog>,
    pub fetched_at: DateTime<Utc>,
}

impl DeliverySnapshot {
    pub fn from_report(campaign_id: &CampaignId, report: DeliveryReport) -> Self {
        if !report.stats.is_consistent() {
            warn!(
                campaign_id = %campaign_id,
                audience_size = report.stats.audience_size,
                sent = report.stats.sent,
                failed = report.stats.failed,
                "Delivery stats exceed audience size, clamping progress"
            );
        }

        let mut logs = report.logs;
        let before = logs.len();
        logs.retain(|log| &log.campaign_id == campaign_id);
        if logs.len() != before {
            warn!(
                campaign_id = %campaign_id,
                dropped = before - logs.len(),
                "Dropped delivery logs belonging to another campaign"
            );
        }

        Self {
            campaign_id: campaign_id.clone(),
            status: report.campaign_status,
            stats: report.stats,
            progress_percent: report.stats.progress_percent(),
            counts: DeliveryCounts::tally(&logs),
            logs,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}
