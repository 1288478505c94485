pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult};
pub use types::{
    Campaign, CampaignDraft, CampaignId, CampaignStats, CampaignStatus, DeliveryLog,
    DeliveryReceipt, LogStatus, SegmentId,
};
