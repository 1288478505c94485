//! Campaign authoring and lifecycle against the campaign backend.
//!
//! [`CampaignBuilder`] drives the segment-then-campaign save,
//! [`CampaignLifecycle`] the `draft -> running` start, and
//! [`HttpCampaignApi`] is the REST implementation of [`CampaignApi`].

pub mod api;
pub mod builder;
pub mod client;
pub mod lifecycle;
pub mod models;

#[cfg(test)]
mod testing;

pub use api::CampaignApi;
pub use builder::{audience_hint, CampaignBuilder, SavedCampaign};
pub use client::HttpCampaignApi;
pub use lifecycle::{can_transition, CampaignLifecycle, StateTransition, TRANSITIONS};
pub use models::DeliveryReport;
