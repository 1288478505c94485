//! Delivery tracking: polls a running campaign's delivery report and
//! publishes progress snapshots until the campaign leaves `running`.

pub mod progress;
pub mod tracker;

pub use progress::{DeliveryCounts, DeliverySnapshot};
pub use tracker::{DeliverySource, DeliveryTracker, TrackerExit, TrackerHandle, TrackerState};
