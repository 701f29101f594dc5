//! `promoforge-campaign` — campaign lifecycle domain.
//!
//! Pure domain: the campaign entity, its status state machine, the close
//! sequence stages, lifecycle event payloads, the critical-failure pattern
//! set, and reward math. No IO, no async.

pub mod campaign;
pub mod events;
pub mod failure;
pub mod log;
pub mod rewards;
pub mod stage;
pub mod status;

pub use campaign::{Campaign, FundingType, Owner};
pub use failure::CriticalFailures;
pub use log::CampaignLogEntry;
pub use rewards::{EngagementReport, RewardOutcome};
pub use stage::CloseStage;
pub use status::CampaignStatus;
