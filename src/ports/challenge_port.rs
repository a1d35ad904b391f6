//! Challenge store port trait.

use crate::domain::challenge::{Challenge, ChallengePlan};
use crate::domain::error::PropdeskError;

pub trait ChallengeStorePort {
    /// The user's currently active challenge, if any.
    fn active_challenge(&self, user_id: &str) -> Result<Option<Challenge>, PropdeskError>;

    /// Persist balance and progress fields after an order settles.
    fn update_challenge(&self, challenge: &Challenge) -> Result<(), PropdeskError>;

    fn list_plans(&self) -> Result<Vec<ChallengePlan>, PropdeskError>;
}
