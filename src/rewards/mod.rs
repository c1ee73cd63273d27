pub mod allocator;
pub mod claims;
pub mod filter;
pub mod snapshot;

pub use allocator::{allocate, EraAmounts};
pub use claims::{ClaimEvidence, ClaimSet};
pub use filter::{effective_scope, scoped_rewards, RewardRow};
pub use snapshot::EraSnapshot;

use sp_core::crypto::AccountId32;

use crate::chain::{ChainClient, EraIndex};
use crate::error::Result;

/// Read-only reward report over an era range: amount and claim status per
/// (era, account), ordered for display.
pub async fn list_rewards(
    client: &dyn ChainClient,
    start: EraIndex,
    end: EraIndex,
    scope: &[AccountId32],
    unclaimed_only: bool,
) -> Result<Vec<RewardRow>> {
    let snapshot = EraSnapshot::fetch(client, start, end, scope).await?;
    let amounts = allocate(&snapshot);
    let claims = ClaimSet::from_snapshot(&snapshot);
    Ok(scoped_rewards(&amounts, &claims, scope, unclaimed_only))
}
