use std::collections::{BTreeMap, BTreeSet};

use indicatif::ProgressBar;
use sp_core::crypto::AccountId32;
use tracing::debug;

use crate::chain::{ChainClient, EraIndex, EraRewardPoints};
use crate::error::Result;

/// Every chain record one run needs, fetched once up front and shared by the
/// allocator and the claim resolver. Lives exactly as long as the invocation
/// that built it.
pub struct EraSnapshot {
    pub start: EraIndex,
    pub end: EraIndex,
    pub points: BTreeMap<EraIndex, EraRewardPoints>,
    pub pools: BTreeMap<EraIndex, u128>,
    pub claimants: BTreeMap<EraIndex, BTreeSet<AccountId32>>,
    pub ledgers: BTreeMap<AccountId32, BTreeSet<EraIndex>>,
}

impl EraSnapshot {
    /// Scan `[start, end)` and the given accounts. Eras without records are
    /// simply not present in the maps; pruned or future data is expected.
    pub async fn fetch(
        client: &dyn ChainClient,
        start: EraIndex,
        end: EraIndex,
        accounts: &[AccountId32],
    ) -> Result<Self> {
        let mut snapshot = Self {
            start,
            end,
            points: BTreeMap::new(),
            pools: BTreeMap::new(),
            claimants: BTreeMap::new(),
            ledgers: BTreeMap::new(),
        };

        let progress = ProgressBar::new(u64::from(end.saturating_sub(start)));
        progress.set_message("scanning eras");

        for era in start..end {
            if let Some(points) = client.reward_points(era).await? {
                snapshot.points.insert(era, points);
            }
            if let Some(pool) = client.reward_pool(era).await? {
                snapshot.pools.insert(era, pool);
            }
            if let Some(claimants) = client.current_claims(era).await? {
                snapshot.claimants.insert(era, claimants);
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        for account in accounts {
            if let Some(eras) = client.legacy_claims(account).await? {
                snapshot.ledgers.insert(account.clone(), eras);
            }
        }

        debug!(
            "snapshot [{}, {}): {} eras with points, {} with pools, {} ledgers",
            start,
            end,
            snapshot.points.len(),
            snapshot.pools.len(),
            snapshot.ledgers.len()
        );

        Ok(snapshot)
    }
}
