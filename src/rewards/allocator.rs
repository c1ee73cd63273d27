use std::collections::BTreeMap;

use sp_core::crypto::AccountId32;
use sp_core::U256;

use crate::chain::EraIndex;
use crate::rewards::snapshot::EraSnapshot;

/// Per-era, per-validator amounts in the chain's smallest unit.
pub type EraAmounts = BTreeMap<EraIndex, BTreeMap<AccountId32, u128>>;

/// Turn raw era points into monetary amounts for every era where both the
/// points and the pool record exist. Each validator receives
/// `points * pool / total_points`, floor division, computed through 256 bits
/// so the widening multiply cannot overflow.
pub fn allocate(snapshot: &EraSnapshot) -> EraAmounts {
    let mut amounts = EraAmounts::new();

    for (era, points) in &snapshot.points {
        let Some(pool) = snapshot.pools.get(era) else {
            continue;
        };
        if points.total == 0 {
            continue;
        }

        let mut per_validator = BTreeMap::new();
        for (validator, share) in &points.individual {
            let amount = U256::from(*share) * U256::from(*pool) / U256::from(points.total);
            per_validator.insert(
                validator.clone(),
                amount.min(U256::from(u128::MAX)).as_u128(),
            );
        }
        amounts.insert(*era, per_validator);
    }

    amounts
}
