use std::collections::BTreeSet;

use sp_core::crypto::AccountId32;

use crate::chain::{ChainCall, EraIndex};
use crate::rewards::RewardRow;

/// One pending claim action.
#[derive(Debug, Clone)]
pub struct PayoutOperation {
    pub validator: AccountId32,
    pub era: EraIndex,
    pub amount: u128,
}

/// The claim operations for one signing identity.
#[derive(Debug, Clone)]
pub struct Batch {
    pub operations: Vec<PayoutOperation>,
    pub atomic: bool,
}

impl Batch {
    /// The calls to submit: a single multi-call extrinsic when the runtime
    /// supports it, otherwise one call per operation.
    pub fn to_calls(&self) -> Vec<ChainCall> {
        let calls: Vec<ChainCall> = self
            .operations
            .iter()
            .map(|op| ChainCall::PayoutStakers {
                validator: op.validator.clone(),
                era: op.era,
            })
            .collect();

        if self.atomic {
            vec![ChainCall::Batch(calls)]
        } else {
            calls
        }
    }

    pub fn total_amount(&self) -> u128 {
        self.operations.iter().map(|op| op.amount).sum()
    }
}

#[derive(Debug, Clone)]
pub enum PlanOutcome {
    NothingToClaim,
    BelowThreshold { pending: usize, required: usize },
    Planned(Batch),
}

/// Decide whether the pending unclaimed rewards for one signing identity
/// justify a claim run. The threshold counts distinct eras with something
/// to claim; an operation is produced per (era, validator) pair with a
/// non-zero amount.
pub fn plan(rows: &[RewardRow], min_eras: usize, atomic: bool) -> PlanOutcome {
    let operations: Vec<PayoutOperation> = rows
        .iter()
        .filter(|row| !row.claimed && row.amount > 0)
        .map(|row| PayoutOperation {
            validator: row.account.clone(),
            era: row.era,
            amount: row.amount,
        })
        .collect();

    let pending_eras: BTreeSet<EraIndex> = operations.iter().map(|op| op.era).collect();

    if pending_eras.is_empty() {
        return PlanOutcome::NothingToClaim;
    }
    if pending_eras.len() < min_eras {
        return PlanOutcome::BelowThreshold {
            pending: pending_eras.len(),
            required: min_eras,
        };
    }

    PlanOutcome::Planned(Batch { operations, atomic })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(tag: u8) -> AccountId32 {
        AccountId32::new([tag; 32])
    }

    fn row(era: EraIndex, amount: u128, claimed: bool) -> RewardRow {
        RewardRow {
            era,
            account: account(1),
            amount,
            claimed,
        }
    }

    #[test]
    fn no_pending_rewards_is_nothing_to_claim() {
        assert!(matches!(plan(&[], 5, true), PlanOutcome::NothingToClaim));

        let all_claimed = vec![row(1, 100, true), row(2, 100, true)];
        assert!(matches!(
            plan(&all_claimed, 5, true),
            PlanOutcome::NothingToClaim
        ));
    }

    #[test]
    fn below_threshold_reports_actual_vs_required() {
        let rows = vec![row(1, 100, false), row(2, 100, false), row(3, 100, false)];
        match plan(&rows, 5, true) {
            PlanOutcome::BelowThreshold { pending, required } => {
                assert_eq!(pending, 3);
                assert_eq!(required, 5);
            }
            other => panic!("expected BelowThreshold, got {:?}", other),
        }
    }

    #[test]
    fn at_threshold_emits_exactly_one_batch() {
        let rows: Vec<RewardRow> = (1..=10).map(|era| row(era, 100, false)).collect();
        match plan(&rows, 5, true) {
            PlanOutcome::Planned(batch) => {
                assert_eq!(batch.operations.len(), 10);
                assert!(batch.atomic);
                assert_eq!(batch.to_calls().len(), 1);
                assert_eq!(batch.total_amount(), 1_000);
            }
            other => panic!("expected Planned, got {:?}", other),
        }
    }

    #[test]
    fn non_atomic_batch_yields_one_call_per_operation() {
        let rows: Vec<RewardRow> = (1..=6).map(|era| row(era, 100, false)).collect();
        match plan(&rows, 5, false) {
            PlanOutcome::Planned(batch) => {
                assert!(!batch.atomic);
                assert_eq!(batch.to_calls().len(), 6);
            }
            other => panic!("expected Planned, got {:?}", other),
        }
    }

    #[test]
    fn zero_amount_and_claimed_entries_never_become_operations() {
        let mut rows: Vec<RewardRow> = (1..=6).map(|era| row(era, 100, false)).collect();
        rows.push(row(7, 0, false));
        rows.push(row(8, 100, true));

        match plan(&rows, 5, true) {
            PlanOutcome::Planned(batch) => {
                assert_eq!(batch.operations.len(), 6);
                assert!(batch.operations.iter().all(|op| op.era <= 6));
            }
            other => panic!("expected Planned, got {:?}", other),
        }
    }

    #[test]
    fn threshold_counts_eras_not_operations() {
        // Two validators in each of three eras: six operations, three eras.
        let mut rows = Vec::new();
        for era in 1..=3 {
            rows.push(RewardRow {
                era,
                account: account(1),
                amount: 100,
                claimed: false,
            });
            rows.push(RewardRow {
                era,
                account: account(2),
                amount: 100,
                claimed: false,
            });
        }

        assert!(matches!(
            plan(&rows, 5, true),
            PlanOutcome::BelowThreshold { pending: 3, .. }
        ));
    }
}
