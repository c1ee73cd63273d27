use std::collections::BTreeSet;

use sp_core::crypto::AccountId32;

use crate::chain::EraIndex;
use crate::rewards::snapshot::EraSnapshot;

/// One source of evidence that a reward was already claimed. The chain keeps
/// two parallel claim records while its tracking migrates; they combine by
/// OR, and a future representation is one more variant here rather than a
/// change at the call sites.
#[derive(Debug, Clone)]
pub enum ClaimEvidence {
    /// Era set from an account's staking ledger (legacy record).
    LegacyLedger {
        account: AccountId32,
        eras: BTreeSet<EraIndex>,
    },
    /// Accounts listed in an era's claimants map (current record).
    EraClaimants {
        era: EraIndex,
        accounts: BTreeSet<AccountId32>,
    },
}

impl ClaimEvidence {
    fn covers(&self, era: EraIndex, account: &AccountId32) -> bool {
        match self {
            ClaimEvidence::LegacyLedger { account: owner, eras } => {
                owner == account && eras.contains(&era)
            }
            ClaimEvidence::EraClaimants { era: at, accounts } => {
                *at == era && accounts.contains(account)
            }
        }
    }
}

/// Merged claim view over every evidence source fetched this run. A unit is
/// claimed as soon as any source says so; a source with no data contributes
/// nothing either way.
#[derive(Debug, Default)]
pub struct ClaimSet {
    evidence: Vec<ClaimEvidence>,
}

impl ClaimSet {
    pub fn new(evidence: Vec<ClaimEvidence>) -> Self {
        Self { evidence }
    }

    pub fn from_snapshot(snapshot: &EraSnapshot) -> Self {
        let mut evidence = Vec::new();

        for (account, eras) in &snapshot.ledgers {
            evidence.push(ClaimEvidence::LegacyLedger {
                account: account.clone(),
                eras: eras.clone(),
            });
        }
        for (era, accounts) in &snapshot.claimants {
            evidence.push(ClaimEvidence::EraClaimants {
                era: *era,
                accounts: accounts.clone(),
            });
        }

        Self { evidence }
    }

    pub fn is_claimed(&self, era: EraIndex, account: &AccountId32) -> bool {
        self.evidence.iter().any(|e| e.covers(era, account))
    }
}
