use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use codec::Decode;
use sp_core::crypto::AccountId32;
use sp_core::H256;

use crate::chain::calls::ChainCall;
use crate::chain::keys::SigningIdentity;
use crate::error::Result;

pub type EraIndex = u32;

/// Reward points accrued in one era: the era total plus each validator's
/// individual share.
#[derive(Debug, Clone, Default, Decode)]
pub struct EraRewardPoints {
    pub total: u32,
    pub individual: BTreeMap<AccountId32, u32>,
}

/// Free balance and next nonce of an account, read together so a submission
/// decision always works from one consistent snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AccountStatus {
    pub free: u128,
    pub nonce: u32,
}

#[derive(Debug, Clone)]
pub struct ChainProperties {
    pub token_decimals: u32,
    pub token_symbol: String,
    pub ss58_prefix: u16,
}

/// Outcome of one signed submission, as far as the node reports it.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub extrinsic_hash: H256,
    pub block_hash: Option<H256>,
    pub fee: u128,
    pub success: bool,
    pub error_detail: Option<String>,
}

/// Everything the payout logic needs from a chain node. Query methods return
/// `None` for records the chain has pruned or never wrote; that is ordinary
/// data absence, not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn properties(&self) -> Result<ChainProperties>;

    async fn active_era(&self) -> Result<EraIndex>;

    async fn reward_points(&self, era: EraIndex) -> Result<Option<EraRewardPoints>>;

    async fn reward_pool(&self, era: EraIndex) -> Result<Option<u128>>;

    /// Eras the account's staking ledger records as already claimed. The
    /// ledger path is deprecated chain-side; any failure reads as `None`.
    async fn legacy_claims(&self, account: &AccountId32) -> Result<Option<BTreeSet<EraIndex>>>;

    /// Accounts recorded as claimed for the era under the current
    /// per-era claim map.
    async fn current_claims(&self, era: EraIndex) -> Result<Option<BTreeSet<AccountId32>>>;

    async fn account_status(&self, account: &AccountId32) -> Result<AccountStatus>;

    async fn existential_deposit(&self) -> Result<u128>;

    /// Whether the runtime exposes an atomic multi-call batch extrinsic.
    async fn supports_atomic_batch(&self) -> Result<bool>;

    async fn estimate_fee(&self, call: &ChainCall) -> Result<u128>;

    async fn sign_and_submit(
        &self,
        call: &ChainCall,
        identity: &SigningIdentity,
        nonce: u32,
    ) -> Result<SubmissionReceipt>;
}
