use sp_core::H256;
use tracing::{debug, info, warn};

use crate::chain::{ChainCall, ChainClient, SigningIdentity};
use crate::error::Result;
use crate::payout::planner::Batch;

/// Progress of one submission unit through the pre-flight and submission
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Planned,
    FeeEstimated,
    BalanceChecked,
    Signed,
    Submitted,
    Included,
    Failed,
}

/// Terminal outcome of one unit, distinguishable per failure kind.
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    Included {
        extrinsic_hash: H256,
        block_hash: Option<H256>,
        fee: u128,
    },
    InsufficientFunds {
        needed: u128,
        available: u128,
    },
    SubmissionFailed {
        extrinsic_hash: Option<H256>,
        detail: String,
    },
    DryRun {
        fee: u128,
    },
}

#[derive(Debug, Clone)]
pub struct OperationResult {
    pub label: String,
    pub state: SubmissionState,
    pub outcome: OperationOutcome,
}

impl OperationResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Included { .. })
    }
}

/// Drives planned claim calls through fee estimation, the balance safety
/// check, signing and submission. Signing never happens unless the account
/// keeps its existential deposit after paying the estimated fee.
pub struct SubmissionPipeline<'a> {
    client: &'a dyn ChainClient,
    identity: &'a SigningIdentity,
    dry_run: bool,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(client: &'a dyn ChainClient, identity: &'a SigningIdentity, dry_run: bool) -> Self {
        Self {
            client,
            identity,
            dry_run,
        }
    }

    /// Submit a planned batch. In the sequential mode every call gets its
    /// own fee and balance check against fresh account state; a funds
    /// shortfall stops the remaining calls (they would hit the same wall),
    /// a chain-side rejection does not.
    pub async fn submit(&self, batch: &Batch) -> Result<Vec<OperationResult>> {
        let mut results = Vec::new();

        for call in batch.to_calls() {
            let result = self.submit_one(&call).await?;
            let shortfall = matches!(result.outcome, OperationOutcome::InsufficientFunds { .. });
            results.push(result);
            if shortfall {
                warn!("stopping batch: signing account cannot fund further submissions");
                break;
            }
        }

        Ok(results)
    }

    async fn submit_one(&self, call: &ChainCall) -> Result<OperationResult> {
        let label = call.label();
        let mut state = SubmissionState::Planned;

        let fee = self.client.estimate_fee(call).await?;
        advance(&label, &mut state, SubmissionState::FeeEstimated);

        // Balance and nonce are read together, immediately before signing,
        // so sequential submissions always see the moved balance and the
        // next nonce.
        let status = self.client.account_status(&self.identity.account()).await?;
        let existential_deposit = self.client.existential_deposit().await?;

        if status.free.saturating_sub(fee) < existential_deposit {
            let needed = existential_deposit.saturating_add(fee);
            warn!(
                "not signing {}: needed {}, but account holds {}",
                label, needed, status.free
            );
            advance(&label, &mut state, SubmissionState::Failed);
            return Ok(OperationResult {
                label,
                state,
                outcome: OperationOutcome::InsufficientFunds {
                    needed,
                    available: status.free,
                },
            });
        }
        advance(&label, &mut state, SubmissionState::BalanceChecked);

        if self.dry_run {
            info!("dry run: would submit {} (fee {})", label, fee);
            return Ok(OperationResult {
                label,
                state,
                outcome: OperationOutcome::DryRun { fee },
            });
        }

        advance(&label, &mut state, SubmissionState::Signed);
        advance(&label, &mut state, SubmissionState::Submitted);
        let receipt = self
            .client
            .sign_and_submit(call, self.identity, status.nonce)
            .await?;

        if receipt.success {
            advance(&label, &mut state, SubmissionState::Included);
            info!(
                "{} included in {:?} (fee {})",
                label, receipt.block_hash, receipt.fee
            );
            Ok(OperationResult {
                label,
                state,
                outcome: OperationOutcome::Included {
                    extrinsic_hash: receipt.extrinsic_hash,
                    block_hash: receipt.block_hash,
                    fee: receipt.fee,
                },
            })
        } else {
            let detail = receipt
                .error_detail
                .unwrap_or_else(|| "no error detail reported".to_string());
            warn!("{} failed: {}", label, detail);
            advance(&label, &mut state, SubmissionState::Failed);
            Ok(OperationResult {
                label,
                state,
                outcome: OperationOutcome::SubmissionFailed {
                    extrinsic_hash: Some(receipt.extrinsic_hash),
                    detail,
                },
            })
        }
    }
}

fn advance(label: &str, state: &mut SubmissionState, next: SubmissionState) {
    debug!("{}: {:?} -> {:?}", label, state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::{AccountStatus, MockChainClient, SubmissionReceipt};
    use crate::config::SigningConfig;
    use crate::payout::planner::PayoutOperation;
    use sp_core::crypto::{AccountId32, Ss58AddressFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity() -> SigningIdentity {
        let signing = SigningConfig {
            uri: Some("//Alice".to_string()),
            seed: None,
            mnemonic: None,
        };
        SigningIdentity::from_config(&signing, Ss58AddressFormat::custom(42)).unwrap()
    }

    fn batch(operations: usize, atomic: bool) -> Batch {
        Batch {
            operations: (0..operations)
                .map(|i| PayoutOperation {
                    validator: AccountId32::new([1u8; 32]),
                    era: 100 + i as u32,
                    amount: 1_000,
                })
                .collect(),
            atomic,
        }
    }

    fn receipt(success: bool) -> SubmissionReceipt {
        SubmissionReceipt {
            extrinsic_hash: H256([9u8; 32]),
            block_hash: success.then(|| H256([8u8; 32])),
            fee: 120,
            success,
            error_detail: (!success).then(|| "BadOrigin".to_string()),
        }
    }

    #[tokio::test]
    async fn insufficient_funds_aborts_before_signing() {
        let mut client = MockChainClient::new();
        client.expect_estimate_fee().returning(|_| Ok(100));
        client
            .expect_account_status()
            .returning(|_| Ok(AccountStatus { free: 500, nonce: 7 }));
        client.expect_existential_deposit().returning(|| Ok(450));
        // 500 - 100 < 450: the signer must never be invoked.
        client.expect_sign_and_submit().times(0);

        let id = identity();
        let pipeline = SubmissionPipeline::new(&client, &id, false);
        let results = pipeline.submit(&batch(10, true)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].state, SubmissionState::Failed);
        match &results[0].outcome {
            OperationOutcome::InsufficientFunds { needed, available } => {
                assert_eq!(*needed, 550);
                assert_eq!(*available, 500);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn atomic_batch_is_one_submission() {
        let mut client = MockChainClient::new();
        client.expect_estimate_fee().times(1).returning(|_| Ok(100));
        client
            .expect_account_status()
            .times(1)
            .returning(|_| Ok(AccountStatus { free: 1_000_000, nonce: 3 }));
        client.expect_existential_deposit().returning(|| Ok(500));
        client
            .expect_sign_and_submit()
            .times(1)
            .withf(|_, _, nonce| *nonce == 3)
            .returning(|_, _, _| Ok(receipt(true)));

        let id = identity();
        let pipeline = SubmissionPipeline::new(&client, &id, false);
        let results = pipeline.submit(&batch(4, true)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].succeeded());
        assert_eq!(results[0].state, SubmissionState::Included);
    }

    #[tokio::test]
    async fn sequential_calls_recheck_balance_and_refetch_nonce() {
        let mut client = MockChainClient::new();
        client.expect_estimate_fee().returning(|_| Ok(100));

        let reads = AtomicUsize::new(0);
        client.expect_account_status().returning(move |_| {
            let call = reads.fetch_add(1, Ordering::SeqCst);
            Ok(AccountStatus {
                // The balance moves and the nonce advances between calls.
                free: 1_000_000 - 200 * call as u128,
                nonce: 3 + call as u32,
            })
        });
        client.expect_existential_deposit().returning(|| Ok(500));

        let nonces = AtomicUsize::new(3);
        client
            .expect_sign_and_submit()
            .times(3)
            .returning(move |_, _, nonce| {
                assert_eq!(nonce as usize, nonces.fetch_add(1, Ordering::SeqCst));
                Ok(receipt(true))
            });

        let id = identity();
        let pipeline = SubmissionPipeline::new(&client, &id, false);
        let results = pipeline.submit(&batch(3, false)).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.succeeded()));
    }

    #[tokio::test]
    async fn sequential_shortfall_stops_remaining_calls() {
        let mut client = MockChainClient::new();
        client.expect_estimate_fee().returning(|_| Ok(100));

        let reads = AtomicUsize::new(0);
        client.expect_account_status().returning(move |_| {
            let call = reads.fetch_add(1, Ordering::SeqCst);
            Ok(AccountStatus {
                free: if call == 0 { 1_000_000 } else { 400 },
                nonce: call as u32,
            })
        });
        client.expect_existential_deposit().returning(|| Ok(500));
        client
            .expect_sign_and_submit()
            .times(1)
            .returning(|_, _, _| Ok(receipt(true)));

        let id = identity();
        let pipeline = SubmissionPipeline::new(&client, &id, false);
        let results = pipeline.submit(&batch(3, false)).await.unwrap();

        // First call lands, second hits the shortfall, third never runs.
        assert_eq!(results.len(), 2);
        assert!(results[0].succeeded());
        assert!(matches!(
            results[1].outcome,
            OperationOutcome::InsufficientFunds { .. }
        ));
    }

    #[tokio::test]
    async fn chain_rejection_does_not_stop_siblings() {
        let mut client = MockChainClient::new();
        client.expect_estimate_fee().returning(|_| Ok(100));
        client
            .expect_account_status()
            .returning(|_| Ok(AccountStatus { free: 1_000_000, nonce: 0 }));
        client.expect_existential_deposit().returning(|| Ok(500));

        let submissions = AtomicUsize::new(0);
        client
            .expect_sign_and_submit()
            .times(2)
            .returning(move |_, _, _| {
                let call = submissions.fetch_add(1, Ordering::SeqCst);
                Ok(receipt(call != 0))
            });

        let id = identity();
        let pipeline = SubmissionPipeline::new(&client, &id, false);
        let results = pipeline.submit(&batch(2, false)).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0].outcome,
            OperationOutcome::SubmissionFailed { .. }
        ));
        assert!(results[1].succeeded());
    }

    #[tokio::test]
    async fn dry_run_estimates_and_checks_but_never_signs() {
        let mut client = MockChainClient::new();
        client.expect_estimate_fee().times(1).returning(|_| Ok(100));
        client
            .expect_account_status()
            .returning(|_| Ok(AccountStatus { free: 1_000_000, nonce: 0 }));
        client.expect_existential_deposit().returning(|| Ok(500));
        client.expect_sign_and_submit().times(0);

        let id = identity();
        let pipeline = SubmissionPipeline::new(&client, &id, true);
        let results = pipeline.submit(&batch(5, true)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].state, SubmissionState::BalanceChecked);
        assert!(matches!(
            results[0].outcome,
            OperationOutcome::DryRun { fee: 100 }
        ));
    }
}
