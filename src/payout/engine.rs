use sp_core::crypto::{AccountId32, Ss58AddressFormat};
use tracing::info;

use crate::chain::{ChainClient, SigningIdentity};
use crate::config::ResolvedAccount;
use crate::error::Result;
use crate::payout::pipeline::{OperationResult, SubmissionPipeline};
use crate::payout::planner::{plan, PlanOutcome};
use crate::rewards::{allocate, scoped_rewards, ClaimSet, EraSnapshot};
use crate::utils::parse_account;

/// Why a pay run made no submission for an identity.
#[derive(Debug, Clone)]
pub enum SkipReason {
    NothingToClaim { depth_eras: u32 },
    BelowThreshold { pending: usize, required: usize },
}

/// Outcome of the pay path for one signing identity.
#[derive(Debug)]
pub struct PayReport {
    pub signer: String,
    pub accounts: Vec<AccountId32>,
    pub attempted: bool,
    pub skipped: Option<SkipReason>,
    pub operations: Vec<OperationResult>,
}

/// Validators sharing one signing identity, with the thresholds resolved
/// for the whole group.
pub struct IdentityGroup {
    pub identity: SigningIdentity,
    pub accounts: Vec<AccountId32>,
    pub min_eras: u32,
    pub depth_eras: u32,
}

impl IdentityGroup {
    /// Group resolved accounts by signer; accounts sharing a signer claim in
    /// one batch. A group takes the most conservative settings among its
    /// members: the largest claim threshold and the deepest lookback.
    pub fn build(
        resolved: &[ResolvedAccount],
        ss58_format: Ss58AddressFormat,
    ) -> Result<Vec<IdentityGroup>> {
        let mut groups: Vec<IdentityGroup> = Vec::new();

        for account in resolved {
            let identity = SigningIdentity::from_config(&account.signing, ss58_format)?;
            let account_id = parse_account(&account.address)?;

            let existing = groups
                .iter()
                .position(|g| g.identity.address() == identity.address());
            match existing {
                Some(i) => {
                    let group = &mut groups[i];
                    group.accounts.push(account_id);
                    group.min_eras = group.min_eras.max(account.min_eras);
                    group.depth_eras = group.depth_eras.max(account.depth_eras);
                }
                None => groups.push(IdentityGroup {
                    identity,
                    accounts: vec![account_id],
                    min_eras: account.min_eras,
                    depth_eras: account.depth_eras,
                }),
            }
        }

        Ok(groups)
    }
}

/// Runs the full claim sequence for identity groups: snapshot the era range,
/// compute amounts, resolve claims, filter, apply the threshold, submit.
pub struct PayoutEngine<'a> {
    client: &'a dyn ChainClient,
    dry_run: bool,
}

impl<'a> PayoutEngine<'a> {
    pub fn new(client: &'a dyn ChainClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    pub async fn pay_rewards(&self, group: &IdentityGroup) -> Result<PayReport> {
        let active_era = self.client.active_era().await?;
        let start = active_era.saturating_sub(group.depth_eras);

        let snapshot = EraSnapshot::fetch(self.client, start, active_era, &group.accounts).await?;
        let amounts = allocate(&snapshot);
        let claims = ClaimSet::from_snapshot(&snapshot);
        let rows = scoped_rewards(&amounts, &claims, &group.accounts, true);

        let atomic = self.client.supports_atomic_batch().await?;

        let report = |attempted, skipped, operations| PayReport {
            signer: group.identity.address(),
            accounts: group.accounts.clone(),
            attempted,
            skipped,
            operations,
        };

        match plan(&rows, group.min_eras as usize, atomic) {
            PlanOutcome::NothingToClaim => {
                info!(
                    "{}: no rewards to claim in the last {} era(s)",
                    group.identity.address(),
                    group.depth_eras
                );
                Ok(report(
                    false,
                    Some(SkipReason::NothingToClaim {
                        depth_eras: group.depth_eras,
                    }),
                    Vec::new(),
                ))
            }
            PlanOutcome::BelowThreshold { pending, required } => {
                info!(
                    "{}: rewards pending in {} era(s), below the {} era threshold",
                    group.identity.address(),
                    pending,
                    required
                );
                Ok(report(
                    false,
                    Some(SkipReason::BelowThreshold { pending, required }),
                    Vec::new(),
                ))
            }
            PlanOutcome::Planned(batch) => {
                info!(
                    "{}: claiming {} payout(s) across {} era(s){}",
                    group.identity.address(),
                    batch.operations.len(),
                    batch
                        .operations
                        .iter()
                        .map(|op| op.era)
                        .collect::<std::collections::BTreeSet<_>>()
                        .len(),
                    if batch.atomic { " in one batch" } else { "" }
                );
                let pipeline = SubmissionPipeline::new(self.client, &group.identity, self.dry_run);
                let operations = pipeline.submit(&batch).await?;
                Ok(report(true, None, operations))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::{AccountStatus, MockChainClient};
    use crate::chain::EraRewardPoints;
    use crate::config::SigningConfig;
    use crate::payout::pipeline::OperationOutcome;
    use std::collections::{BTreeMap, BTreeSet};

    fn group(min_eras: u32, depth_eras: u32) -> IdentityGroup {
        let signing = SigningConfig {
            uri: Some("//Alice".to_string()),
            seed: None,
            mnemonic: None,
        };
        let identity =
            SigningIdentity::from_config(&signing, Ss58AddressFormat::custom(42)).unwrap();
        let accounts = vec![identity.account()];
        IdentityGroup {
            identity,
            accounts,
            min_eras,
            depth_eras,
        }
    }

    fn client_with_pending_eras(pending: u32) -> MockChainClient {
        let mut client = MockChainClient::new();
        client.expect_active_era().returning(|| Ok(100));

        let first_rewarded = 100 - pending;
        client.expect_reward_points().returning(move |era| {
            if era < first_rewarded {
                return Ok(None);
            }
            let signing = SigningConfig {
                uri: Some("//Alice".to_string()),
                seed: None,
                mnemonic: None,
            };
            let validator =
                SigningIdentity::from_config(&signing, Ss58AddressFormat::custom(42))
                    .unwrap()
                    .account();
            let mut individual = BTreeMap::new();
            individual.insert(validator, 400u32);
            Ok(Some(EraRewardPoints {
                total: 1000,
                individual,
            }))
        });
        client
            .expect_reward_pool()
            .returning(move |era| Ok((era >= first_rewarded).then_some(2_000_000u128)));
        client
            .expect_current_claims()
            .returning(|_| Ok(Some(BTreeSet::new())));
        client.expect_legacy_claims().returning(|_| Ok(None));
        client.expect_supports_atomic_batch().returning(|| Ok(true));
        client
    }

    #[tokio::test]
    async fn below_threshold_makes_no_submission() {
        let mut client = client_with_pending_eras(3);
        client.expect_estimate_fee().times(0);
        client.expect_sign_and_submit().times(0);

        let engine = PayoutEngine::new(&client, false);
        let report = engine.pay_rewards(&group(5, 10)).await.unwrap();

        assert!(!report.attempted);
        assert!(matches!(
            report.skipped,
            Some(SkipReason::BelowThreshold {
                pending: 3,
                required: 5
            })
        ));
        assert!(report.operations.is_empty());
    }

    #[tokio::test]
    async fn insufficient_funds_is_reported_before_any_signing() {
        let mut client = client_with_pending_eras(10);
        client.expect_estimate_fee().returning(|_| Ok(1_000));
        client.expect_account_status().returning(|_| {
            Ok(AccountStatus {
                free: 1_500,
                nonce: 0,
            })
        });
        client.expect_existential_deposit().returning(|| Ok(1_000));
        client.expect_sign_and_submit().times(0);

        let engine = PayoutEngine::new(&client, false);
        let report = engine.pay_rewards(&group(5, 20)).await.unwrap();

        assert!(report.attempted);
        assert_eq!(report.operations.len(), 1);
        assert!(matches!(
            report.operations[0].outcome,
            OperationOutcome::InsufficientFunds {
                needed: 2_000,
                available: 1_500
            }
        ));
    }

    #[tokio::test]
    async fn shared_signer_accounts_collapse_into_one_group() {
        let signing = SigningConfig {
            uri: Some("//Alice".to_string()),
            seed: None,
            mnemonic: None,
        };
        let resolved = vec![
            ResolvedAccount {
                address: "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".to_string(),
                depth_eras: 30,
                min_eras: 2,
                signing: signing.clone(),
            },
            ResolvedAccount {
                address: "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty".to_string(),
                depth_eras: 84,
                min_eras: 6,
                signing,
            },
        ];

        let groups = IdentityGroup::build(&resolved, Ss58AddressFormat::custom(42)).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].accounts.len(), 2);
        // Most conservative settings win for the shared signer.
        assert_eq!(groups[0].min_eras, 6);
        assert_eq!(groups[0].depth_eras, 84);
    }
}
