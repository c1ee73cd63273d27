use std::collections::BTreeSet;

use async_trait::async_trait;
use codec::{Compact, Decode, Encode};
use frame_metadata::v14::RuntimeMetadataV14;
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde_json::Value;
use sp_core::crypto::AccountId32;
use sp_core::hashing::{blake2_128, blake2_256, twox_128, twox_64};
use sp_core::H256;
use tracing::{debug, warn};

use crate::chain::calls::{CallIndices, ChainCall};
use crate::chain::client::{
    AccountStatus, ChainClient, ChainProperties, EraIndex, EraRewardPoints, SubmissionReceipt,
};
use crate::chain::keys::SigningIdentity;
use crate::error::{PayoutError, Result};

const KEYS_PAGE_SIZE: u32 = 512;

/// Chain access over raw Substrate JSON-RPC: storage reads, metadata
/// capability probing, v4 extrinsic signing and submit-and-watch.
pub struct RpcChainClient {
    client: WsClient,
    genesis_hash: H256,
    spec_version: u32,
    transaction_version: u32,
    indices: CallIndices,
    existential_deposit: u128,
    properties: ChainProperties,
}

#[derive(Decode)]
struct ActiveEraInfo {
    index: u32,
    #[allow(dead_code)]
    start: Option<u64>,
}

#[derive(Decode)]
struct UnlockChunk {
    #[codec(compact)]
    #[allow(dead_code)]
    value: u128,
    #[codec(compact)]
    #[allow(dead_code)]
    era: u32,
}

#[derive(Decode)]
struct StakingLedger {
    #[allow(dead_code)]
    stash: AccountId32,
    #[codec(compact)]
    #[allow(dead_code)]
    total: u128,
    #[codec(compact)]
    #[allow(dead_code)]
    active: u128,
    #[allow(dead_code)]
    unlocking: Vec<UnlockChunk>,
    legacy_claimed_rewards: Vec<u32>,
}

#[derive(Decode)]
struct AccountData {
    free: u128,
    #[allow(dead_code)]
    reserved: u128,
    #[allow(dead_code)]
    frozen: u128,
    #[allow(dead_code)]
    flags: u128,
}

#[derive(Decode)]
struct AccountInfo {
    nonce: u32,
    #[allow(dead_code)]
    consumers: u32,
    #[allow(dead_code)]
    providers: u32,
    #[allow(dead_code)]
    sufficients: u32,
    data: AccountData,
}

impl RpcChainClient {
    pub async fn connect(url: &str) -> Result<Self> {
        debug!("connecting to {}", url);
        let client = WsClientBuilder::default().build(url).await?;

        let genesis: Option<String> = client
            .request("chain_getBlockHash", rpc_params![0u32])
            .await?;
        let genesis_hash = decode_hash(genesis.as_deref().ok_or_else(|| {
            PayoutError::Other(anyhow::anyhow!("node returned no genesis hash"))
        })?)?;

        let runtime: Value = client
            .request("state_getRuntimeVersion", rpc_params![])
            .await?;
        let spec_version = runtime
            .get("specVersion")
            .and_then(Value::as_u64)
            .unwrap_or_default() as u32;
        let transaction_version = runtime
            .get("transactionVersion")
            .and_then(Value::as_u64)
            .unwrap_or_default() as u32;

        let raw_metadata: String = client.request("state_getMetadata", rpc_params![]).await?;
        let metadata_bytes = hex::decode(raw_metadata.trim_start_matches("0x"))?;
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &metadata_bytes[..])?;
        let metadata = match prefixed.1 {
            RuntimeMetadata::V14(md) => md,
            _ => {
                return Err(PayoutError::Config(
                    "unsupported runtime metadata version (v14 required)".to_string(),
                ))
            }
        };

        let payout_stakers = call_index(&metadata, "Staking", "payout_stakers").ok_or_else(|| {
            PayoutError::Config("runtime exposes no Staking::payout_stakers call".to_string())
        })?;
        let batch = call_index(&metadata, "Utility", "batch");
        if batch.is_none() {
            warn!("runtime has no Utility::batch call, payouts will be submitted one by one");
        }

        let existential_deposit = pallet_constant(&metadata, "Balances", "ExistentialDeposit")
            .map(|bytes| u128::decode(&mut &bytes[..]))
            .transpose()?
            .unwrap_or_else(|| {
                warn!("runtime exposes no ExistentialDeposit constant, assuming 0");
                0
            });

        let props: Value = client.request("system_properties", rpc_params![]).await?;
        let properties = ChainProperties {
            token_decimals: first_number(props.get("tokenDecimals")).unwrap_or(12) as u32,
            token_symbol: first_string(props.get("tokenSymbol")).unwrap_or_else(|| "UNIT".to_string()),
            ss58_prefix: first_number(props.get("ss58Format")).unwrap_or(42) as u16,
        };

        debug!(
            "connected: spec {}, tx version {}, token {} ({} decimals)",
            spec_version, transaction_version, properties.token_symbol, properties.token_decimals
        );

        Ok(Self {
            client,
            genesis_hash,
            spec_version,
            transaction_version,
            indices: CallIndices {
                payout_stakers,
                batch,
            },
            existential_deposit,
            properties,
        })
    }

    async fn fetch_storage(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let raw: Option<String> = self
            .client
            .request("state_getStorage", rpc_params![key])
            .await?;
        match raw {
            Some(hexed) => Ok(Some(hex::decode(hexed.trim_start_matches("0x"))?)),
            None => Ok(None),
        }
    }

    async fn fetch_keys(&self, prefix: &str) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        let mut start_key: Option<String> = None;

        loop {
            let page: Vec<String> = self
                .client
                .request(
                    "state_getKeysPaged",
                    rpc_params![prefix, KEYS_PAGE_SIZE, start_key.clone()],
                )
                .await?;
            let page_len = page.len();
            start_key = page.last().cloned();
            for key in page {
                out.push(hex::decode(key.trim_start_matches("0x"))?);
            }
            if page_len < KEYS_PAGE_SIZE as usize {
                break;
            }
        }

        Ok(out)
    }

    async fn legacy_claims_inner(&self, account: &AccountId32) -> Result<Option<BTreeSet<EraIndex>>> {
        // The ledger lives under the controller account, which historically
        // may differ from the stash.
        let bonded_key = storage_key("Staking", "Bonded", &twox_64_concat(&account.encode()));
        let controller = match self.fetch_storage(&bonded_key).await? {
            Some(bytes) => AccountId32::decode(&mut &bytes[..])?,
            None => return Ok(None),
        };

        let ledger_key = storage_key("Staking", "Ledger", &blake2_128_concat(&controller.encode()));
        let ledger = match self.fetch_storage(&ledger_key).await? {
            Some(bytes) => StakingLedger::decode(&mut &bytes[..])?,
            None => return Ok(None),
        };

        Ok(Some(ledger.legacy_claimed_rewards.into_iter().collect()))
    }

    /// Assemble a v4 signed extrinsic: version byte, MultiAddress::Id,
    /// sr25519 MultiSignature, immortal era, nonce, zero tip, call.
    fn assemble_extrinsic(
        &self,
        call: &[u8],
        signer: &AccountId32,
        signature: &[u8],
        nonce: u32,
    ) -> Vec<u8> {
        let mut inner = Vec::with_capacity(call.len() + 112);
        inner.push(0x84);
        inner.push(0x00);
        signer.encode_to(&mut inner);
        inner.push(0x01);
        inner.extend_from_slice(signature);
        inner.push(0x00);
        Compact(nonce).encode_to(&mut inner);
        Compact(0u128).encode_to(&mut inner);
        inner.extend_from_slice(call);

        let mut out = Vec::with_capacity(inner.len() + 4);
        Compact(inner.len() as u32).encode_to(&mut out);
        out.extend(inner);
        out
    }

    /// Payload signed for a v4 extrinsic; payloads over 256 bytes are signed
    /// through their blake2_256 digest.
    fn signature_payload(&self, call: &[u8], nonce: u32) -> Vec<u8> {
        let mut payload = call.to_vec();
        payload.push(0x00);
        Compact(nonce).encode_to(&mut payload);
        Compact(0u128).encode_to(&mut payload);
        self.spec_version.encode_to(&mut payload);
        self.transaction_version.encode_to(&mut payload);
        self.genesis_hash.encode_to(&mut payload);
        self.genesis_hash.encode_to(&mut payload);

        if payload.len() > 256 {
            blake2_256(&payload).to_vec()
        } else {
            payload
        }
    }

    async fn query_fee(&self, extrinsic: &[u8]) -> Result<u128> {
        let hexed = format!("0x{}", hex::encode(extrinsic));
        let info: Value = self
            .client
            .request("payment_queryInfo", rpc_params![hexed])
            .await?;
        parse_fee(info.get("partialFee"))
            .ok_or_else(|| PayoutError::Other(anyhow::anyhow!("malformed payment info: {}", info)))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn properties(&self) -> Result<ChainProperties> {
        Ok(self.properties.clone())
    }

    async fn active_era(&self) -> Result<EraIndex> {
        let key = storage_key("Staking", "ActiveEra", &[]);
        match self.fetch_storage(&key).await? {
            Some(bytes) => Ok(ActiveEraInfo::decode(&mut &bytes[..])?.index),
            None => Err(PayoutError::Other(anyhow::anyhow!(
                "chain reports no active era"
            ))),
        }
    }

    async fn reward_points(&self, era: EraIndex) -> Result<Option<EraRewardPoints>> {
        let key = storage_key(
            "Staking",
            "ErasRewardPoints",
            &twox_64_concat(&era.encode()),
        );
        match self.fetch_storage(&key).await? {
            Some(bytes) => match EraRewardPoints::decode(&mut &bytes[..]) {
                Ok(points) => Ok(Some(points)),
                Err(e) => {
                    warn!("era {}: undecodable reward points record ({}), skipping", era, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn reward_pool(&self, era: EraIndex) -> Result<Option<u128>> {
        let key = storage_key(
            "Staking",
            "ErasValidatorReward",
            &twox_64_concat(&era.encode()),
        );
        match self.fetch_storage(&key).await? {
            Some(bytes) => match u128::decode(&mut &bytes[..]) {
                Ok(pool) => Ok(Some(pool)),
                Err(e) => {
                    warn!("era {}: undecodable reward pool record ({}), skipping", era, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn legacy_claims(&self, account: &AccountId32) -> Result<Option<BTreeSet<EraIndex>>> {
        // Deprecated chain-side; any failure here means "no legacy evidence",
        // never a failed run.
        match self.legacy_claims_inner(account).await {
            Ok(claims) => Ok(claims),
            Err(e) => {
                debug!("legacy ledger lookup failed for {}: {}", account, e);
                Ok(None)
            }
        }
    }

    async fn current_claims(&self, era: EraIndex) -> Result<Option<BTreeSet<AccountId32>>> {
        let prefix = storage_key(
            "Staking",
            "ClaimedRewards",
            &twox_64_concat(&era.encode()),
        );
        let keys = self.fetch_keys(&prefix).await?;

        let mut accounts = BTreeSet::new();
        for key in keys {
            if key.len() < 32 {
                continue;
            }
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&key[key.len() - 32..]);
            accounts.insert(AccountId32::new(raw));
        }
        Ok(Some(accounts))
    }

    async fn account_status(&self, account: &AccountId32) -> Result<AccountStatus> {
        let key = storage_key("System", "Account", &blake2_128_concat(&account.encode()));
        match self.fetch_storage(&key).await? {
            Some(bytes) => {
                let info = AccountInfo::decode(&mut &bytes[..])?;
                Ok(AccountStatus {
                    free: info.data.free,
                    nonce: info.nonce,
                })
            }
            None => Ok(AccountStatus { free: 0, nonce: 0 }),
        }
    }

    async fn existential_deposit(&self) -> Result<u128> {
        Ok(self.existential_deposit)
    }

    async fn supports_atomic_batch(&self) -> Result<bool> {
        Ok(self.indices.batch.is_some())
    }

    async fn estimate_fee(&self, call: &ChainCall) -> Result<u128> {
        // Fee estimation only needs a correctly shaped extrinsic; a zeroed
        // signature keeps it free of key material.
        let call_bytes = call.encode_with(&self.indices)?;
        let extrinsic =
            self.assemble_extrinsic(&call_bytes, &AccountId32::new([0u8; 32]), &[0u8; 64], 0);
        self.query_fee(&extrinsic).await
    }

    async fn sign_and_submit(
        &self,
        call: &ChainCall,
        identity: &SigningIdentity,
        nonce: u32,
    ) -> Result<SubmissionReceipt> {
        let call_bytes = call.encode_with(&self.indices)?;
        let payload = self.signature_payload(&call_bytes, nonce);
        let signature = identity.sign(&payload);
        let extrinsic =
            self.assemble_extrinsic(&call_bytes, &identity.account(), signature.as_ref(), nonce);

        let extrinsic_hash = H256(blake2_256(&extrinsic));
        let fee = self.query_fee(&extrinsic).await.unwrap_or_default();
        let ext_hex = format!("0x{}", hex::encode(&extrinsic));

        debug!("submitting {} as {}", call.label(), extrinsic_hash);

        let mut subscription: Subscription<Value> = match self
            .client
            .subscribe(
                "author_submitAndWatchExtrinsic",
                rpc_params![ext_hex],
                "author_unwatchExtrinsic",
            )
            .await
        {
            Ok(sub) => sub,
            Err(e) => {
                return Ok(SubmissionReceipt {
                    extrinsic_hash,
                    block_hash: None,
                    fee,
                    success: false,
                    error_detail: Some(e.to_string()),
                })
            }
        };

        while let Some(status) = subscription.next().await {
            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    return Ok(SubmissionReceipt {
                        extrinsic_hash,
                        block_hash: None,
                        fee,
                        success: false,
                        error_detail: Some(e.to_string()),
                    })
                }
            };

            if let Some(terminal) = classify_status(&status) {
                return Ok(match terminal {
                    WatchOutcome::InBlock(block_hash) => SubmissionReceipt {
                        extrinsic_hash,
                        block_hash: Some(block_hash),
                        fee,
                        success: true,
                        error_detail: None,
                    },
                    WatchOutcome::Rejected(detail) => SubmissionReceipt {
                        extrinsic_hash,
                        block_hash: None,
                        fee,
                        success: false,
                        error_detail: Some(detail),
                    },
                });
            }
        }

        Ok(SubmissionReceipt {
            extrinsic_hash,
            block_hash: None,
            fee,
            success: false,
            error_detail: Some("transaction status stream ended before inclusion".to_string()),
        })
    }
}

enum WatchOutcome {
    InBlock(H256),
    Rejected(String),
}

/// Map a transaction status notification to a terminal outcome, `None` while
/// the transaction is still in flight.
fn classify_status(status: &Value) -> Option<WatchOutcome> {
    if let Some(s) = status.as_str() {
        return match s {
            "dropped" => Some(WatchOutcome::Rejected("dropped from the pool".to_string())),
            "invalid" => Some(WatchOutcome::Rejected("marked invalid".to_string())),
            _ => None,
        };
    }

    let obj = status.as_object()?;
    if let Some(block) = obj.get("inBlock").and_then(Value::as_str) {
        return decode_hash(block).ok().map(WatchOutcome::InBlock);
    }
    if let Some(block) = obj.get("finalized").and_then(Value::as_str) {
        return decode_hash(block).ok().map(WatchOutcome::InBlock);
    }
    if obj.contains_key("usurped") {
        return Some(WatchOutcome::Rejected("usurped by another transaction".to_string()));
    }
    if obj.contains_key("finalityTimeout") {
        return Some(WatchOutcome::Rejected("finality timeout".to_string()));
    }
    None
}

fn storage_key(pallet: &str, item: &str, suffix: &[u8]) -> String {
    let mut key = Vec::with_capacity(32 + suffix.len());
    key.extend(twox_128(pallet.as_bytes()));
    key.extend(twox_128(item.as_bytes()));
    key.extend_from_slice(suffix);
    format!("0x{}", hex::encode(key))
}

fn twox_64_concat(data: &[u8]) -> Vec<u8> {
    let mut out = twox_64(data).to_vec();
    out.extend_from_slice(data);
    out
}

fn blake2_128_concat(data: &[u8]) -> Vec<u8> {
    let mut out = blake2_128(data).to_vec();
    out.extend_from_slice(data);
    out
}

fn decode_hash(hexed: &str) -> Result<H256> {
    let raw = hex::decode(hexed.trim_start_matches("0x"))?;
    if raw.len() != 32 {
        return Err(PayoutError::Other(anyhow::anyhow!(
            "unexpected hash length {}",
            raw.len()
        )));
    }
    Ok(H256::from_slice(&raw))
}

fn call_index(metadata: &RuntimeMetadataV14, pallet: &str, call: &str) -> Option<(u8, u8)> {
    let pallet_meta = metadata.pallets.iter().find(|p| p.name == pallet)?;
    let calls_ty = pallet_meta.calls.as_ref()?;
    let ty = metadata.types.resolve(calls_ty.ty.id)?;
    if let scale_info::TypeDef::Variant(variants) = &ty.type_def {
        let variant = variants.variants.iter().find(|v| v.name == call)?;
        Some((pallet_meta.index, variant.index))
    } else {
        None
    }
}

fn pallet_constant(metadata: &RuntimeMetadataV14, pallet: &str, name: &str) -> Option<Vec<u8>> {
    metadata
        .pallets
        .iter()
        .find(|p| p.name == pallet)?
        .constants
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.value.clone())
}

/// `tokenDecimals`/`tokenSymbol` may be scalars or arrays (multi-asset
/// chains); take the first entry either way.
fn first_number(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Array(items)) => items.first().and_then(Value::as_u64),
        _ => None,
    }
}

fn first_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
        _ => None,
    }
}

/// `partialFee` arrives as a decimal string on current nodes, a raw number
/// on older ones.
fn parse_fee(value: Option<&Value>) -> Option<u128> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim_start_matches("0x");
            if trimmed.len() < s.len() {
                u128::from_str_radix(trimmed, 16).ok()
            } else {
                s.parse().ok()
            }
        }
        Some(Value::Number(n)) => n.as_u64().map(u128::from),
        _ => None,
    }
}
