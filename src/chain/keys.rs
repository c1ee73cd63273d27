use sp_core::crypto::{AccountId32, Ss58AddressFormat, Ss58Codec};
use sp_core::sr25519;
use sp_core::Pair;

use crate::config::SigningConfig;
use crate::error::{PayoutError, Result};

/// The credential/account pair that signs and pays for claim extrinsics.
/// Built from exactly one of seed, mnemonic or derivation uri; held in
/// memory for the duration of one run and never written anywhere.
pub struct SigningIdentity {
    pair: sr25519::Pair,
    ss58_format: Ss58AddressFormat,
}

impl SigningIdentity {
    pub fn from_config(signing: &SigningConfig, ss58_format: Ss58AddressFormat) -> Result<Self> {
        let supplied = [&signing.seed, &signing.mnemonic, &signing.uri]
            .iter()
            .filter(|c| c.is_some())
            .count();

        match supplied {
            0 => return Err(PayoutError::MissingCredentials),
            1 => {}
            _ => {
                return Err(PayoutError::Config(
                    "conflicting signing credentials: set only one of seed, mnemonic or uri"
                        .to_string(),
                ))
            }
        }

        let pair = if let Some(seed) = &signing.seed {
            let raw = hex::decode(seed.trim_start_matches("0x"))?;
            sr25519::Pair::from_seed_slice(&raw)
                .map_err(|e| PayoutError::Config(format!("invalid signing seed: {:?}", e)))?
        } else if let Some(mnemonic) = &signing.mnemonic {
            sr25519::Pair::from_string(mnemonic, None)
                .map_err(|e| PayoutError::Config(format!("invalid signing mnemonic: {:?}", e)))?
        } else if let Some(uri) = &signing.uri {
            sr25519::Pair::from_string(uri, None)
                .map_err(|e| PayoutError::Config(format!("invalid signing uri: {:?}", e)))?
        } else {
            unreachable!("credential count checked above")
        };

        Ok(Self { pair, ss58_format })
    }

    /// The account whose balance and nonce govern submissions.
    pub fn account(&self) -> AccountId32 {
        AccountId32::from(self.pair.public())
    }

    pub fn address(&self) -> String {
        self.account().to_ss58check_with_version(self.ss58_format)
    }

    pub fn sign(&self, payload: &[u8]) -> sr25519::Signature {
        self.pair.sign(payload)
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material, only the public address.
        f.debug_struct("SigningIdentity")
            .field("address", &self.address())
            .finish()
    }
}

/// Map a network name to its SS58 address format; unknown networks get the
/// generic substrate prefix.
pub fn ss58_format_for(network: &str) -> Ss58AddressFormat {
    Ss58AddressFormat::try_from(network.to_lowercase().as_str())
        .unwrap_or_else(|_| Ss58AddressFormat::custom(42))
}
