use codec::{Compact, Encode};
use sp_core::crypto::AccountId32;

use crate::error::{PayoutError, Result};

/// Call indices discovered from the runtime metadata at connect time.
/// `batch` is `None` on runtimes without the utility pallet.
#[derive(Debug, Clone, Copy)]
pub struct CallIndices {
    pub payout_stakers: (u8, u8),
    pub batch: Option<(u8, u8)>,
}

/// A composed runtime call, kept symbolic until it is encoded against the
/// connected chain's call indices.
#[derive(Debug, Clone)]
pub enum ChainCall {
    PayoutStakers { validator: AccountId32, era: u32 },
    Batch(Vec<ChainCall>),
}

impl ChainCall {
    pub fn encode_with(&self, indices: &CallIndices) -> Result<Vec<u8>> {
        match self {
            ChainCall::PayoutStakers { validator, era } => {
                let (pallet, call) = indices.payout_stakers;
                let mut out = vec![pallet, call];
                validator.encode_to(&mut out);
                era.encode_to(&mut out);
                Ok(out)
            }
            ChainCall::Batch(calls) => {
                let (pallet, call) = indices.batch.ok_or_else(|| {
                    PayoutError::Config("runtime has no batch extrinsic".to_string())
                })?;
                let mut out = vec![pallet, call];
                Compact(calls.len() as u32).encode_to(&mut out);
                for inner in calls {
                    out.extend(inner.encode_with(indices)?);
                }
                Ok(out)
            }
        }
    }

    /// Human tag for logs and reports.
    pub fn label(&self) -> String {
        match self {
            ChainCall::PayoutStakers { validator, era } => {
                format!("payout_stakers({}, era {})", validator, era)
            }
            ChainCall::Batch(calls) => format!("batch({} calls)", calls.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDICES: CallIndices = CallIndices {
        payout_stakers: (6, 18),
        batch: Some((26, 0)),
    };

    fn payout(era: u32) -> ChainCall {
        ChainCall::PayoutStakers {
            validator: AccountId32::new([7u8; 32]),
            era,
        }
    }

    #[test]
    fn payout_call_layout() {
        let encoded = payout(100).encode_with(&INDICES).unwrap();
        // pallet byte, call byte, 32-byte account, little-endian era.
        assert_eq!(encoded.len(), 2 + 32 + 4);
        assert_eq!(&encoded[..2], &[6, 18]);
        assert_eq!(&encoded[2..34], &[7u8; 32]);
        assert_eq!(&encoded[34..], &100u32.to_le_bytes());
    }

    #[test]
    fn batch_wraps_inner_calls_with_compact_length() {
        let batch = ChainCall::Batch(vec![payout(1), payout(2)]);
        let encoded = batch.encode_with(&INDICES).unwrap();
        assert_eq!(&encoded[..2], &[26, 0]);
        // Compact(2) encodes as a single byte.
        assert_eq!(encoded[2], Compact(2u32).encode()[0]);
        assert_eq!(encoded.len(), 3 + 2 * 38);
    }

    #[test]
    fn batch_requires_capability() {
        let no_batch = CallIndices {
            payout_stakers: (6, 18),
            batch: None,
        };
        let call = ChainCall::Batch(vec![payout(1)]);
        assert!(matches!(
            call.encode_with(&no_batch),
            Err(PayoutError::Config(_))
        ));
    }
}
