use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("chain RPC error: {0}")]
    Rpc(#[from] jsonrpsee::core::ClientError),

    #[error("SCALE decode error: {0}")]
    Codec(#[from] codec::Error),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no signing credential supplied (set exactly one of seed, mnemonic or uri)")]
    MissingCredentials,

    #[error("insufficient funds: needed {needed}, but account holds {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PayoutError>;
