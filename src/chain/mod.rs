pub mod calls;
pub mod client;
pub mod keys;
pub mod rpc;

pub use calls::{CallIndices, ChainCall};
pub use client::{
    AccountStatus, ChainClient, ChainProperties, EraIndex, EraRewardPoints, SubmissionReceipt,
};
pub use keys::SigningIdentity;
pub use rpc::RpcChainClient;
