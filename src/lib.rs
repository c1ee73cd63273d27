pub mod chain;
pub mod rewards;
pub mod payout;
pub mod config;
pub mod error;
pub mod utils;

pub use error::{Result, PayoutError};
pub use config::Config;
