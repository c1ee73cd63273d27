use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "payout-bot")]
#[command(about = "Automated staking reward claims for Substrate validators")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    pub config: String,

    /// Chain RPC url (overrides the configured one)
    #[arg(short, long, global = true)]
    pub rpc_url: Option<String>,

    /// Network name, used for the SS58 address format
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    /// How many eras back from the active era to scan
    #[arg(short, long, global = true)]
    pub depth_eras: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List rewards per era and validator
    List {
        /// Show unclaimed rewards only
        #[arg(short, long)]
        unclaimed: bool,

        /// Validator addresses (default: all configured accounts)
        validators: Vec<String>,
    },

    /// Claim pending rewards
    Pay {
        /// Validator addresses (default: all configured accounts)
        validators: Vec<String>,

        /// Minimum pending eras before a claim is submitted
        #[arg(short, long)]
        min_eras: Option<u32>,

        /// Hex seed for the signing key
        #[arg(long)]
        signing_seed: Option<String>,

        /// Mnemonic for the signing key
        #[arg(long)]
        signing_mnemonic: Option<String>,

        /// Derivation uri for the signing key
        #[arg(long)]
        signing_uri: Option<String>,

        /// Plan and balance-check without signing or submitting
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the claim cycle on a fixed interval
    Auto {
        /// Cycle interval in seconds
        #[arg(short, long, default_value = "3600")]
        interval: u64,

        /// Minimum pending eras before a claim is submitted
        #[arg(short, long)]
        min_eras: Option<u32>,

        /// Hex seed for the signing key
        #[arg(long)]
        signing_seed: Option<String>,

        /// Mnemonic for the signing key
        #[arg(long)]
        signing_mnemonic: Option<String>,

        /// Derivation uri for the signing key
        #[arg(long)]
        signing_uri: Option<String>,

        /// Plan and balance-check without signing or submitting
        #[arg(long)]
        dry_run: bool,
    },
}
