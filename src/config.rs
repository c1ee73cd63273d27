use serde::Deserialize;

pub const DEFAULT_DEPTH_ERAS: u32 = 84;
pub const DEFAULT_MIN_ERAS: u32 = 5;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub payout: PayoutDefaults,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub accounts: Vec<AccountSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub network: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PayoutDefaults {
    /// How many eras back from the active era to scan.
    #[serde(default = "default_depth_eras")]
    pub depth_eras: u32,
    /// Minimum number of pending eras before a claim is worth submitting.
    #[serde(default = "default_min_eras")]
    pub min_eras: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SigningConfig {
    pub seed: Option<String>,
    pub mnemonic: Option<String>,
    pub uri: Option<String>,
}

/// One validator stash to track, with optional per-account overrides.
#[derive(Debug, Deserialize, Clone)]
pub struct AccountSection {
    pub address: String,
    pub min_eras: Option<u32>,
    pub depth_eras: Option<u32>,
    pub signing: Option<SigningConfig>,
}

/// Values supplied on the command line; each beats the corresponding
/// per-account and global config entries.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub rpc_url: Option<String>,
    pub network: Option<String>,
    pub depth_eras: Option<u32>,
    pub min_eras: Option<u32>,
    pub signing: SigningConfig,
}

/// Final per-account settings after override resolution. Immutable for the
/// rest of the run.
#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    pub address: String,
    pub depth_eras: u32,
    pub min_eras: u32,
    pub signing: SigningConfig,
}

fn default_depth_eras() -> u32 {
    DEFAULT_DEPTH_ERAS
}

fn default_min_eras() -> u32 {
    DEFAULT_MIN_ERAS
}

impl Default for PayoutDefaults {
    fn default() -> Self {
        Self {
            depth_eras: DEFAULT_DEPTH_ERAS,
            min_eras: DEFAULT_MIN_ERAS,
        }
    }
}

impl SigningConfig {
    pub fn is_empty(&self) -> bool {
        self.seed.is_none() && self.mnemonic.is_none() && self.uri.is_none()
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PAYOUT").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn rpc_url(&self, cli: &CliOverrides) -> String {
        cli.rpc_url.clone().unwrap_or_else(|| self.chain.rpc_url.clone())
    }

    pub fn network(&self, cli: &CliOverrides) -> String {
        cli.network.clone().unwrap_or_else(|| self.chain.network.clone())
    }

    /// Resolve the accounts in scope for this run. An explicit address list
    /// restricts the scope (addresses without a config section get the
    /// global defaults); an empty list means every configured account.
    pub fn resolve_accounts(&self, cli: &CliOverrides, selected: &[String]) -> Vec<ResolvedAccount> {
        if selected.is_empty() {
            return self
                .accounts
                .iter()
                .map(|section| self.resolve_one(cli, &section.address, Some(section)))
                .collect();
        }

        selected
            .iter()
            .map(|address| {
                let section = self.accounts.iter().find(|s| &s.address == address);
                self.resolve_one(cli, address, section)
            })
            .collect()
    }

    fn resolve_one(
        &self,
        cli: &CliOverrides,
        address: &str,
        section: Option<&AccountSection>,
    ) -> ResolvedAccount {
        let depth_eras = cli
            .depth_eras
            .or_else(|| section.and_then(|s| s.depth_eras))
            .unwrap_or(self.payout.depth_eras);

        let min_eras = cli
            .min_eras
            .or_else(|| section.and_then(|s| s.min_eras))
            .unwrap_or(self.payout.min_eras);

        // Credentials resolve as a whole tier, never key by key, so a seed
        // from one tier cannot pair with a uri from another.
        let signing = if !cli.signing.is_empty() {
            cli.signing.clone()
        } else if let Some(s) = section.and_then(|s| s.signing.clone()).filter(|s| !s.is_empty()) {
            s
        } else {
            self.signing.clone()
        };

        ResolvedAccount {
            address: address.to_string(),
            depth_eras,
            min_eras,
            signing,
        }
    }
}
