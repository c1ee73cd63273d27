mod cli;

use clap::Parser;
use colored::Colorize;
use sp_core::crypto::{AccountId32, Ss58AddressFormat, Ss58Codec};
use tracing::{error, info};

use cli::{Cli, Commands};
use staking_payout_bot::chain::keys::ss58_format_for;
use staking_payout_bot::chain::{ChainClient, ChainProperties, RpcChainClient};
use staking_payout_bot::config::{CliOverrides, Config, SigningConfig};
use staking_payout_bot::payout::{
    IdentityGroup, OperationOutcome, PayReport, PayoutEngine, SkipReason,
};
use staking_payout_bot::rewards::{effective_scope, list_rewards};
use staking_payout_bot::{error::PayoutError, utils, Result};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("staking_payout_bot=debug,payout_bot=debug,info")
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::List {
            unclaimed,
            validators,
        } => {
            let overrides = overrides_from(&cli, None, SigningConfig::default());
            cmd_list(&config, &overrides, validators, *unclaimed).await
        }

        Commands::Pay {
            validators,
            min_eras,
            signing_seed,
            signing_mnemonic,
            signing_uri,
            dry_run,
        } => {
            let signing = SigningConfig {
                seed: signing_seed.clone(),
                mnemonic: signing_mnemonic.clone(),
                uri: signing_uri.clone(),
            };
            let overrides = overrides_from(&cli, *min_eras, signing);
            cmd_pay(&config, &overrides, validators, *dry_run).await
        }

        Commands::Auto {
            interval,
            min_eras,
            signing_seed,
            signing_mnemonic,
            signing_uri,
            dry_run,
        } => {
            let signing = SigningConfig {
                seed: signing_seed.clone(),
                mnemonic: signing_mnemonic.clone(),
                uri: signing_uri.clone(),
            };
            let overrides = overrides_from(&cli, *min_eras, signing);
            cmd_auto(&config, &overrides, *interval, *dry_run).await
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn overrides_from(cli: &Cli, min_eras: Option<u32>, signing: SigningConfig) -> CliOverrides {
    CliOverrides {
        rpc_url: cli.rpc_url.clone(),
        network: cli.network.clone(),
        depth_eras: cli.depth_eras,
        min_eras,
        signing,
    }
}

async fn cmd_list(
    config: &Config,
    overrides: &CliOverrides,
    validators: &[String],
    unclaimed_only: bool,
) -> Result<()> {
    let client = RpcChainClient::connect(&config.rpc_url(overrides)).await?;
    let props = client.properties().await?;
    let display_format = Ss58AddressFormat::custom(props.ss58_prefix);

    let requested = parse_addresses(validators)?;
    let configured = parse_addresses(
        &config
            .accounts
            .iter()
            .map(|a| a.address.clone())
            .collect::<Vec<_>>(),
    )?;
    let scope = effective_scope(&requested, &configured);
    if scope.is_empty() {
        println!("{}", "No accounts configured or selected".yellow());
        return Ok(());
    }

    let depth = overrides.depth_eras.unwrap_or(config.payout.depth_eras);
    let active_era = client.active_era().await?;
    let start = active_era.saturating_sub(depth);

    info!("listing rewards for eras [{}, {})", start, active_era);
    let rows = list_rewards(&client, start, active_era, &scope, unclaimed_only).await?;

    if rows.is_empty() {
        println!("No rewards found in the last {} era(s)", depth);
        return Ok(());
    }

    let mut current_era = None;
    for row in &rows {
        if current_era != Some(row.era) {
            println!("Era: {}", row.era.to_string().cyan());
            current_era = Some(row.era);
        }
        let status = if row.claimed {
            "claimed".green()
        } else {
            "unclaimed".yellow()
        };
        println!(
            "\t {} => {} ({})",
            row.account.to_ss58check_with_version(display_format),
            utils::format_balance(row.amount, props.token_decimals, &props.token_symbol),
            status
        );
    }

    Ok(())
}

async fn cmd_pay(
    config: &Config,
    overrides: &CliOverrides,
    validators: &[String],
    dry_run: bool,
) -> Result<()> {
    let client = RpcChainClient::connect(&config.rpc_url(overrides)).await?;
    let props = client.properties().await?;
    let ss58_format = ss58_format_for(&config.network(overrides));

    let resolved = config.resolve_accounts(overrides, validators);
    if resolved.is_empty() {
        println!("{}", "No accounts configured or selected".yellow());
        return Ok(());
    }

    let groups = IdentityGroup::build(&resolved, ss58_format)?;
    let engine = PayoutEngine::new(&client, dry_run);

    let mut failed_groups = 0;
    for group in &groups {
        match engine.pay_rewards(group).await {
            Ok(report) => print_pay_report(&report, &props),
            Err(e) => {
                failed_groups += 1;
                error!("{}: {}", group.identity.address(), e);
            }
        }
    }

    if failed_groups > 0 {
        return Err(PayoutError::SubmissionFailed(format!(
            "{} identity group(s) did not complete",
            failed_groups
        )));
    }
    Ok(())
}

async fn cmd_auto(
    config: &Config,
    overrides: &CliOverrides,
    interval: u64,
    dry_run: bool,
) -> Result<()> {
    info!("Starting automated claim service (interval: {}s)", interval);

    loop {
        let started = chrono::Utc::now();
        if let Err(e) = cmd_pay(config, overrides, &[], dry_run).await {
            error!("claim cycle failed: {}", e);
        }

        let next = started + chrono::Duration::seconds(interval as i64);
        info!(
            "next claim cycle at {}",
            next.format("%Y-%m-%d %H:%M:%S UTC")
        );
        tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
    }
}

fn parse_addresses(addresses: &[String]) -> Result<Vec<AccountId32>> {
    addresses.iter().map(|a| utils::parse_account(a)).collect()
}

fn print_pay_report(report: &PayReport, props: &ChainProperties) {
    println!(
        "\n{}",
        format!("=== Payouts signed by {} ===", report.signer).cyan().bold()
    );

    match &report.skipped {
        Some(SkipReason::NothingToClaim { depth_eras }) => {
            println!("There are no rewards to claim in the last {} era(s)", depth_eras);
            return;
        }
        Some(SkipReason::BelowThreshold { pending, required }) => {
            println!(
                "There are rewards to claim in {} era(s), but those are not enough to reach the minimum threshold ({})",
                pending, required
            );
            return;
        }
        None => {}
    }

    for op in &report.operations {
        match &op.outcome {
            OperationOutcome::Included {
                extrinsic_hash,
                block_hash,
                fee,
            } => {
                println!("{} {}", "✓".green(), op.label);
                println!("\t Extrinsic hash: {:?}", extrinsic_hash);
                if let Some(block) = block_hash {
                    println!("\t Block hash: {:?}", block);
                }
                println!(
                    "\t Fee: {} ({})",
                    utils::format_balance(*fee, props.token_decimals, &props.token_symbol),
                    fee
                );
                println!("\t Status: {}", "ok".green());
            }
            OperationOutcome::SubmissionFailed {
                extrinsic_hash,
                detail,
            } => {
                println!("{} {}", "✗".red(), op.label);
                if let Some(hash) = extrinsic_hash {
                    println!("\t Extrinsic hash: {:?}", hash);
                }
                println!("\t Status: {}", "error".red());
                println!("\t Error message: {}", detail);
            }
            OperationOutcome::InsufficientFunds { needed, available } => {
                println!("{} {}", "✗".red(), op.label);
                println!(
                    "\t Account with not enough funds. Needed {}, but got {}",
                    utils::format_balance(*needed, props.token_decimals, &props.token_symbol),
                    utils::format_balance(*available, props.token_decimals, &props.token_symbol)
                );
            }
            OperationOutcome::DryRun { fee } => {
                println!("{} {}", "·".yellow(), op.label);
                println!(
                    "\t DRY RUN: would submit with estimated fee {}",
                    utils::format_balance(*fee, props.token_decimals, &props.token_symbol)
                );
            }
        }
    }
}
