//! Liquidity pool client
//!
//! Command-line front end over the pool client core: pool TVL, user
//! positions, loan health, and deposit/withdraw/borrow flows.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use pool_model::{evaluate, format_units, RiskInputs, RiskSnapshot, TransactionKind};
use rust_decimal::Decimal;

use pool_client::balance::parse_account;
use pool_client::config::DEFAULT_CONFIG_PATH;
use pool_client::health::{display_value, loan_health};
use pool_client::{
    Catalog, ChainGateway, Config, FlowOutcome, JsonRpcGateway, Orchestrator, Pool, PoolStats,
    Position, PositionAggregator,
};

#[derive(Debug, Parser)]
#[command(
    name = "pool-client",
    version,
    about = "Liquidity pool positions, loan health and transactions"
)]
struct Cli {
    /// Config file (overrides POOL_CLIENT_CONFIG)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Chain id (overrides the configured active chain)
    #[arg(long, global = true)]
    chain: Option<u64>,

    /// Account address (overrides the configured wallet account)
    #[arg(long, global = true)]
    account: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default config and sample pool catalog
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        path: String,
        #[arg(long, default_value = "pools.toml")]
        catalog: String,
    },
    /// TVL of every pool on the active chain
    Pools,
    /// The account's position in a pool
    Position {
        #[arg(long)]
        pool: String,
    },
    /// Evaluate a collateral/borrowed pair
    Risk {
        #[arg(long)]
        collateral: Decimal,
        #[arg(long)]
        borrowed: Decimal,
    },
    /// Risk of the account's loan against its pool position
    LoanHealth {
        #[arg(long)]
        pool: String,
    },
    /// Deposit into a pool (sends an approval first when needed)
    Deposit(ActionArgs),
    /// Withdraw from a pool
    Withdraw(ActionArgs),
    /// Borrow against a pool position
    Borrow(ActionArgs),
}

#[derive(Debug, clap::Args)]
struct ActionArgs {
    #[arg(long)]
    pool: String,
    /// Human amount, e.g. 12.5
    #[arg(long)]
    amount: String,
    /// Return after submission without polling for the receipt
    #[arg(long)]
    no_wait: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Command::InitConfig { path, catalog } = &cli.command {
        return init_config(path, catalog);
    }

    let mut config = load_config(cli.config.as_deref());
    if let Some(chain) = cli.chain {
        config.active_chain = chain;
    }
    if let Some(account) = cli.account {
        config.account = Some(account);
    }

    if let Command::Risk {
        collateral,
        borrowed,
    } = &cli.command
    {
        let inputs = RiskInputs::new(*collateral, *borrowed)?;
        print_risk(&evaluate(inputs, &config.risk_policy));
        return Ok(());
    }

    let catalog_path = config.catalog_path()?;
    let catalog = Catalog::load(&catalog_path)
        .context(format!("Failed to load pool catalog {}", catalog_path.display()))?;

    let gateway = JsonRpcGateway::new(&config.chains, config.request_timeout())
        .context("Failed to build RPC gateway")?;

    log::info!("Active chain: {}", config.active_chain);

    match cli.command {
        Command::Pools => show_pools(&gateway, &catalog, &config).await,
        Command::Position { pool } => {
            let pool = active_pool(&catalog, &config, &pool)?;
            let position = PositionAggregator::new(&gateway)
                .compute_user_position(pool, config.account.as_deref())
                .await;
            print_position(pool, &position);
            Ok(())
        }
        Command::LoanHealth { pool } => {
            let pool = active_pool(&catalog, &config, &pool)?;
            let health =
                loan_health(&gateway, pool, config.account.as_deref(), &config.risk_policy).await;
            print_position(pool, &health.position);
            println!(
                "  borrowed:    {} {}",
                format_units(health.borrowed_raw, pool.asset.decimals),
                pool.asset.symbol
            );
            for note in &health.degraded {
                println!("  ! {}", note);
            }
            print_risk(&health.snapshot);
            Ok(())
        }
        Command::Deposit(args) => {
            run_action(&gateway, &catalog, &config, TransactionKind::Deposit, args).await
        }
        Command::Withdraw(args) => {
            run_action(&gateway, &catalog, &config, TransactionKind::Withdraw, args).await
        }
        Command::Borrow(args) => {
            run_action(&gateway, &catalog, &config, TransactionKind::Loan, args).await
        }
        Command::InitConfig { .. } | Command::Risk { .. } => Ok(()),
    }
}

fn load_config(path: Option<&str>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default local config", e);
        Config::default_local()
    })
}

fn init_config(path: &str, catalog_path: &str) -> Result<()> {
    Config::write_default(path, catalog_path)?;

    let catalog = Catalog::sample_local().to_toml_string()?;
    std::fs::write(catalog_path, catalog)
        .context(format!("Failed to write catalog to {}", catalog_path))?;
    log::info!("Created sample catalog at {}", catalog_path);

    Ok(())
}

/// Pool by id, required to be on the active chain
fn active_pool<'c>(catalog: &'c Catalog, config: &Config, id: &str) -> Result<&'c Pool> {
    let pool = catalog.get(id)?;
    if pool.chain_id != config.active_chain {
        bail!(
            "pool {} is on chain {}, active chain is {}",
            pool.id,
            pool.chain_id,
            config.active_chain
        );
    }
    Ok(pool)
}

async fn show_pools<G: ChainGateway>(
    gateway: &G,
    catalog: &Catalog,
    config: &Config,
) -> Result<()> {
    let stats = PositionAggregator::new(gateway)
        .pool_overview(catalog, config.active_chain)
        .await;

    if stats.is_empty() {
        println!("No pools on chain {}", config.active_chain);
        return Ok(());
    }

    for s in &stats {
        let pool = catalog.get(&s.pool_id)?;
        print_pool(pool, s);
    }
    Ok(())
}

async fn run_action<G: ChainGateway>(
    gateway: &G,
    catalog: &Catalog,
    config: &Config,
    kind: TransactionKind,
    args: ActionArgs,
) -> Result<()> {
    let pool = active_pool(catalog, config, &args.pool)?;
    let owner = parse_account(config.account.as_deref()).map_err(|f| anyhow!("{}", f))?;

    let mut orchestrator = Orchestrator::new(gateway, pool, owner, config.confirmation.into());
    orchestrator.set_amount(args.amount);

    let outcome = orchestrator.request(kind).await?;
    report(&outcome)?;

    let in_flight = matches!(
        outcome,
        FlowOutcome::ApprovalSubmitted { .. } | FlowOutcome::Submitted { .. }
    );
    if args.no_wait || !in_flight {
        return Ok(());
    }

    let settled = orchestrator.await_settlement().await?;
    report(&settled)?;

    if let FlowOutcome::Succeeded { .. } = settled {
        let position = PositionAggregator::new(gateway)
            .compute_user_position(pool, config.account.as_deref())
            .await;
        print_position(pool, &position);
    }
    Ok(())
}

fn report(outcome: &FlowOutcome) -> Result<()> {
    match outcome {
        FlowOutcome::ApprovalSubmitted { tx } => {
            println!("Approval submitted: {}", tx);
        }
        FlowOutcome::ApprovalConfirmed { tx } => {
            println!("Approval confirmed: {}", tx);
            println!("Run the deposit again to complete it.");
        }
        FlowOutcome::Submitted { tx } => println!("Transaction submitted: {}", tx),
        FlowOutcome::Succeeded { tx, .. } => println!("Transaction confirmed: {}", tx),
        FlowOutcome::StillPending { tx } => {
            println!("Transaction {} not confirmed yet; check again later", tx)
        }
        FlowOutcome::Cancelled => println!("Cancelled"),
        FlowOutcome::Failed { message } => bail!("Transaction failed: {}", message),
    }
    Ok(())
}

fn amount(pool: &Pool, raw: alloy_primitives::U256) -> String {
    let units = format!("{} {}", format_units(raw, pool.asset.decimals), pool.asset.symbol);
    match pool.usd_price {
        Some(_) => format!("{} (${})", units, display_value(pool, raw).round_dp(2)),
        None => units,
    }
}

fn print_pool(pool: &Pool, stats: &PoolStats) {
    println!("{} [{}] APY {}%", pool.display_name, pool.id, pool.annual_yield);
    println!("  idle:        {}", amount(pool, stats.asset_balance));
    println!("  loans:       {}", amount(pool, stats.outstanding_loans));
    println!("  TVL:         {}", amount(pool, stats.tvl));
    println!("  block:       {}", stats.block);
    for note in &stats.degraded {
        println!("  ! {}", note);
    }
}

fn print_position(pool: &Pool, position: &Position) {
    print_pool(pool, &position.stats);
    match position.user {
        Some(user) => println!("  account:     {}", user),
        None => println!("  account:     (none)"),
    }
    println!(
        "  shares:      {} / {}",
        position.figures.shares, position.figures.total_shares
    );
    println!("  position:    {}", amount(pool, position.value));
    for note in &position.degraded {
        println!("  ! {}", note);
    }
}

fn print_risk(snapshot: &RiskSnapshot) {
    println!("  collateral:  {}", snapshot.collateral_value);
    println!("  borrowed:    {}", snapshot.borrowed_value);
    match snapshot.collateral_ratio {
        Some(ratio) => println!("  ratio:       {}%", ratio.round_dp(2)),
        None => println!("  ratio:       n/a (nothing borrowed)"),
    }
    println!("  health:      {}", snapshot.health_factor.round_dp(4));
    println!("  tier:        {}", snapshot.tier);
}
