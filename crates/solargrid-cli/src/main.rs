//! SolarGrid CLI - run the hub, run an agent, inspect the ledger
//!
//! ```bash
//! # Central hub: telemetry in, decisions out
//! solargrid hub --listen 0.0.0.0:8765 --feed ws://backend:3001 \
//!     --wallets wallets.json --oracle deterministic
//!
//! # One settlement agent per house
//! solargrid agent --config house1.json
//!
//! # Audit a ledger, check a balance
//! solargrid ledger --path house1_tx.log
//! solargrid balance --rpc-url http://node:8545 \
//!     --token 0xA778... --address 0xE860...
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solargrid_agent::{AgentConfig, SettlementAgent};
use solargrid_chain::{JsonRpcChain, TokenChain, TransactionExecutor};
use solargrid_hub::DecisionHub;
use solargrid_ledger::TransactionLedger;
use solargrid_oracle::{
    DecisionOracle, DeterministicOracle, OpenAiConfig, OpenAiOracle, WalletDirectory,
};
use solargrid_types::{RetryPolicy, WalletAddress};

/// SolarGrid - microgrid energy settlement over SOLAR tokens
#[derive(Parser)]
#[command(name = "solargrid", version, about, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decision hub
    Hub {
        /// Broadcast endpoint for settlement agents
        #[arg(long, default_value = "0.0.0.0:8765")]
        listen: String,

        /// Telemetry backend WebSocket URL
        #[arg(long)]
        feed: String,

        /// Wallet directory JSON (house ids to addresses + public grid)
        #[arg(long)]
        wallets: PathBuf,

        /// Decision oracle implementation
        #[arg(long, value_enum, default_value_t = OracleKind::Openai)]
        oracle: OracleKind,
    },

    /// Run one house's settlement agent
    Agent {
        /// Agent config JSON
        #[arg(long)]
        config: PathBuf,
    },

    /// Print a ledger file for audit
    Ledger {
        #[arg(long)]
        path: PathBuf,
    },

    /// Show a wallet's SOLAR balance
    Balance {
        #[arg(long)]
        rpc_url: String,

        /// SOLAR token contract address
        #[arg(long)]
        token: String,

        /// Wallet to query
        #[arg(long)]
        address: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OracleKind {
    /// OpenAI-compatible chat endpoint (needs OPENAI_API_KEY)
    Openai,
    /// LLM-free net-energy settlement against the public grid
    Deterministic,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Hub {
            listen,
            feed,
            wallets,
            oracle,
        } => run_hub(listen, feed, wallets, oracle).await,
        Commands::Agent { config } => run_agent(config).await,
        Commands::Ledger { path } => print_ledger(path).await,
        Commands::Balance {
            rpc_url,
            token,
            address,
        } => print_balance(rpc_url, token, address).await,
    }
}

async fn run_hub(
    listen: String,
    feed: String,
    wallets: PathBuf,
    oracle: OracleKind,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&wallets)
        .with_context(|| format!("cannot read wallet directory {}", wallets.display()))?;
    let directory: WalletDirectory =
        serde_json::from_str(&raw).context("malformed wallet directory")?;

    let oracle: Arc<dyn DecisionOracle> = match oracle {
        OracleKind::Openai => Arc::new(OpenAiOracle::new(
            OpenAiConfig::from_env().context("oracle configuration")?,
            directory,
        )),
        OracleKind::Deterministic => Arc::new(DeterministicOracle::new(directory)),
    };

    let hub = Arc::new(DecisionHub::new(oracle));
    hub.run(&listen, &feed, RetryPolicy::default())
        .await
        .context("hub failed to start")?;
    Ok(())
}

async fn run_agent(config_path: PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::load(&config_path)?;
    let wallet = config.build_wallet()?;
    tracing::info!(agent = %config.name, address = %wallet.address(), "wallet loaded");

    let chain = JsonRpcChain::new(&config.rpc_url, config.token_contract.clone())?;
    let chain_id = chain
        .check_connectivity()
        .await
        .with_context(|| format!("chain rpc {} is unreachable", config.rpc_url))?;
    tracing::info!(chain_id, "chain rpc reachable");

    let ledger = TransactionLedger::open(&config.ledger_path)?;
    tracing::info!(
        replayed = ledger.len().await,
        path = %config.ledger_path.display(),
        "ledger opened"
    );

    let executor = TransactionExecutor::new(Arc::new(chain), wallet);
    let agent = SettlementAgent::new(
        config.name.clone(),
        executor,
        ledger,
        config.hub_url.clone(),
        config.retry_policy(),
    );
    agent.run().await;
    Ok(())
}

async fn print_ledger(path: PathBuf) -> anyhow::Result<()> {
    let ledger = TransactionLedger::open(&path)?;
    let records = ledger.all().await;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    eprintln!("{} record(s)", records.len());
    Ok(())
}

async fn print_balance(rpc_url: String, token: String, address: String) -> anyhow::Result<()> {
    let chain = JsonRpcChain::new(&rpc_url, WalletAddress::new(token))?;
    let owner = WalletAddress::new(address);
    let raw = chain.balance_of(&owner).await?;
    let decimals = chain.decimals().await?;
    let scaled = raw as f64 / 10f64.powi(i32::from(decimals));
    println!("{owner}: {scaled} SOLAR ({raw} raw, {decimals} decimals)");
    Ok(())
}
