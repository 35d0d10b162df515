use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

use verum_wallet_lib::coin::CoinParams;
use verum_wallet_lib::config_store::{ConfigStore, WalletConfig};
use verum_wallet_lib::nodes::NodeListClient;
use verum_wallet_lib::storage::WalletPaths;
use verum_wallet_lib::validation::InputValidator;
use verum_wallet_lib::verminting::{
    hash_private_view_key, UnvermintReceipt, VermintingClient, VermintingStats,
};

#[derive(Debug, Parser)]
#[command(name = "verum-wallet", version, about = "Verum wallet backend tools")]
struct Cli {
    /// Wallet data directory (defaults to ~/.verumwallet).
    #[arg(long, global = true, env = "VERUM_WALLET_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect the persisted user configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the public nodes from the published node list.
    Nodes {
        #[arg(long, default_value = CoinParams::NODE_LIST_URL)]
        url: String,
    },
    /// Talk to the verminting API.
    Verminting(VermintingArgs),
    /// Print the identity hash the verminting API knows a wallet by.
    HashViewKey { key: String },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the config merged over defaults.
    Show,
    /// Print where the config file lives.
    Path,
}

#[derive(Debug, Args)]
struct VermintingArgs {
    #[command(subcommand)]
    action: VermintingAction,

    /// Private view key of the wallet.
    #[arg(long, global = true, env = "VERUM_VIEW_KEY", hide_env_values = true)]
    view_key: Option<String>,

    #[arg(long, global = true, default_value = CoinParams::VERMINTING_API_URL)]
    api_url: String,
}

#[derive(Debug, Subcommand)]
enum VermintingAction {
    Stats,
    Register {
        #[arg(long)]
        address: String,
    },
    Address,
    Unvermint {
        #[arg(long)]
        amount: String,
    },
}

fn wallet_paths(data_dir: Option<PathBuf>) -> anyhow::Result<WalletPaths> {
    let paths = match data_dir {
        Some(dir) => WalletPaths::new(dir)?,
        None => WalletPaths::from_home()?,
    };
    Ok(paths)
}

fn init_logging(config: &WalletConfig) {
    let default_level = config.log_level().to_level_filter().to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = wallet_paths(cli.data_dir)?;
    let store = ConfigStore::from_paths(&paths);
    let config = store
        .load_or_default()
        .with_context(|| format!("Failed to read {}", store.path().display()))?;
    init_logging(&config);

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Path => {
                println!("{}", store.path().display());
            }
        },
        Command::Nodes { url } => {
            let nodes = NodeListClient::new(url)?
                .fetch()
                .await
                .context("Failed to fetch node list")?;
            for node in nodes {
                let fee = node.fee.as_ref().map(|fee| fee.amount).unwrap_or_default();
                println!(
                    "{:<24} {:<32} ssl={} fee={}",
                    node.name,
                    node.connection_string(),
                    node.ssl,
                    fee
                );
            }
        }
        Command::Verminting(args) => run_verminting(args).await?,
        Command::HashViewKey { key } => {
            println!("{}", hash_private_view_key(&key));
        }
    }

    Ok(())
}

async fn run_verminting(args: VermintingArgs) -> anyhow::Result<()> {
    let Some(view_key) = args.view_key else {
        bail!("--view-key (or VERUM_VIEW_KEY) is required");
    };
    let view_key = SecretString::from(view_key);
    let client = VermintingClient::new(args.api_url)?;

    match args.action {
        VermintingAction::Stats => {
            let stats: VermintingStats = client.get_stats(&view_key).await?.into_result()?;
            println!("Balance:         {:.8} {}", stats.balance.balance, CoinParams::TICKER);
            println!(
                "Locked balance:  {:.8} {}",
                stats.balance.locked_balance,
                CoinParams::TICKER
            );
            println!("Est. reward:     {}%", stats.est_reward_percentage);
            println!(
                "Est. reward:     {} {}",
                stats.est_reward_coins,
                CoinParams::TICKER
            );
        }
        VermintingAction::Register { address } => {
            InputValidator::new()?.validate_address(&address)?;
            client
                .register_wallet(&view_key, &address)
                .await?
                .into_result::<serde_json::Value>()?;
            println!("Registered {}", address);
        }
        VermintingAction::Address => {
            let address: String = client.get_deposit_address(&view_key).await?.into_result()?;
            println!("{}", address);
        }
        VermintingAction::Unvermint { amount } => {
            InputValidator::new()?.validate_verminting_amount(&amount)?;
            let receipt: UnvermintReceipt =
                client.unvermint(&view_key, &amount).await?.into_result()?;
            println!("TXID: {}", receipt.tx_hash);
        }
    }
    Ok(())
}
