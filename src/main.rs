//! Treasury Sweeper - wallet sweep and gas top-up reconciliation
//!
//! Each command runs one batch pass and exits; schedule it externally
//! (cron, systemd timer) for recurring reconciliation.
//!
//! # WARNING
//! - Passes move real funds. Check thresholds and the recipient with
//!   `sweeper config` before the first run.
//! - wallets.json holds recovery phrases. Keep the credentials directory private.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use treasury_sweeper::cli::commands;
use treasury_sweeper::config::Config;
use treasury_sweeper::reconcile::PassKind;

/// Treasury Sweeper - sweep and top-up reconciliation for custodial wallets
#[derive(Parser)]
#[command(name = "sweeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long, env = "SWEEPER_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep reward tokens from wallets at or above the threshold
    Sweep,

    /// Top up gas for wallets below the threshold
    TopUp,

    /// Run a sweep pass followed by a top-up pass
    Reconcile,

    /// Show the token balance of an address, or of every watched address,
    /// and its fiat value
    Balance {
        /// Account address (0x...); all watched addresses when omitted
        address: Option<String>,
    },

    /// Send a one-off amount from a registered wallet
    Transfer {
        /// Amount in display units
        #[arg(long)]
        amount: f64,

        /// B3TR (reward token) or VET (native coin)
        #[arg(long, default_value = "B3TR")]
        symbol: String,

        /// Address of the registered managed or funding wallet to send from
        #[arg(long)]
        from: String,

        /// Destination (defaults to the sweep recipient)
        #[arg(long)]
        to: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Watch-only address commands
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Wallet registry commands
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    /// List managed and funding wallets
    List,

    /// Generate a wallet from a fresh recovery phrase
    New {
        /// Phrase length (12 or 24)
        #[arg(long, default_value_t = 12)]
        words: usize,

        /// Register the wallet under this name
        #[arg(long)]
        name: Option<String>,

        /// Register into the funding pool instead of the managed wallets
        #[arg(long, requires = "name")]
        funding: bool,
    },

    /// Register a managed wallet from its recovery phrase
    Add {
        /// Human-readable name
        name: String,

        /// Recovery phrase (prompted for when omitted)
        #[arg(long)]
        phrase: Option<String>,
    },

    /// Register a funding wallet from its recovery phrase
    AddFunding {
        /// Human-readable name
        name: String,

        /// Recovery phrase (prompted for when omitted)
        #[arg(long)]
        phrase: Option<String>,
    },

    /// Soft delete a wallet by id or address
    Remove {
        /// Wallet id or address
        id: String,

        /// Remove from the funding pool instead of the managed wallets
        #[arg(long)]
        funding: bool,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum AddressAction {
    /// List watched addresses
    List,

    /// Watch an address
    Add {
        /// Account address (0x...)
        address: String,

        /// Human-readable name
        name: String,
    },

    /// Stop watching an address, by id or address
    Remove {
        id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("treasury_sweeper=info".parse()?);

    // Reports go to stdout, logs to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs)?;

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Sweep => commands::run_pass(&config, PassKind::Sweep).await,
        Commands::TopUp => commands::run_pass(&config, PassKind::TopUp).await,
        Commands::Reconcile => commands::reconcile(&config).await,
        Commands::Balance { address } => commands::balance(&config, address.as_deref()).await,
        Commands::Transfer {
            amount,
            symbol,
            from,
            to,
            force,
        } => commands::transfer(&config, &from, to.as_deref(), amount, &symbol, force).await,
        Commands::Address { action } => match action {
            AddressAction::List => commands::address_list(&config).await,
            AddressAction::Add { address, name } => {
                commands::address_add(&config, &address, &name).await
            }
            AddressAction::Remove { id, force } => {
                commands::address_remove(&config, &id, force).await
            }
        },
        Commands::Config => commands::show_config(&config),
        Commands::Wallet { action } => match action {
            WalletAction::List => commands::wallet_list(&config).await,
            WalletAction::New {
                words,
                name,
                funding,
            } => commands::wallet_new(&config, words, name.as_deref(), funding).await,
            WalletAction::Add { name, phrase } => commands::wallet_add(&config, &name, phrase).await,
            WalletAction::AddFunding { name, phrase } => {
                commands::wallet_add_funding(&config, &name, phrase).await
            }
            WalletAction::Remove { id, funding, force } => {
                commands::wallet_remove(&config, &id, funding, force).await
            }
        },
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
