mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};
use fundr_core::SortKey;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Print machine-readable JSON instead of text
    #[clap(long, global = true)]
    pub(crate) json: bool,

    #[clap(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// List campaigns, newest first unless sorted otherwise
    Explore {
        #[clap(long, default_value_t = SortKey::Latest, value_parser = parse_sort)]
        sort: SortKey,
        /// Page size, defaults to the configured page limit
        #[clap(long)]
        limit: Option<u32>,
        #[clap(long, default_value_t = 0)]
        cursor: u64,
        /// Number of pages to load
        #[clap(long, default_value_t = 1)]
        pages: u32,
        /// Keep loading until the listing is exhausted
        #[clap(long, conflicts_with = "pages")]
        all: bool,
    },
    /// Show a campaign and what the wallet can do with it
    Show {
        id: String,
        /// Evaluate actions for this address instead of the wallet
        #[clap(long)]
        viewer: Option<String>,
    },
    /// List the backers of a campaign
    Backers { id: String },
    /// Campaigns an address created or supports
    Account { address: Option<String> },
    /// Pledge ETH to a campaign
    Pledge { id: String, amount: String },
    /// Withdraw a pledge while the campaign is active
    Unpledge {
        id: String,
        /// ETH to withdraw, defaults to the whole pledge
        amount: Option<String>,
    },
    /// Reclaim a pledge from a campaign that missed its goal
    Refund { id: String },
    /// Claim the funds of a successful campaign
    Finalize { id: String },
    /// Upload metadata and deploy a new campaign
    Create {
        #[clap(long)]
        title: String,
        #[clap(long)]
        tagline: String,
        #[clap(long)]
        description: String,
        /// Funding goal in ETH
        #[clap(long)]
        goal: String,
        /// YYYY-MM-DD
        #[clap(long)]
        deadline: String,
        #[clap(long)]
        category: String,
        /// Cover image URL
        #[clap(long, default_value = "")]
        cover: String,
        /// Repeat for each milestone
        #[clap(long)]
        milestone: Vec<String>,
        /// Validate and print the metadata document without submitting
        #[clap(long)]
        dry_run: bool,
    },
    /// Transaction jobs submitted from this machine
    Jobs,
    /// Inspect or change stored settings
    Config {
        #[clap(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigCommands {
    /// Effective settings, environment overrides applied
    Show,
    /// Set a stored setting by dotted key, e.g. network.rpc_url
    Set { key: String, value: String },
    /// Store the wallet private key in the OS keychain
    SetKey { key: String },
    /// Remove the wallet private key from the OS keychain
    DeleteKey,
}

fn parse_sort(value: &str) -> Result<SortKey, String> {
    value.parse()
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    commands::run(cli).await
}
