//! Promo Bridge CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! promo-bridge-cli migrate
//!
//! # Show installed shops
//! promo-bridge-cli sessions list
//!
//! # Forget a shop (same effect as an app/uninstalled webhook)
//! promo-bridge-cli sessions remove example.myshopify.com
//!
//! # Print discount codes without touching Shopify
//! promo-bridge-cli code --count 5
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sessions` - Inspect and remove stored shop sessions
//! - `code` - Generate discount codes locally

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "promo-bridge-cli")]
#[command(author, version, about = "Promo Bridge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage stored shop sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Generate discount codes locally
    Code {
        /// Number of codes to print
        #[arg(short, long, default_value_t = 1)]
        count: usize,

        /// Characters per code
        #[arg(short, long, default_value_t = promo_bridge_server::services::CODE_LENGTH)]
        length: usize,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List installed shops
    List,
    /// Remove a shop's session
    Remove {
        /// Shop domain (`example.myshopify.com`)
        shop: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list().await?,
            SessionsAction::Remove { shop } => commands::sessions::remove(&shop).await?,
        },
        Commands::Code { count, length } => commands::code::generate(count, length),
    }
    Ok(())
}
