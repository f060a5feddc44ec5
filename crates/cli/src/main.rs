//! Referral Sync CLI - Capture referrals and sync them to the cart.
//!
//! # Usage
//!
//! ```bash
//! # Record the identifiers carried by a landing URL
//! referral-sync capture "https://shop.example.com/products/tee?ref=store1"
//!
//! # Print the stored record
//! referral-sync show
//!
//! # Push the stored identifiers to the cart if it lacks them
//! referral-sync reconcile
//!
//! # Forget the stored record (e.g. after checkout)
//! referral-sync clear
//!
//! # Capture, then reconcile on every line read from stdin
//! referral-sync watch "https://shop.example.com/?order_id=1001"
//! ```
//!
//! # Commands
//!
//! - `capture` - Merge URL identifiers into the stored record
//! - `show` - Print the stored record as JSON
//! - `reconcile` - Sync the stored record to cart attributes
//! - `clear` - Remove the stored record
//! - `watch` - Run the agent, one cart notification per stdin line

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use referral_sync::SyncConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "referral-sync")]
#[command(author, version, about = "Referral capture and cart attribute sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the identifiers on a page URL into the stored record
    Capture {
        /// Full page URL, including its query string
        url: String,
    },
    /// Print the stored record
    Show,
    /// Sync the stored record to the cart attributes
    Reconcile,
    /// Remove the stored record
    Clear,
    /// Capture from a page URL, then reconcile on every stdin line
    Watch {
        /// Full page URL, including its query string
        url: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter` and Sentry integration.
///
/// Logs go to stderr so `show` output stays machine-readable.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "referral_sync=info,referral_sync_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = SyncConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SyncConfig) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Capture { url } => commands::record::capture(config, &url)?,
        Commands::Show => commands::record::show(config)?,
        Commands::Reconcile => commands::sync::reconcile(config).await?,
        Commands::Clear => commands::record::clear(config)?,
        Commands::Watch { url } => commands::sync::watch(config, &url).await?,
    }
    Ok(())
}
