//! Greenhouse CLI - cart and notification management from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with its server-computed total
//! greenhouse cart show
//!
//! # Add two units of a product, then change an entry's quantity
//! greenhouse cart add 6650f1c2e4 --quantity 2
//! greenhouse cart set 6650f1d9a1 3
//!
//! # List notifications, loading every page
//! greenhouse notifications list --all
//!
//! # Follow the unread count until Ctrl+C
//! greenhouse notifications watch
//! ```
//!
//! # Environment Variables
//!
//! See `greenhouse_client::config` for the backend settings. `SENTRY_DSN`
//! and `SENTRY_ENVIRONMENT` enable error reporting.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "greenhouse")]
#[command(author, version, about = "Greenhouse cart and notifications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        /// Product id
        product_id: String,

        /// Number of units
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Set the quantity of a cart entry (values below 1 are ignored)
    Set {
        /// Cart entry id
        entry_id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a cart entry
    Remove {
        /// Cart entry id
        entry_id: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum NotificationAction {
    /// List notifications
    List {
        /// Load every page instead of the first one
        #[arg(short, long)]
        all: bool,
    },
    /// Mark one notification as read
    Read {
        /// Notification id
        id: String,
    },
    /// Mark every notification as read
    ReadAll,
    /// Delete one notification
    Delete {
        /// Notification id
        id: String,
    },
    /// Delete every notification already read
    PurgeRead,
    /// Follow the unread count until interrupted
    Watch,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
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

#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "greenhouse_client=info,greenhouse_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if sentry_guard.is_some() {
        tracing::debug!("Sentry initialized");
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let session = commands::Session::from_env()?;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&session).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&session, product_id, quantity).await?,
            CartAction::Set { entry_id, quantity } => {
                commands::cart::set_quantity(&session, entry_id, quantity).await?;
            }
            CartAction::Remove { entry_id } => commands::cart::remove(&session, entry_id).await?,
            CartAction::Clear => commands::cart::clear(&session).await?,
        },
        Commands::Notifications { action } => match action {
            NotificationAction::List { all } => commands::notifications::list(&session, all).await?,
            NotificationAction::Read { id } => {
                commands::notifications::mark_as_read(&session, id).await?;
            }
            NotificationAction::ReadAll => {
                commands::notifications::mark_all_as_read(&session).await?;
            }
            NotificationAction::Delete { id } => {
                commands::notifications::delete(&session, id).await?;
            }
            NotificationAction::PurgeRead => {
                commands::notifications::delete_all_read(&session).await?;
            }
            NotificationAction::Watch => commands::notifications::watch(&session).await?,
        },
    }
    Ok(())
}
