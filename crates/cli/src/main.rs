//! Tidewear cart CLI - inspect and edit the shopper cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the guest cart
//! tw-cart show
//!
//! # Add two medium tees (product 12)
//! tw-cart add -p 12 -s M -q 2
//!
//! # Work against the signed-in cart instead
//! TIDEWEAR_TOKEN=... tw-cart update -p 12 -s M -q 1
//!
//! # Remove a line, or empty the cart
//! tw-cart remove -p 12 -s M
//! tw-cart clear
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart and its total
//! - `add` - Add units of a product in a size
//! - `update` - Set a line's quantity (0 or less removes it)
//! - `remove` - Remove a line
//! - `clear` - Empty the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tidewear_cart::CartConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tw-cart")]
#[command(author, version, about = "Tidewear cart client")]
struct Cli {
    /// Bearer token; without one the local guest cart is used
    #[arg(long, env = "TIDEWEAR_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart and its total
    Show,
    /// Add units of a product in a size
    Add {
        /// Product ID
        #[arg(short, long)]
        product: i32,

        /// Size label (e.g. `M`)
        #[arg(short, long)]
        size: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 or less removes it)
    Update {
        /// Product ID
        #[arg(short, long)]
        product: i32,

        /// Size label
        #[arg(short, long)]
        size: String,

        /// New quantity
        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Product ID
        #[arg(short, long)]
        product: i32,

        /// Size label
        #[arg(short, long)]
        size: String,
    },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
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

/// Map tracing levels to Sentry: errors and warnings become events, the
/// rest breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let mut config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(token) = cli.token.clone().filter(|t| !t.trim().is_empty()) {
        config.token = Some(SecretString::from(token));
    }

    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tidewear_cart=info,tw_cart=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!("Command failed: {e}");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn run(command: Commands, config: &CartConfig) -> Result<(), commands::CommandError> {
    let session = commands::CartSession::open(config).await;
    if let Some(notice) = session.notice() {
        eprintln!("{notice}");
    }

    let state = match command {
        Commands::Show => session.show().await,
        Commands::Add {
            product,
            size,
            quantity,
        } => session.add(product, &size, quantity).await?,
        Commands::Update {
            product,
            size,
            quantity,
        } => session.update(product, &size, quantity).await?,
        Commands::Remove { product, size } => session.remove(product, &size).await?,
        Commands::Clear => session.clear().await?,
    };

    print!("{}", commands::render_cart(&state));
    session.close().await
}
