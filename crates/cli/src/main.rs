//! cartsync CLI - Drive the cart and wishlist engine from a terminal.
//!
//! Guest state and the credential persist under `CARTSYNC_STORAGE_DIR`, so
//! consecutive invocations behave like one shopper session.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of product 10 to the guest cart
//! cartsync cart add -p 10 -t "Tee" --price 15.00 -q 2
//!
//! # Show the cart
//! cartsync cart list
//!
//! # Log in: merges the guest cart and wishlist into the account
//! cartsync login --token "$TOKEN"
//!
//! # Back to the guest collections
//! cartsync logout
//! ```
//!
//! # Commands
//!
//! - `cart` - List, add, update, remove, clear, total
//! - `wishlist` - List, add, toggle, remove, clear
//! - `login` / `logout` / `status` - Session management

#![cfg_attr(not(test), forbid(unsafe_code))]

use cartsync::{Storefront, SyncConfig};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use error::CliError;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Cart and wishlist sync tools")]
struct Cli {
    /// Print collections as JSON
    #[arg(long, global = true)]
    json: bool,

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
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Store a credential and merge the guest collections into the account
    Login {
        /// Bearer token issued by the authentication flow
        #[arg(short, long, env = "CARTSYNC_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Drop the credential and return to the guest collections
    Logout,
    /// Show the session mode and collection sizes
    Status,
}

/// Catalog fields describing a product being added.
#[derive(clap::Args)]
struct ProductArgs {
    /// Catalog product ID
    #[arg(short, long)]
    product_id: i32,

    /// Product title
    #[arg(short, long, default_value = "")]
    title: String,

    /// Unit price
    #[arg(long, default_value = "0")]
    price: Decimal,

    /// Product image URL
    #[arg(long)]
    image: Option<String>,

    /// Product slug
    #[arg(long)]
    slug: Option<String>,
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines
    List,
    /// Add units of a product
    Add {
        #[command(flatten)]
        product: ProductArgs,

        /// Units to add
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,

        /// Selected color
        #[arg(long)]
        color: Option<String>,

        /// Selected size
        #[arg(long)]
        size: Option<String>,
    },
    /// Set the quantity of a line
    Update {
        /// Line ID
        #[arg(short, long)]
        id: String,

        /// New quantity (at least 1)
        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Line ID
        #[arg(short, long)]
        id: String,
    },
    /// Remove every line
    Clear,
    /// Show the unit count and total price
    Total,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlist entries
    List,
    /// Add a product
    Add {
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Add a product if absent, remove it if present
    Toggle {
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Remove an entry
    Remove {
        /// Entry ID
        #[arg(short, long)]
        id: String,
    },
    /// Remove every entry
    Clear,
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

    tracing::info!("Sentry initialized");
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
    let cli = Cli::parse();

    let config = SyncConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SyncConfig) -> Result<(), CliError> {
    let shop = Storefront::new(config)?;
    let format = output::Format::from_json_flag(cli.json);

    // Guest views come from the snapshot; authenticated ones need a fetch
    if shop.session().is_authenticated() {
        let (cart, wishlist) = shop.restore().await;
        commands::warn_unless_applied("cart reload", &cart);
        commands::warn_unless_applied("wishlist reload", &wishlist);
    }

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(&shop, format)?,
            CartAction::Add {
                product,
                quantity,
                color,
                size,
            } => {
                let item = commands::cart::item(product, color, size);
                commands::cart::add(&shop, item, quantity, format).await?;
            }
            CartAction::Update { id, quantity } => {
                commands::cart::update(&shop, &id, quantity, format).await?;
            }
            CartAction::Remove { id } => commands::cart::remove(&shop, &id, format).await?,
            CartAction::Clear => commands::cart::clear(&shop, format).await?,
            CartAction::Total => commands::cart::total(&shop),
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(&shop, format)?,
            WishlistAction::Add { product } => {
                commands::wishlist::add(&shop, commands::wishlist::item(product), format).await?;
            }
            WishlistAction::Toggle { product } => {
                commands::wishlist::toggle(&shop, commands::wishlist::item(product), format)
                    .await?;
            }
            WishlistAction::Remove { id } => {
                commands::wishlist::remove(&shop, &id, format).await?;
            }
            WishlistAction::Clear => commands::wishlist::clear(&shop, format).await?,
        },
        Commands::Login { token } => commands::session::login(&shop, &token).await?,
        Commands::Logout => commands::session::logout(&shop).await,
        Commands::Status => commands::session::status(&shop),
    }
    Ok(())
}
