//! Casgate CLI - Command line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casgate_auth::{accept_callback, AuthBackend, CasBackend, CasConfig, ProxyTicketClient};
use casgate_storage::{unix_now, ProxyTicketStore};
use casgate_storage_sqlite::SqliteStore;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "casgate")]
#[command(about = "Casgate - CAS ticket validation and proxy ticket management")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/casgate.toml", env = "CASGATE_CONFIG")]
    config: PathBuf,

    /// Proxy ticket database (SQLite). Without it the proxy handshake is skipped.
    #[arg(long, env = "CASGATE_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a service or proxy ticket
    Validate {
        /// Ticket issued by the CAS server
        #[arg(long)]
        ticket: String,
        /// Service URL the ticket was issued for
        #[arg(long)]
        service: String,
    },
    /// Record a proxy-granting ticket delivered to the callback
    Callback {
        /// IOU identifier
        #[arg(long)]
        pgt_iou: String,
        /// Proxy-granting ticket
        #[arg(long)]
        pgt_id: String,
    },
    /// Request a proxy ticket for a user
    Proxy {
        /// CAS username
        #[arg(long)]
        username: String,
        /// Service the proxy ticket is for
        #[arg(long)]
        target_service: String,
    },
    /// Delete undelivered IOUs older than the given age
    Purge {
        /// Maximum IOU age in seconds
        #[arg(long, default_value = "3600")]
        older_than_secs: i64,
    },
    /// Print the CAS login URL for a service
    LoginUrl {
        /// Service URL to return to after login
        #[arg(long)]
        service: String,
    },
}

// ============================================================================
// Commands
// ============================================================================

async fn open_store(db: Option<&PathBuf>) -> Result<Option<Arc<dyn ProxyTicketStore>>> {
    match db {
        Some(path) => {
            let store = SqliteStore::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let store: Arc<dyn ProxyTicketStore> = Arc::new(store);
            Ok(Some(store))
        },
        None => Ok(None),
    }
}

async fn require_store(db: Option<&PathBuf>) -> Result<Arc<dyn ProxyTicketStore>> {
    match open_store(db).await? {
        Some(store) => Ok(store),
        None => bail!("This command needs --db or CASGATE_DB"),
    }
}

async fn cmd_validate(
    config: CasConfig,
    db: Option<&PathBuf>,
    ticket: &str,
    service: &str,
) -> Result<()> {
    let store = open_store(db).await?;
    let backend = CasBackend::new(config, store).context("Failed to create CAS backend")?;

    match backend.authenticate(ticket, service).await {
        Ok(ctx) => {
            println!("{}", serde_json::to_string_pretty(&ctx)?);
            Ok(())
        },
        Err(e) => {
            let out = serde_json::json!({ "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&out)?);
            bail!("Authentication failed");
        },
    }
}

async fn cmd_callback(db: Option<&PathBuf>, pgt_iou: &str, pgt_id: &str) -> Result<()> {
    let store = require_store(db).await?;
    accept_callback(&*store, pgt_iou, pgt_id).await?;
    println!("Stored proxy-granting ticket for IOU {pgt_iou}");
    Ok(())
}

async fn cmd_proxy(
    config: CasConfig,
    db: Option<&PathBuf>,
    username: &str,
    target_service: &str,
) -> Result<()> {
    config.validate()?;
    let store = require_store(db).await?;
    let client = ProxyTicketClient::new(Arc::new(config), store)?;

    let ticket = client.request_proxy_ticket(username, target_service).await?;
    println!("{ticket}");
    Ok(())
}

async fn cmd_purge(db: Option<&PathBuf>, older_than_secs: i64) -> Result<()> {
    if older_than_secs < 0 {
        bail!("--older-than-secs must not be negative");
    }
    let store = require_store(db).await?;
    let removed = store.purge_ious(unix_now() - older_than_secs).await?;
    println!("Removed {removed} stale IOU(s)");
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let db = cli.db.as_ref();

    let load_config = || {
        CasConfig::load(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))
    };

    match cli.command {
        Commands::Validate {
            ref ticket,
            ref service,
        } => cmd_validate(load_config()?, db, ticket, service).await,
        Commands::Callback {
            ref pgt_iou,
            ref pgt_id,
        } => cmd_callback(db, pgt_iou, pgt_id).await,
        Commands::Proxy {
            ref username,
            ref target_service,
        } => cmd_proxy(load_config()?, db, username, target_service).await,
        Commands::Purge { older_than_secs } => cmd_purge(db, older_than_secs).await,
        Commands::LoginUrl { ref service } => {
            println!("{}", load_config()?.login_url(service)?);
            Ok(())
        },
    }
}
