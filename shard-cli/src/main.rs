//! SHARD CLI
//!
//! Command-line interface for the SHARD host-discovery index.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shard_api::{IndexServer, ServerConfig};
use shard_client::{NodeClient, Resolver, ResolverConfig};
use shard_core::traits::{HostKeyResolver, IndexReader};
use shard_core::types::{ChainEvent, HostPublicKey, NetAddress};
use shard_crypto::{generate_host_key, host_public_key, sign_announcement, signing_key_from_hex};
use shard_indexer::{ChainObserver, FileObserver, Indexer};
use shard_store::{FileStore, FileStoreConfig};

/// SHARD - Host-discovery index for decentralized storage
#[derive(Parser)]
#[command(name = "shard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which resolver backend to ask.
#[derive(Args)]
struct BackendArgs {
    #[command(flatten)]
    target: Target,

    /// Full node API password
    #[arg(long, env = "SHARD_NODE_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// SHARD index server address (answers are verified)
    #[arg(long, value_name = "ADDR")]
    shard: Option<String>,

    /// Full node API address (trusted)
    #[arg(long, value_name = "ADDR")]
    node: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the indexer and the index server
    Serve {
        /// Store directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Address to listen on
        #[arg(short, long)]
        addr: Option<String>,
        /// Chain feed (JSON lines) to index
        #[arg(short, long)]
        feed: Option<PathBuf>,
    },

    /// Replay a chain feed into the store
    Import {
        /// Store directory
        #[arg(short, long, env = "SHARD_DIR")]
        dir: PathBuf,
        /// Chain feed (JSON lines)
        #[arg(short, long, env = "SHARD_FEED")]
        feed: PathBuf,
    },

    /// Resolve host keys to network addresses
    Resolve {
        /// Host public keys (ed25519:<hex>)
        #[arg(required = true)]
        keys: Vec<String>,
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Check that hosts known to a full node are reachable
    Scan {
        /// Host public keys (ed25519:<hex>)
        #[arg(required = true)]
        keys: Vec<String>,
        /// Full node API address
        #[arg(long, value_name = "ADDR")]
        node: String,
        /// Full node API password
        #[arg(long, env = "SHARD_NODE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Print the backend's block height
    Height {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Print whether the backend is synced
    Synced {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Generate a new host key pair
    Keygen,

    /// Sign a host announcement
    Announce {
        /// Host secret key (hex)
        #[arg(long, env = "SHARD_HOST_SECRET", hide_env_values = true)]
        secret: String,
        /// Address to announce (host:port)
        #[arg(long)]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "shard=debug,tower_http=debug,info"
    } else {
        "shard=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { dir, addr, feed } => cmd_serve(dir, addr, feed).await,
        Commands::Import { dir, feed } => cmd_import(dir, feed).await,
        Commands::Resolve { keys, backend } => cmd_resolve(&keys, backend).await,
        Commands::Scan {
            keys,
            node,
            password,
        } => cmd_scan(&keys, &node, password).await,
        Commands::Height { backend } => cmd_height(backend).await,
        Commands::Synced { backend } => cmd_synced(backend).await,
        Commands::Keygen => cmd_keygen(),
        Commands::Announce { secret, addr } => cmd_announce(&secret, &addr),
    }
}

/// Uses the given node password, prompting for one on a terminal.
fn node_password(password: Option<String>) -> Result<Option<String>> {
    Ok(match password {
        Some(password) => Some(password),
        None if std::io::stdin().is_terminal() => Some(
            dialoguer::Password::new()
                .with_prompt("Node API password")
                .allow_empty_password(true)
                .interact()
                .context("Failed to read password")?,
        ),
        None => None,
    })
}

fn parse_keys(keys: &[String]) -> Result<Vec<HostPublicKey>> {
    keys.iter()
        .map(|k| k.parse::<HostPublicKey>().with_context(|| format!("Invalid host key {:?}", k)))
        .collect()
}

fn build_resolver(backend: BackendArgs) -> Result<Resolver> {
    let config = match (backend.target.shard, backend.target.node) {
        (Some(addr), _) => ResolverConfig::shard(&addr)?,
        (None, Some(addr)) => ResolverConfig::node(&addr, node_password(backend.password)?)?,
        (None, None) => bail!("one of --shard or --node is required"),
    };
    Ok(Resolver::from_config(config)?)
}

async fn open_indexer(dir: PathBuf, compact_threshold: u64) -> Result<Arc<Indexer>> {
    let config = FileStoreConfig::new(&dir).compact_threshold(compact_threshold);
    let store = FileStore::open(config)
        .await
        .with_context(|| format!("Failed to open store at {}", dir.display()))?;
    let indexer = Indexer::new(Arc::new(store))
        .await
        .context("Failed to start indexer")?;
    Ok(Arc::new(indexer))
}

/// Run indexer and API server
async fn cmd_serve(
    dir: Option<PathBuf>,
    addr: Option<String>,
    feed: Option<PathBuf>,
) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(dir) = dir {
        config.dir = dir;
    }
    if let Some(addr) = addr {
        config.addr = addr.parse().context("Invalid listen address")?;
    }
    if feed.is_some() {
        config.feed = feed;
    }

    println!("{}", "🚀 Starting SHARD index server...".cyan().bold());
    println!("   {} {}", "Store:".dimmed(), config.dir.display());
    println!("   {} http://{}", "Listening on:".green(), config.addr);
    println!("\n   Press Ctrl+C to stop.\n");

    let indexer = open_indexer(config.dir.clone(), config.compact_threshold).await?;

    let mut indexing = match config.feed.clone() {
        Some(feed) => {
            let indexer = indexer.clone();
            tokio::spawn(async move { indexer.run(&FileObserver::new(feed)).await })
        }
        None => tokio::spawn(std::future::pending()),
    };

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    let reader: Arc<dyn IndexReader> = indexer.clone();
    let mut server = tokio::spawn(IndexServer::new(reader).serve(listener, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    tokio::select! {
        res = &mut server => {
            res.context("Server task failed")?.context("Server error")?;
        }
        res = &mut indexing => {
            // A failed indexer means the store can no longer be trusted
            res.context("Indexer task failed")?.context("Indexer stopped")?;
            info!(height = indexer.height(), "Feed indexed, still serving");
            server.await.context("Server task failed")?.context("Server error")?;
        }
    }

    indexer.store().flush().await.context("Failed to flush store")?;
    println!("{}", "✅ Shut down cleanly.".green());
    Ok(())
}

/// Replay a feed into the store
async fn cmd_import(dir: PathBuf, feed: PathBuf) -> Result<()> {
    println!("{} {}", "📥 Importing chain feed:".cyan().bold(), feed.display());

    let indexer = open_indexer(dir, shard_api::DEFAULT_COMPACT_THRESHOLD).await?;
    let observer = FileObserver::new(&feed).synced_at_end(false);
    let total = observer
        .count_blocks()
        .await
        .context("Failed to read chain feed")?;
    let start_height = indexer.height();

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_position(start_height.min(total));

    let mut events = observer.subscribe(start_height).await?;
    while let Some(event) = events.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                pb.abandon();
                return Err(e).context("Chain feed broke, import incomplete");
            }
        };
        let is_block = matches!(event, ChainEvent::Apply(_));
        indexer.handle(event).await.context("Import failed")?;
        if is_block {
            pb.inc(1);
        }
    }
    indexer.store().flush().await.context("Failed to flush store")?;
    pb.finish_and_clear();

    let stats = indexer.stats();
    println!("\n{}", "✅ Import complete:".green().bold());
    println!("   {} {}", "Height:".dimmed(), indexer.height());
    println!("   {} {}", "Blocks applied:".dimmed(), stats.blocks_applied);
    println!("   {} {}", "Blocks reverted:".dimmed(), stats.blocks_reverted);
    println!("   {} {}", "Announcements stored:".dimmed(), stats.announcements_stored);
    if stats.announcements_skipped > 0 {
        println!(
            "   {} {}",
            "Announcements skipped:".yellow(),
            stats.announcements_skipped
        );
    }

    Ok(())
}

/// Resolve host keys
async fn cmd_resolve(keys: &[String], backend: BackendArgs) -> Result<()> {
    let keys = parse_keys(keys)?;
    let resolver = build_resolver(backend)?;

    println!(
        "{} {} host(s) via {}",
        "🔍 Resolving".cyan().bold(),
        keys.len(),
        resolver.backend()
    );

    let results =
        futures::future::join_all(keys.iter().map(|key| resolver.resolve_host_key(key))).await;

    let mut failed = 0;
    for (key, result) in keys.iter().zip(results) {
        match result {
            Ok(addr) => println!("   {} {} {}", "✓".green(), key, addr.to_string().bold()),
            Err(e) => {
                failed += 1;
                println!("   {} {} {}", "✗".red(), key, e.to_string().red());
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} lookups failed", failed, keys.len());
    }
    Ok(())
}

/// Scan hosts through a full node
async fn cmd_scan(keys: &[String], node: &str, password: Option<String>) -> Result<()> {
    let keys = parse_keys(keys)?;
    let client = NodeClient::new(node, node_password(password)?)?;

    println!("{} {} host(s) via {}", "📡 Scanning".cyan().bold(), keys.len(), node);

    let results = futures::future::join_all(keys.iter().map(|key| client.scan(key))).await;

    let mut failed = 0;
    for (key, result) in keys.iter().zip(results) {
        match result {
            Ok(host) => println!(
                "   {} {} {} {}",
                "✓".green(),
                key,
                host.net_address.to_string().bold(),
                format!("{} ms", host.latency.as_millis()).dimmed()
            ),
            Err(e) => {
                failed += 1;
                println!("   {} {} {}", "✗".red(), key, e.to_string().red());
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} hosts unreachable", failed, keys.len());
    }
    Ok(())
}

/// Print backend height
async fn cmd_height(backend: BackendArgs) -> Result<()> {
    let resolver = build_resolver(backend)?;
    let height = resolver.chain_height().await.context("Failed to fetch height")?;
    println!("{}", height);
    Ok(())
}

/// Print backend sync state
async fn cmd_synced(backend: BackendArgs) -> Result<()> {
    let resolver = build_resolver(backend)?;
    let synced = resolver.synced().await.context("Failed to fetch sync state")?;
    println!("{}", synced);
    Ok(())
}

/// Generate a host key pair
fn cmd_keygen() -> Result<()> {
    println!("{}", "🔑 Generating host key...".cyan().bold());

    let key = generate_host_key();

    println!("\n   {} {}", "Public key:".green(), host_public_key(&key));
    println!("   {} {}", "Secret key:".yellow(), hex::encode(key.to_bytes()));

    println!("\n{}", "⚠️  IMPORTANT: Keep your secret key safe!".red().bold());
    println!("   Anyone holding it can announce addresses for this host.");

    Ok(())
}

/// Sign an announcement
fn cmd_announce(secret: &str, addr: &str) -> Result<()> {
    let key = signing_key_from_hex(secret).context("Invalid secret key")?;
    let addr = NetAddress::parse(addr).context("Invalid address")?;
    let record = sign_announcement(&key, addr.clone());

    println!("{}", "📣 Signed announcement:".cyan().bold());
    println!("   {} {}", "Host:".dimmed(), host_public_key(&key));
    println!("   {} {}", "Address:".dimmed(), addr);
    println!("\n{}", "Arbitrary data (hex):".yellow().bold());
    println!("{}", hex::encode(record.to_bytes()));

    Ok(())
}
