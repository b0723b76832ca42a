pub mod config;
pub mod handler;
pub mod model;
pub mod search;
pub mod service;
pub mod storage;
pub mod transport;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use config::ReportConfig;
use handler::RequestHandler;
use search::Searcher;
use storage::{DocumentStore, MemoryStore, SqliteStore};
use transport::{EventClient, EventServer, InboundEvent};

/// SQLite busy timeout for CLI-opened stores.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "report",
    version,
    about = "Inventory report service answering search events"
)]
pub struct Cli {
    /// Path to the SQLite database (overrides REPORT_DB_PATH)
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the event server
    Serve {
        /// Serve from an in-memory store instead of SQLite
        #[arg(long)]
        memory: bool,

        /// JSON-lines file preloaded into the in-memory store
        #[arg(long, requires = "memory")]
        seed: Option<PathBuf>,

        /// Override the socket path (REPORT_SOCKET)
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    /// Run one search against the store and print the response payload
    Query {
        /// Criteria set, e.g. '{"inventory":[{"field":"sku","type":"int","equal":"1"}]}'
        criteria: String,
    },
    /// Load JSON-lines inventory documents into the SQLite store
    Seed {
        /// File with one JSON document per line
        file: PathBuf,
    },
    /// Publish a search to a running server and print the result
    Send {
        /// Criteria set as JSON
        criteria: String,

        #[arg(long, default_value_t = 0)]
        aggregate_id: i32,

        /// Defaults to a generated id
        #[arg(long)]
        correlation_id: Option<String>,

        /// How long to wait for the result
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,

        /// Override the socket path (REPORT_SOCKET)
        #[arg(long)]
        socket: Option<PathBuf>,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = ReportConfig::from_env();
    if let Some(db) = cli.db {
        cfg.db_path = db;
    }
    cfg.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Serve {
            memory,
            seed,
            socket,
        } => {
            if let Some(socket) = socket {
                cfg.socket_path = socket;
            }
            run_serve(&cfg, memory, seed.as_deref()).await
        }
        Commands::Query { criteria } => run_query(&cfg, &criteria).await,
        Commands::Seed { file } => run_seed(&cfg, &file),
        Commands::Send {
            criteria,
            aggregate_id,
            correlation_id,
            timeout_ms,
            socket,
        } => {
            if let Some(socket) = socket {
                cfg.socket_path = socket;
            }
            let correlation_id = correlation_id.unwrap_or_else(generate_correlation_id);
            let event = InboundEvent::new(aggregate_id, correlation_id, criteria.into_bytes());
            run_send(&cfg, event, Duration::from_millis(timeout_ms)).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "report", &mut std::io::stdout());
            Ok(())
        }
    }
}

async fn run_serve(cfg: &ReportConfig, memory: bool, seed: Option<&Path>) -> Result<()> {
    let store: Arc<dyn DocumentStore> = if memory {
        let store = MemoryStore::new();
        if let Some(path) = seed {
            for doc in read_documents(path)? {
                store.insert(doc);
            }
        }
        if store.is_empty() {
            warn!("in-memory store is empty; every search will report no results");
        } else {
            info!(documents = store.len(), "using in-memory store");
        }
        Arc::new(store)
    } else {
        Arc::new(open_sqlite(cfg)?)
    };

    let searcher = Searcher::new(store, cfg.store_timeout);
    info!(
        backend = searcher.backend(),
        timeout_ms = cfg.store_timeout.as_millis() as u64,
        "search backend ready"
    );
    let handler = RequestHandler::new(searcher, cfg.failure_policy);
    let server = EventServer::new(cfg.server_config(), handler);
    server.run().await.with_context(|| {
        format!(
            "event server failed on socket {}",
            cfg.socket_path.display()
        )
    })
}

async fn run_query(cfg: &ReportConfig, criteria: &str) -> Result<()> {
    let set = search::decode_criteria(criteria.as_bytes())
        .context("failed to decode search criteria")?;
    let store = Arc::new(open_sqlite(cfg)?);
    let searcher = Searcher::new(store, cfg.store_timeout);

    let records = searcher.search(&set).await.context("inventory search failed")?;
    let summaries: Vec<model::InventorySummary> =
        records.iter().map(model::InventorySummary::from).collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn run_seed(cfg: &ReportConfig, file: &Path) -> Result<()> {
    let docs = read_documents(file)?;
    let store = open_sqlite(cfg)?;
    let inserted = store.insert_many(docs.iter())?;
    info!(
        file = %file.display(),
        inserted,
        total = store.count()?,
        "seeded inventory documents"
    );
    println!("inserted {inserted} documents into {}", store.collection());
    Ok(())
}

async fn run_send(cfg: &ReportConfig, event: InboundEvent, wait: Duration) -> Result<()> {
    let mut client = EventClient::connect(&cfg.socket_path, Duration::from_secs(2))
        .await
        .with_context(|| format!("failed to connect to {}", cfg.socket_path.display()))?;
    client.publish(&event).await?;

    let Some(reply) = client.next_result(wait).await? else {
        bail!(
            "no result for {} within {} ms (the request may have been dropped)",
            event.correlation_id,
            wait.as_millis()
        );
    };
    if let Some(error) = reply.error {
        bail!("search failed: {error}");
    }

    let body: Value =
        serde_json::from_slice(&reply.result).context("result payload is not valid JSON")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn open_sqlite(cfg: &ReportConfig) -> Result<SqliteStore> {
    SqliteStore::open(&cfg.db_path, cfg.collection.clone(), BUSY_TIMEOUT)
        .with_context(|| format!("failed to open store at {}", cfg.db_path.display()))
}

/// Read one JSON document per non-blank line.
pub fn read_documents(path: &Path) -> Result<Vec<Value>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut docs = Vec::new();
    for (lineno, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid JSON document", path.display(), lineno + 1))?;
        if !doc.is_object() {
            bail!("{}:{}: document is not an object", path.display(), lineno + 1);
        }
        docs.push(doc);
    }
    Ok(docs)
}

fn generate_correlation_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("report-cli-{}-{nanos:x}", std::process::id())
}
