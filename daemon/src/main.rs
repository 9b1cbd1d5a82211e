//! Lattice daemon: runs the block ingestion pipeline over an LMDB ledger.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lattice_crypto::encode_account;
use lattice_ledger::{Block, Ledger, LedgerConstants, ProcessOutcome};
use lattice_node::{init_logging, BlockProcessor, NodeConfig, ShutdownController, WriteQueue};
use lattice_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use lattice_types::NetworkId;

#[derive(Parser)]
#[command(name = "lattice-daemon", about = "Lattice block ingestion daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long, env = "LATTICE_CONFIG")]
    config: Option<PathBuf>,

    /// Network whose ledger constants to use: "live", "test" or "dev".
    #[arg(long, env = "LATTICE_NETWORK")]
    network: Option<NetworkId>,

    /// Data directory for ledger storage.
    #[arg(long, env = "LATTICE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. "info" or "debug,lattice_node=trace".
    #[arg(long, env = "LATTICE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Open the ledger and process blocks until SIGINT/SIGTERM.
    Run,
    /// Submit newline-delimited JSON blocks from a file and wait for them.
    Import {
        /// File with one JSON-encoded block per line.
        file: PathBuf,
    },
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    fn effective_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}

fn open_processor(config: &NodeConfig) -> anyhow::Result<Arc<BlockProcessor>> {
    check_data_dir(&config.data_dir)?;
    let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)
        .with_context(|| format!("opening ledger at {}", config.data_dir.display()))?;
    let report = check_integrity(&env)?;
    if !report.is_healthy() {
        anyhow::bail!("ledger integrity check failed: {}", report.errors.join("; "));
    }

    let constants = LedgerConstants::for_network(config.network);
    let genesis = encode_account(&constants.genesis_account);
    let ledger = Ledger::new(Arc::new(env), constants)?;
    tracing::info!(
        network = config.network.as_str(),
        data_dir = %config.data_dir.display(),
        %genesis,
        blocks = ledger.block_count()?,
        "ledger opened"
    );

    let processing = &config.block_processor;
    let write_queue = Arc::new(WriteQueue::new(processing.write_priority_bump()));
    let processor = BlockProcessor::new(processing.clone(), Arc::new(ledger), write_queue)?;
    processor.start()?;
    Ok(Arc::new(processor))
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let processor = open_processor(&config)?;
    tracing::info!(
        network = config.network.as_str(),
        "lattice daemon running, waiting for shutdown signal"
    );

    let shutdown = ShutdownController::new();
    shutdown.wait_for_signal().await?;

    tokio::task::spawn_blocking(move || processor.stop()).await?;
    tracing::info!("lattice daemon exited cleanly");
    Ok(())
}

fn import(processor: &BlockProcessor, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut submitted = 0u64;
    let mut malformed = 0u64;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Block>(&line) {
            Ok(block) => {
                if !processor.add_local(block) {
                    anyhow::bail!("block processor stopped during import");
                }
                submitted += 1;
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed block");
                malformed += 1;
            }
        }
    }

    processor.flush();
    let metrics = processor.metrics();
    for outcome in ProcessOutcome::ALL {
        let count = metrics.outcome_count(outcome);
        if count > 0 {
            tracing::info!(%outcome, count, "import outcome");
        }
    }
    tracing::info!(
        submitted,
        malformed,
        unchecked = processor.unchecked_len(),
        "import finished"
    );
    processor.stop();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(config.log_format(), &config.log_level)
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))?;

    match cli.command {
        Command::Run => run(config).await,
        Command::Import { file } => {
            let processor = open_processor(&config)?;
            tokio::task::spawn_blocking(move || import(&processor, &file)).await?
        }
        Command::Config => Ok(()),
    }
}
