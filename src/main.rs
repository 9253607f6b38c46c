use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use vesting_state_sync::config::{CONFIG_FILE_NAME, Config};
use vesting_state_sync::export::{VestingExporter, export_accounts};
use vesting_state_sync::genesis::{AccountStore, ExportOutput, GENESIS_FILE_NAME, GenesisStore};
use vesting_state_sync::node::{CachedChainSource, NodeClient};
use vesting_state_sync::utils::AddressCodec;

const DEFAULT_HOME_DIR: &str = ".vesting-state-sync";

#[derive(Parser)]
#[command(name = "vesting-state-sync")]
#[command(about = "Rebuild the delegation buckets of genesis vesting accounts from chain history", long_about = None)]
struct Cli {
	/// Directory holding config.yaml and genesis.json (default: ~/.vesting-state-sync)
	#[arg(long, global = true)]
	home: Option<PathBuf>,

	#[command(subcommand)]
	cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Replay every vesting account's delegations and export the fixed auth genesis state
	Export {
		/// Highest block height to replay; 0 uses the latest committed height
		#[arg(long, default_value_t = 0)]
		max_height: u64,

		/// File to write the auth genesis state to; stdout when omitted
		#[arg(long)]
		output: Option<PathBuf>,

		/// Only reconcile this account
		#[arg(long)]
		address: Option<String>,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	let home = match cli.home {
		Some(home) => home,
		None => default_home()?,
	};

	match cli.cmd {
		Commands::Export {
			max_height,
			output,
			address,
		} => run_export(home, max_height, output, address).await,
	}
}

fn default_home() -> Result<PathBuf> {
	let home = std::env::var_os("HOME").context("HOME is not set, pass --home")?;
	Ok(PathBuf::from(home).join(DEFAULT_HOME_DIR))
}

async fn run_export(
	home: PathBuf,
	max_height: u64,
	output: Option<PathBuf>,
	address: Option<String>,
) -> Result<()> {
	let config = Config::read(&home.join(CONFIG_FILE_NAME))
		.await
		.context("failed to load config")?;
	let codec = AddressCodec::new(config.chain.bech32_prefix.clone());

	let output = output.map_or(ExportOutput::Stdout, ExportOutput::File);
	let store = GenesisStore::new(home.join(GENESIS_FILE_NAME), output, codec.clone());

	let mut accounts = store
		.load_accounts()
		.await
		.context("failed to load genesis vesting accounts")?;
	if let Some(address) = &address {
		codec
			.validate(address)
			.with_context(|| format!("invalid --address {}", address))?;
		accounts.retain(|account| &account.address == address);
		if accounts.is_empty() {
			bail!("{} is not a vesting account of the genesis", address);
		}
	}

	let client = NodeClient::new(&config.node).context("failed to build node client")?;
	let exporter =
		VestingExporter::new(CachedChainSource::new(client)).with_limit_height(max_height);
	let height = exporter
		.resolve_height()
		.await
		.context("failed to resolve the export height")?;

	let shutdown = spawn_shutdown_signal(config.export.timeout());

	let started = Instant::now();
	let report = export_accounts(
		&exporter,
		&accounts,
		height,
		config.export.concurrency,
		shutdown,
	)
	.await;
	info!(
		"Export at height {} finished in {:.2?}: {} ({} cached balance lookups)",
		report.height,
		started.elapsed(),
		report.stats.summary(),
		exporter.source().cached_balances().await
	);

	if !report.is_complete() {
		for failure in report.failures() {
			error!("{}", failure);
		}
		bail!(
			"{} of {} accounts were not reconciled, nothing was exported",
			report.reports.len() - report.succeeded(),
			report.reports.len()
		);
	}

	store
		.store_accounts(&report.reconciled_accounts())
		.await
		.context("failed to write exported state")?;
	Ok(())
}

/// Flip the returned receiver on Ctrl-C or once `timeout` has elapsed.
fn spawn_shutdown_signal(timeout: Option<Duration>) -> watch::Receiver<bool> {
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	tokio::spawn(async move {
		let deadline = async {
			match timeout {
				Some(timeout) => tokio::time::sleep(timeout).await,
				None => std::future::pending().await,
			}
		};
		tokio::select! {
			_ = tokio::signal::ctrl_c() => warn!("Interrupted, waiting for in-flight accounts"),
			_ = deadline => warn!("Export timeout reached, waiting for in-flight accounts"),
		}
		let _ = shutdown_tx.send(true);
	});
	shutdown_rx
}
