use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, info};

use launcher_common::config::VERSION;
use launcher_common::plan::{plan_hash, Plan};

use launcher::config::{LauncherConfig, OnlyFilter, RunConfig};
use launcher::error::{ConfigError, LauncherError};
use launcher::orchestrator;
use launcher::preflight;
use launcher::rpc::{CancelToken, HttpRpc, HttpRpcConfig};
use launcher::vault::WalletVault;
use launcher::verify;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[derive(Parser)]
#[command(name = "launcher", version = VERSION, about = "Atomic token launcher (plan-first, prod-safe)")]
struct Cli {
    /// Set log level
    #[clap(long, value_enum, default_value_t, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a plan
    Run(RunArgs),
    /// Dry-run planners and verify configuration
    Preflight(PreflightArgs),
    /// Verify on-chain state against artifacts
    Verify(VerifyArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to plan JSON
    #[clap(long)]
    plan: PathBuf,

    /// RPC URL for the cluster
    #[clap(long)]
    rpc: String,

    /// Seed keypair JSON file (ed25519)
    #[clap(long)]
    seed_keypair: Option<PathBuf>,

    /// Compute unit price (micro-lamports)
    #[clap(long)]
    priority_fee: Option<u64>,

    /// Compute unit limit per tx
    #[clap(long, default_value_t = 1_000_000)]
    cu_limit: u32,

    /// Simulate each tx instead of sending
    #[clap(long)]
    simulate: bool,

    /// Resume from the last checkpoint
    #[clap(long)]
    resume: bool,

    /// Run a single step instead of the full pipeline
    #[clap(long, default_value = "all", value_parser = ["fund", "mint", "metadata", "lp", "lp_init", "buys", "all"])]
    only: String,

    /// Output state dir
    #[clap(long, default_value = "state")]
    out: PathBuf,

    /// Path to config YAML
    #[clap(long)]
    config: Option<PathBuf>,

    /// Cap the number of swap transactions emitted by the buys step
    #[clap(long)]
    max_buys: Option<usize>,
}

#[derive(clap::Args)]
struct PreflightArgs {
    /// Path to plan JSON
    #[clap(long)]
    plan: PathBuf,

    /// RPC URL for the cluster
    #[clap(long)]
    rpc: String,

    /// Path to config YAML
    #[clap(long)]
    config: Option<PathBuf>,

    /// Output state dir
    #[clap(long, default_value = "state")]
    out: PathBuf,
}

#[derive(clap::Args)]
struct VerifyArgs {
    /// State directory with artifacts
    #[clap(long, default_value = "state")]
    out: PathBuf,

    /// RPC URL for the cluster
    #[clap(long)]
    rpc: String,

    /// Path to config YAML
    #[clap(long)]
    config: Option<PathBuf>,
}

fn setup_logger(level: log::LevelFilter) {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Magenta)
        .trace(Color::BrightBlack);

    let result = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply();
    if result.is_err() {
        eprintln!("logger already initialized");
    }
}

fn load_plan(path: &PathBuf) -> Result<(Plan, Vec<u8>, String), LauncherError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let hash = plan_hash(&bytes);
    let plan = Plan::from_slice(&bytes)?;
    Ok((plan, bytes, hash))
}

fn build_rpc(url: &str) -> Result<HttpRpc, LauncherError> {
    HttpRpc::new(HttpRpcConfig::new(url))
        .map_err(|e| ConfigError::invalid("--rpc", e).into())
}

async fn run_command(args: RunArgs) -> Result<(), LauncherError> {
    let (plan, plan_bytes, hash) = load_plan(&args.plan)?;
    info!(
        "loaded plan {} ({}, {} wallets, {} scheduled)",
        plan.plan_id,
        plan.token.symbol,
        plan.wallets.len(),
        plan.schedule.len()
    );

    let config = LauncherConfig::load(args.config.as_deref())?;
    let run = RunConfig {
        out_dir: args.out.clone(),
        resume: args.resume,
        only: OnlyFilter::parse(&args.only)?,
        plan_hash: hash,
        cu_limit: Some(args.cu_limit),
        cu_price_micro: args
            .priority_fee
            .or(plan.tx_defaults.compute_unit_price_micro_lamports),
        simulate: args.simulate,
        max_buys: args.max_buys,
        seed_keypair: args.seed_keypair.clone(),
    };

    // persist the executed plan for audit
    std::fs::create_dir_all(&args.out).map_err(launcher::error::StateError::from)?;
    std::fs::write(args.out.join("plan.json"), &plan_bytes)
        .map_err(launcher::error::StateError::from)?;

    let vault = WalletVault::from_env()?;
    let rpc = build_rpc(&args.rpc)?;
    let cancel = CancelToken::new();
    cancel.install_interrupt_handler();

    orchestrator::execute(&plan, &run, &config, &rpc, &vault, &cancel).await?;

    use launcher::rpc::RpcClient;
    let _ = rpc.close().await;
    info!(
        "done. receipts: {} | artifacts: {}",
        args.out.join("receipts").display(),
        args.out.join("artifacts.json").display()
    );
    Ok(())
}

async fn preflight_command(args: PreflightArgs) -> Result<(), LauncherError> {
    let (plan, _bytes, hash) = load_plan(&args.plan)?;
    let config = LauncherConfig::load(args.config.as_deref())?;
    let rpc = build_rpc(&args.rpc)?;

    let report = preflight::run(&rpc, &plan, &hash, &config, &args.out).await?;
    for (check, ok) in &report.program_checks {
        info!("{}: {}", check, ok);
    }
    info!("simulate_metadata_ok: {}", report.simulate_metadata_ok);
    info!("simulate_init_ok: {}", report.simulate_init_ok);
    Ok(())
}

async fn verify_command(args: VerifyArgs) -> Result<(), LauncherError> {
    let config = LauncherConfig::load(args.config.as_deref())?;
    let rpc = build_rpc(&args.rpc)?;
    let (_report, ok) = verify::run(&rpc, &config, &args.out).await?;
    info!("verify result: {}", if ok { "OK" } else { "FAIL" });
    Ok(())
}

async fn dispatch(command: Command) -> Result<(), LauncherError> {
    match command {
        Command::Run(args) => run_command(args).await,
        Command::Preflight(args) => preflight_command(args).await,
        Command::Verify(args) => verify_command(args).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    setup_logger(cli.log_level.into());

    if let Err(e) = dispatch(cli.command).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
