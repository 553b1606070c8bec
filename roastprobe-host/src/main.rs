use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use log::{info, warn};

use roastprobe_host::{run, ProbeConfig, ProbeContext, TransportKind};

/// Roaster telemetry probe: phase-derived heater and fan power plus sensor
/// readings, published over BLE (RBP) or UDP (RDP)
#[derive(Parser, Debug)]
#[command(name = "roastprobe", version, about)]
struct Cli {
    /// TOML configuration file; production defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured transport
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// Override the configured serial number
    #[arg(long)]
    serial: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for: Option<u64>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<ProbeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ProbeConfig::load(path).with_context(|| format!("invalid configuration {}", path.display()))?
        }
        None => ProbeConfig::default(),
    };
    if let Some(transport) = cli.transport {
        config.transport = transport;
    }
    if let Some(serial) = &cli.serial {
        config.serial = serial.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if cli.print_default_config {
        print!("{}", ProbeConfig::default().to_toml_string()?);
        return Ok(());
    }

    let config = load_config(&cli)?;
    let ctx = ProbeContext::new(config).context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async move {
        let stop = ctx.shutdown_handle();
        let run_for = cli.run_for.map(Duration::from_secs);
        tokio::spawn(async move {
            match run_for {
                Some(limit) => {
                    tokio::select! {
                        _ = tokio::time::sleep(limit) => info!("Run time of {:?} elapsed", limit),
                        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received"),
                    }
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Cannot listen for Ctrl-C, running until killed: {}", e);
                        return;
                    }
                    info!("Ctrl-C received");
                }
            }
            stop.trigger();
        });

        let summary = run(ctx).await?;
        println!("{summary}");
        Ok::<_, anyhow::Error>(())
    })
}
