use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use procwatch::config::{self, Config};
use procwatch::export;
use procwatch::live;
use procwatch::metrics::buffer::{BufferHandle, SeriesBuffer};
use procwatch::metrics::metric_keys;
use procwatch::sampler::Sampler;
use procwatch::system::collector::{MetricSource, SysinfoSource};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "procwatch",
    about = "Process and system metrics monitor with reports and a live dashboard"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duration to run in seconds (default: run until ctrl-c)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Sampling interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Output directory for exported files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Enable the live dashboard regardless of config setting
    #[arg(long, default_value_t = false)]
    live: bool,

    /// Port for the live dashboard (overrides config setting)
    #[arg(long)]
    port: Option<u16>,

    /// Generate PDF reports regardless of config setting
    #[arg(long, default_value_t = false)]
    pdf: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli)?;
    run(config, cli.duration.map(Duration::from_secs)).await
}

async fn run(config: Config, duration: Option<Duration>) -> Result<()> {
    std::fs::create_dir_all(&config.settings.output_dir).wrap_err_with(|| {
        format!(
            "failed to create output directory {}",
            config.settings.output_dir.display()
        )
    })?;

    let source = SysinfoSource::new();
    let keys = metric_keys(source.core_count(), &config.processes);
    let buffer = BufferHandle::new(SeriesBuffer::new(keys, config.settings.max_samples));
    let interval = Duration::from_secs(config.settings.interval_secs.max(1));
    let (sampler, updates) = Sampler::new(source, buffer.clone(), config.processes.clone(), interval);

    let (stop_tx, stop_rx) = watch::channel(false);
    {
        let stop_tx = stop_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, finishing current tick");
                let _ = stop_tx.send(true);
            }
        });
    }

    let live_task = if config.settings.live_enabled {
        let port = config.settings.live_port;
        info!(port, "live dashboard enabled");
        Some(tokio::spawn(live::serve(
            buffer.clone(),
            updates,
            port,
            stop_rx.clone(),
        )))
    } else {
        None
    };

    let target_names: Vec<&str> = config.processes.iter().map(|t| t.name.as_str()).collect();
    info!(
        targets = ?target_names,
        interval_secs = config.settings.interval_secs,
        "starting monitor"
    );

    let run_started = chrono::Local::now();
    sampler.run(duration, stop_rx).await;
    let _ = stop_tx.send(true);

    if let Some(task) = live_task {
        match task.await {
            Ok(Err(err)) => warn!(error = %err, "live dashboard ended with error"),
            Err(err) => warn!(error = %err, "live dashboard task failed"),
            Ok(Ok(())) => {}
        }
    }

    let snapshot = buffer.snapshot();
    if snapshot.is_empty() {
        info!("no samples collected, skipping export");
        return Ok(());
    }

    info!("saving data and generating reports");
    let stamp = run_started.format("%Y%m%d_%H%M%S");
    let base = config
        .settings
        .output_dir
        .join(format!("monitor_data_{stamp}"));

    let csv_path = base.with_extension("csv");
    export::csv::write_csv(&snapshot, &csv_path)?;
    info!(path = %csv_path.display(), "tabular export written");

    for path in export::report::write_reports(&snapshot, &base)? {
        info!(path = %path.display(), "visual report written");
    }

    if config.settings.pdf_enabled {
        #[cfg(feature = "pdf-export")]
        for path in export::pdf::write_pdf_reports(&snapshot, &base)? {
            info!(path = %path.display(), "pdf report written");
        }
        #[cfg(not(feature = "pdf-export"))]
        warn!("pdf output requested but this build lacks the `pdf-export` feature");
    }

    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from_path(path)?,
        None => config::load_config()?,
    };

    if let Some(interval) = cli.interval {
        config.settings.interval_secs = interval;
    }
    if let Some(ref dir) = cli.output_dir {
        config.settings.output_dir = dir.clone();
    }
    if cli.live {
        config.settings.live_enabled = true;
    }
    if let Some(port) = cli.port {
        config.settings.live_port = port;
    }
    if cli.pdf {
        config.settings.pdf_enabled = true;
    }

    Ok(config)
}
