//! CLI entry point for the phantom-discover network scanner.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use phantom_discover::config::DiscoverConfig;
use phantom_discover::report;
use phantom_discover::scheduler::{build_system_context, run_single_scan, ScanScheduler};

#[derive(Parser)]
#[command(name = "phantom-discover")]
#[command(about = "Local network scanner with device classification, risk scoring and change detection")]
struct Cli {
    /// Subnet to scan (CIDR notation, e.g., 192.168.1.0/24). Defaults to discover.default_subnet.
    #[arg(short, long)]
    subnet: Option<String>,

    /// Run a single one-shot scan and exit (the default).
    #[arg(long, conflicts_with = "daemon")]
    once: bool,

    /// Run as daemon with scheduled scans.
    #[arg(long)]
    daemon: bool,

    /// Config file prefix (default: phantom).
    #[arg(short, long, default_value = "phantom")]
    config: String,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,

    /// Skip the Telegram summary even when configured.
    #[arg(long)]
    no_notify: bool,

    /// Also write a CSV file per device into the export directory.
    #[arg(long)]
    csv: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let mut discover_config = load_discover_config(&cli.config)?;
    discover_config.export_csv |= cli.csv;
    let subnet = cli
        .subnet
        .clone()
        .unwrap_or_else(|| discover_config.default_subnet.clone());

    let context = build_system_context(discover_config, !cli.no_notify).await?;

    if cli.daemon && !cli.once {
        let sched = ScanScheduler::new(context);
        sched.run().await?;
        return Ok(());
    }

    let outcome = run_single_scan(&context, &subnet).await?;

    println!("{}", report::render_scan(&outcome.snapshot.devices, context.pipeline().intel()));
    print!("{}", report::render_changes(&outcome.changes));
    if let Some(path) = &outcome.export_path {
        println!("Report: {}", path.display());
    }
    if !outcome.csv_paths.is_empty() {
        println!("CSV reports: {}", outcome.csv_paths.len());
    }
    println!("Completed in {:.2}s", outcome.duration.as_secs_f64());

    Ok(())
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("PHANTOM")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(e) => {
            tracing::warn!(error = %e, "No usable [discover] config, using defaults");
            Ok(DiscoverConfig::default())
        }
    }
}
