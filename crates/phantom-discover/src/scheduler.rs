//! Scan runs and the daemon scheduling loop.
//!
//! A single run is: load baseline → sweep → per-host pipeline → diff →
//! seal + save snapshot → export → notify. History is only touched before
//! and after the concurrent phase.
//!
//! In daemon mode one tokio task per configured subnet ticks at that
//! subnet's interval; a semaphore limits how many runs overlap.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use phantom_core::ScanSnapshot;
use phantom_history::{FsSnapshotStore, SnapshotStore};
use phantom_intel::{diff_scans, ChangeReport, DeviceIntel, SignatureSet};
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};
use uuid::Uuid;

use crate::config::{DiscoverConfig, SubnetSchedule};
use crate::error::{DiscoverError, Result};
use crate::notify::TelegramNotifier;
use crate::oui::{self, OuiTable};
use crate::pipeline::{HostProbe, Pipeline, SystemProbe};
use crate::report::{self, ExportReport};

/// Everything a scan run needs, built once and shared by all runs.
pub struct ScanContext<P> {
    pipeline: Arc<Pipeline<P>>,
    store: FsSnapshotStore,
    config: DiscoverConfig,
    notifier: Option<TelegramNotifier>,
}

/// What a finished run produced.
#[derive(Debug)]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub snapshot: ScanSnapshot,
    pub changes: ChangeReport,
    pub report: ExportReport,
    pub snapshot_path: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
    pub csv_paths: Vec<PathBuf>,
    pub duration: std::time::Duration,
}

impl<P: HostProbe> ScanContext<P> {
    pub fn new(
        pipeline: Pipeline<P>,
        store: FsSnapshotStore,
        config: DiscoverConfig,
        notifier: Option<TelegramNotifier>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            config,
            notifier,
        }
    }

    pub fn pipeline(&self) -> &Pipeline<P> {
        &self.pipeline
    }

    /// Previous snapshot for `subnet`. Unreadable or tampered history is
    /// treated as no baseline.
    fn load_baseline(&self, subnet: &str) -> Option<ScanSnapshot> {
        match self.store.latest_for_subnet(subnet) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(subnet, error = %e, "Previous scan unusable, comparing against nothing");
                None
            }
        }
    }
}

/// Build the production context: system tools, OUI table, signatures,
/// history store and optional Telegram notifier.
pub async fn build_system_context(config: DiscoverConfig, notify: bool) -> Result<ScanContext<SystemProbe>> {
    let oui_path = Path::new(&config.oui_path);
    oui::ensure_downloaded(oui_path, &config.oui_url, Duration::from_secs(30)).await;
    let oui = OuiTable::load_or_empty(oui_path);
    if oui.is_empty() {
        tracing::warn!("OUI table is empty, every manufacturer will be Unknown");
    }

    let signatures = SignatureSet::load_or_empty(&config.signatures_path);
    let intel = DeviceIntel::new().with_signatures(signatures);

    let probe = SystemProbe::from_config(&config);
    let version = probe.scanner().verify_installation().await?;
    tracing::info!(nmap_version = %version.lines().next().unwrap_or("").trim(), "Nmap verified");

    let pipeline = Pipeline::new(probe, intel, oui, config.scan_ports.clone());
    let store = FsSnapshotStore::new(&config.history_dir)?;
    let notifier = if notify {
        TelegramNotifier::from_config(&config.telegram)
    } else {
        None
    };

    tracing::info!(
        signatures = pipeline.intel().signatures().len(),
        history = %store.root().display(),
        telegram = notifier.is_some(),
        "Scan context ready"
    );

    Ok(ScanContext::new(pipeline, store, config, notifier))
}

/// Execute one full scan of `subnet`.
///
/// Fails only when the sweep itself fails or finds no hosts; everything
/// after discovery degrades with a log line instead of aborting.
pub async fn run_single_scan<P: HostProbe>(ctx: &ScanContext<P>, subnet: &str) -> Result<ScanOutcome> {
    let scan_id = Uuid::new_v4();
    let start = Instant::now();

    tracing::info!(scan_id = %scan_id, subnet, "Starting scan");

    let previous = ctx.load_baseline(subnet);

    let ips = ctx.pipeline.probe().discover_hosts(subnet).await?;
    if ips.is_empty() {
        return Err(DiscoverError::NoHosts {
            subnet: subnet.to_string(),
        });
    }

    let devices = ctx.pipeline.process_network(ips, ctx.config.max_workers).await;
    let changes = diff_scans(&devices, previous.as_ref());

    let snapshot = phantom_history::seal(ScanSnapshot::new(subnet, devices))?;
    let snapshot_path = match ctx.store.save(&snapshot) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(scan_id = %scan_id, error = %e, "Failed to save scan history");
            None
        }
    };

    let report = ExportReport::build(
        scan_id,
        snapshot.timestamp,
        subnet,
        &snapshot.devices,
        ctx.pipeline.intel(),
        &changes,
    );
    let export_path = match report::export_json(&report, &ctx.config.export_dir) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(scan_id = %scan_id, error = %e, "Failed to write exportable report");
            None
        }
    };

    let mut csv_paths = Vec::new();
    if ctx.config.export_csv {
        for device in &snapshot.devices {
            match report::write_csv_report(device, &ctx.config.export_dir) {
                Ok(path) => csv_paths.push(path),
                Err(e) => {
                    tracing::warn!(scan_id = %scan_id, ip = %device.ip, error = %e, "Failed to write CSV report")
                }
            }
        }
    }

    if let Some(notifier) = &ctx.notifier {
        notifier.notify(&report, export_path.as_deref()).await;
    }

    let duration = start.elapsed();
    let summary = changes.changes().map(|c| c.summary.clone()).unwrap_or_default();
    tracing::info!(
        scan_id = %scan_id,
        subnet,
        devices = snapshot.devices.len(),
        high_risk = report.high_risk_count(),
        baseline = changes.changes().is_some(),
        changed = changes.has_changes(),
        new = summary.new_count,
        vanished = summary.vanished_count,
        escalated = summary.escalated_count,
        duration_ms = duration.as_millis(),
        "Scan complete"
    );

    Ok(ScanOutcome {
        scan_id,
        snapshot,
        changes,
        report,
        snapshot_path,
        export_path,
        csv_paths,
        duration,
    })
}

/// The scheduler manages periodic scan jobs for multiple subnets.
pub struct ScanScheduler<P> {
    context: Arc<ScanContext<P>>,
    concurrency: Arc<Semaphore>,
}

impl<P: HostProbe> ScanScheduler<P> {
    pub fn new(context: ScanContext<P>) -> Self {
        let concurrency = Arc::new(Semaphore::new(context.config.max_concurrent_scans.max(1)));
        Self {
            context: Arc::new(context),
            concurrency,
        }
    }

    /// Subnets to schedule; the default subnet hourly when none are configured.
    pub fn schedules(&self) -> Vec<SubnetSchedule> {
        let config = &self.context.config;
        if config.subnets.is_empty() {
            return vec![SubnetSchedule {
                cidr: config.default_subnet.clone(),
                name: None,
                interval_secs: 3600,
                enabled: true,
            }];
        }
        config.subnets.clone()
    }

    /// Run the scheduler, spawning a tokio task per subnet.
    /// Blocks indefinitely until all tasks complete or the runtime shuts down.
    pub async fn run(&self) -> Result<()> {
        let mut handles = Vec::new();

        for subnet in self.schedules() {
            if !subnet.enabled {
                tracing::info!(cidr = %subnet.cidr, "Subnet disabled, skipping");
                continue;
            }

            let context = Arc::clone(&self.context);
            let semaphore = Arc::clone(&self.concurrency);

            let handle = tokio::spawn(async move {
                run_subnet_loop(context, subnet, semaphore).await;
            });
            handles.push(handle);
        }

        tracing::info!(subnet_count = handles.len(), "Scheduler started");

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Subnet scan task panicked");
            }
        }

        Ok(())
    }
}

/// Per-subnet scan loop with configurable interval.
async fn run_subnet_loop<P: HostProbe>(
    context: Arc<ScanContext<P>>,
    subnet: SubnetSchedule,
    semaphore: Arc<Semaphore>,
) {
    let mut ticker = interval(Duration::from_secs(subnet.interval_secs.max(1)));
    let label = subnet.name.as_deref().unwrap_or(&subnet.cidr).to_string();

    loop {
        ticker.tick().await;

        tracing::info!(cidr = %subnet.cidr, name = %label, "Scheduled scan triggered");

        let Ok(_permit) = semaphore.acquire().await else {
            tracing::error!(cidr = %subnet.cidr, "Scan semaphore closed, stopping loop");
            return;
        };

        if let Err(e) = run_single_scan(context.as_ref(), &subnet.cidr).await {
            tracing::error!(cidr = %subnet.cidr, error = %e, "Scheduled scan failed");
        }
    }
}
