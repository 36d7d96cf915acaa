mod collector;
mod config;
mod devices;
mod error;
mod logging;
mod routes;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Instrument;

use collector::Collector;
use config::{CliArgs, Command, Config, Credentials};
use devices::Inventory;
use devices::ssh::SshTransport;
use routes::compare::{DiffReport, RouteComparator};
use routes::namer::SnapshotNamer;
use routes::store::SnapshotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_args = CliArgs::parse();

    if let Command::InitConfig { path } = &cli_args.command {
        if config::write_default_config(path)? {
            println!("Created {}", path.display());
        } else {
            println!("{} already exists, leaving it untouched", path.display());
        }
        return Ok(());
    }

    let config = Config::from_args(&cli_args)?;
    logging::init(config.log_level, config.log_file.as_deref())?;

    let run_id = uuid::Uuid::new_v4();
    let start = Instant::now();
    let local_hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!("{} Application Starting {}", "#".repeat(25), "#".repeat(25));
    tracing::info!(
        "Run {} on {} at {}",
        run_id,
        local_hostname,
        chrono::Local::now().format("%m-%d-%Y_T%H:%M:%S")
    );
    if let Ok(cwd) = std::env::current_dir() {
        tracing::info!("Working directory: {}", cwd.display());
    }
    if let Some(source) = &config.source {
        tracing::info!("Loaded configuration from {}", source.display());
    }

    let result = run(cli_args.command, &config)
        .instrument(tracing::info_span!("run", id = %run_id))
        .await;

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    tracing::info!("{} Application Finished {}", "#".repeat(25), "#".repeat(25));
    tracing::info!("Execution took {:.2} seconds", start.elapsed().as_secs_f64());

    result
}

async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Collect {
            username,
            password,
            secret,
            ..
        } => {
            let credentials = Credentials::new(username, password, secret)?;
            collect(config, credentials).await
        }
        Command::Compare {
            baseline,
            migrated,
            host,
            report,
        } => {
            let namer = SnapshotNamer::new(&config.output_dir, config.format);
            compare(&namer, baseline.zip(migrated), host, report.as_deref())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

async fn collect(config: &Config, credentials: Credentials) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Cannot create output directory {}",
            config.output_dir.display()
        )
    })?;

    let inventory = Inventory::load(&config.devices_file)?;
    for rejected in &inventory.rejected {
        tracing::error!("Skipping device list entry: {}", rejected);
    }
    tracing::info!(
        "Processed {}. Devices found: {}",
        config.devices_file.display(),
        inventory.devices.len()
    );

    let transport = SshTransport::new(credentials, config.ssh_timeout);
    let store = SnapshotStore::new(SnapshotNamer::new(&config.output_dir, config.format));
    tracing::info!("Writing snapshots under {}", store.namer().root().display());
    let collector = Collector::new(transport, store, config.ssh_port, config.ping.clone());

    let summary = collector.run(&inventory.devices).await;
    summary.log();
    Ok(())
}

fn compare(
    namer: &SnapshotNamer,
    pair: Option<(PathBuf, PathBuf)>,
    host: Option<String>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    // A single comparison fails the command; a fleet sweep logs and moves on
    if let Some((baseline, migrated)) = pair {
        let report = RouteComparator::compare(&baseline, &migrated)?;
        return emit(&report, report_path);
    }
    if let Some(host) = host {
        let report = RouteComparator::compare_host(namer, &host)?;
        return emit(&report, report_path);
    }
    if report_path.is_some() {
        anyhow::bail!("--report needs --host or --baseline/--migrated");
    }

    let hosts = namer.hosts()?;
    if hosts.is_empty() {
        tracing::warn!("No host directories found under {}", namer.root().display());
    }

    for host in &hosts {
        match RouteComparator::compare_host(namer, host) {
            Ok(report) => emit(&report, None)?,
            Err(e) => tracing::error!(
                "Comparison for {} aborted ({} error): {}",
                host,
                e.class(),
                e
            ),
        }
    }
    Ok(())
}

fn emit(report: &DiffReport, report_path: Option<&Path>) -> anyhow::Result<()> {
    if report.is_empty() {
        tracing::info!(
            "Every route in {} is present in {}",
            report.baseline.display(),
            report.migrated.display()
        );
    }
    tracing::info!(
        "{} route(s) from {} missing in {}",
        report.len(),
        report.baseline.display(),
        report.migrated.display()
    );
    print!("{}", report.render());

    if let Some(path) = report_path {
        report.write_to(path)?;
        tracing::info!("Wrote missing routes to {}", path.display());
    }
    Ok(())
}
