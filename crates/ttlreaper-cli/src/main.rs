use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use ttlreaper_core::domain::CycleReport;
use ttlreaper_core::impls::StoreSnapshot;
use ttlreaper_core::observability::{CycleCounts, LogFormat, init_logging};
use ttlreaper_core::ports::FixedClock;
use ttlreaper_core::{Reaper, ReaperDriver, ReaperSettings};

/// Deletes labelled objects once their TTL has elapsed.
#[derive(Debug, Parser)]
#[command(name = "ttlreaper", version)]
struct Cli {
    /// Namespace holding the configuration record.
    #[arg(long, env = "OPERATOR_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Name of the configuration record.
    #[arg(long = "config-name", env = "TTLREAPER_CONFIG_NAME", global = true)]
    config_name: Option<String>,

    /// YAML settings file. Flags override its values.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Store snapshot (configuration records and objects) to reap.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Label key holding the TTL value.
    #[arg(long, global = true)]
    ttl_label: Option<String>,

    /// Report expired objects without deleting them.
    #[arg(long, global = true)]
    dry_run: bool,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty, global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single cycle and print the report as JSON.
    RunOnce {
        /// Evaluate expiry at this instant (RFC 3339) instead of the wall clock.
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Write the store state after the cycle to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Keep running cycles until Ctrl-C.
    Watch,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Serialize)]
struct RunOnceOutput<'a> {
    counts: CycleCounts,
    report: &'a CycleReport,
}

impl Cli {
    fn reaper_settings(&self) -> Result<ReaperSettings> {
        let mut settings = match (&self.settings, &self.namespace) {
            (Some(path), _) => ReaperSettings::from_path(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            (None, Some(namespace)) => ReaperSettings::new(namespace.clone()),
            (None, None) => bail!("either --namespace (OPERATOR_NAMESPACE) or --settings is required"),
        };

        if let Some(namespace) = &self.namespace {
            settings.namespace = namespace.clone();
        }
        if let Some(name) = &self.config_name {
            settings.configuration_name = name.clone();
        }
        if let Some(label) = &self.ttl_label {
            settings.ttl_label = label.clone();
        }
        if self.dry_run {
            settings.dry_run = true;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    let settings = cli.reaper_settings()?;
    let snapshot_path = cli
        .snapshot
        .as_ref()
        .context("--snapshot is required")?;
    let snapshot = StoreSnapshot::from_path(snapshot_path)?;
    let (configs, objects) = snapshot.into_stores();

    tracing::info!(
        namespace = %settings.namespace,
        config = %settings.configuration_name,
        ttl_label = %settings.ttl_label,
        dry_run = settings.dry_run,
        "starting ttlreaper"
    );

    let reaper = Reaper::new(
        settings,
        Arc::new(configs.clone()),
        Arc::new(objects.clone()),
    );

    match cli.command {
        Command::RunOnce { now, output } => {
            let reaper = match now {
                Some(at) => reaper.with_clock(Arc::new(FixedClock::new(at))),
                None => reaper,
            };

            let report = reaper
                .run_cycle(&CancellationToken::new())
                .await
                .context("cycle aborted")?;

            let out = RunOnceOutput {
                counts: report.counts(),
                report: &report,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);

            if let Some(path) = output {
                let yaml = StoreSnapshot::capture(&configs, &objects).await.to_yaml()?;
                std::fs::write(&path, yaml)
                    .with_context(|| format!("writing snapshot to {}", path.display()))?;
            }
        }
        Command::Watch => {
            let driver = ReaperDriver::spawn(Arc::new(reaper), configs.subscribe());
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            tracing::info!("shutdown requested");
            driver.shutdown_and_join().await;
        }
    }

    Ok(())
}
