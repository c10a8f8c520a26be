use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use devimport_core::{ImportConfig, ImportEvent, ImportRun, RunState};
use devimport_registry::{
    DeviceRegistry, HttpDeviceRegistry, HttpRegistryConfig, InMemoryDeviceRegistry,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::SourceArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Registry base URL, e.g. https://eu1.cloud.thethings.network
    #[arg(long)]
    pub base_url: Option<String>,
    /// Application the devices are created in
    #[arg(long)]
    pub application_id: Option<String>,
    /// Registrations in flight at once (1-16)
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Seconds to wait for each registration
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Register against an in-memory registry instead of the real one
    #[arg(long)]
    pub dry_run: bool,
    /// Print the receipt as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

impl ImportArgs {
    fn config(&self) -> Result<ImportConfig> {
        let mut config = self.source.config()?;
        if let Some(base_url) = &self.base_url {
            config.registry.base_url = base_url.clone();
        }
        if let Some(application_id) = &self.application_id {
            config.registry.application_id = Some(application_id.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.submission.concurrency = concurrency;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.registry.timeout_secs = timeout_secs;
        }
        config.validate(!self.dry_run)?;
        Ok(config)
    }
}

fn build_registry(config: &ImportConfig, dry_run: bool) -> Result<Arc<dyn DeviceRegistry>> {
    if dry_run {
        info!("dry run: registering against an in-memory registry");
        return Ok(Arc::new(InMemoryDeviceRegistry::new()));
    }

    let api_key = config.api_key();
    if api_key.is_none() {
        warn!(
            env = %config.registry.api_key_env,
            "no API key found; requests will be unauthenticated"
        );
    }

    let registry = HttpDeviceRegistry::new(HttpRegistryConfig {
        base_url: config.registry.base_url.clone(),
        application_id: config.registry.application_id.clone().unwrap_or_default(),
        api_key,
        request_timeout: Duration::from_secs(config.registry.timeout_secs),
    })
    .context("failed to set up registry client")?;
    info!(url = registry.devices_url(), "registering against remote registry");
    Ok(Arc::new(registry))
}

pub async fn handle_import(args: ImportArgs) -> Result<ExitCode> {
    let config = args.config()?;
    let contents = args.source.read_file()?;
    let registry = build_registry(&config, args.dry_run)?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut run = ImportRun::new(registry, config.run_settings()).with_events(events_tx);

    let progress = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ImportEvent::Started { total, .. } => eprintln!("Importing {total} end devices"),
                ImportEvent::Progress(snapshot) => eprintln!("{snapshot}"),
                ImportEvent::Completed(_) => {}
            }
        }
    });

    let cancel = run.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight registrations");
            cancel.cancel();
        }
    });

    let result = run
        .run(&contents, &args.source.format, &config.fallback)
        .await;
    interrupt.abort();
    drop(run);
    let _ = progress.await;

    let receipt = result.with_context(|| {
        format!(
            "failed to import '{}' as {}",
            args.source.file.display(),
            args.source.format
        )
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        output::print_receipt(&receipt);
    }

    if receipt.state == RunState::Aborted || !receipt.summary.failures.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
