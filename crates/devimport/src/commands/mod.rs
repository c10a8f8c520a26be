pub mod check;
pub mod formats;
pub mod import;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use devimport_core::{DeviceIdSource, FallbackConfig, ImportConfig};

/// Options shared by every command that reads a device file.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// File describing the end devices
    pub file: PathBuf,
    /// Input format code (see `devimport formats`)
    #[arg(short, long, default_value = "ttn-json")]
    pub format: String,
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Frequency plan for devices that do not name one
    #[arg(long)]
    pub frequency_plan_id: Option<String>,
    /// LoRaWAN MAC version for devices that do not name one
    #[arg(long)]
    pub lorawan_version: Option<String>,
    /// LoRaWAN PHY version for devices that do not name one
    #[arg(long)]
    pub lorawan_phy_version: Option<String>,
    /// Generate missing device IDs from the DevEUI
    #[arg(long)]
    pub derive_ids: bool,
}

impl SourceArgs {
    /// Config file values with command-line overrides applied.
    pub fn config(&self) -> Result<ImportConfig> {
        let mut config = match &self.config {
            Some(path) => ImportConfig::load(path)?,
            None => ImportConfig::default(),
        };

        let overrides = FallbackConfig {
            frequency_plan_id: self.frequency_plan_id.clone(),
            lorawan_version: self.lorawan_version.clone(),
            lorawan_phy_version: self.lorawan_phy_version.clone(),
        };
        config.fallback = config.fallback.merged_with(&overrides);
        if self.derive_ids {
            config.validation.device_id_source = DeviceIdSource::DeriveFromDevEui;
        }
        Ok(config)
    }

    pub fn read_file(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.file)
            .with_context(|| format!("failed to read device file '{}'", self.file.display()))
    }
}
