#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use toml_config::{Mode, TomlConfig};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "czone-hhi")]
#[command(about = "Commuting-zone market concentration from a D&B establishment extract")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "czone-config.toml")]
    pub config: String,

    /// Override how businesses are placed in counties (geocode or zip)
    #[arg(long)]
    pub mode: Option<Mode>,

    /// Override the number of geocoding workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override the output directory
    #[arg(long)]
    pub output_path: Option<String>,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Show what would be processed without executing
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl Cli {
    /// 應用命令列覆蓋設定
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
            tracing::info!("🔧 Mode overridden to: {:?}", mode);
        }
        if let Some(workers) = self.workers {
            config.geocoder.workers = Some(workers);
            tracing::info!("🔧 Geocoding workers overridden to: {}", workers);
        }
        if let Some(output_path) = &self.output_path {
            config.load.output_path = output_path.clone();
            tracing::info!("🔧 Output path overridden to: {}", output_path);
        }
    }

    pub fn monitor_enabled(&self, config: &TomlConfig) -> bool {
        self.monitor.unwrap_or_else(|| config.monitoring_enabled())
    }
}
