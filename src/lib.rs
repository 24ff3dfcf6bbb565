pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, Cli};

pub use app::pipelines::{GeocodePipeline, ZipPipeline};
pub use config::toml_config::{Mode, TomlConfig};
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
