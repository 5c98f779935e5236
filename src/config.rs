//! Printer configuration.
//!
//! Handles loading, validating, and merging `imageprinter.toml`. Stock
//! defaults are serialized to a TOML table, the user file is merged on top,
//! and the result is deserialized with unknown keys rejected.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! destination = "/tmp/imageprinter"   # Cache root
//! # source = "public/images"          # Source root (required for fetch/warm)
//! prefix = "/ip"                      # URI prefix for links and requests
//! max_age = 0                         # Cache-Control max-age, seconds
//! use_alternate_processor = false     # Faster, softer resampling filter
//! single_flight = false               # Serialize renders of the same variant
//!
//! [separators]
//! opts = "__"                         # Between base name and options
//! value = "-"                         # Between option name and value
//! param = ","                         # Between options
//!
//! [image]                             # Defaults for generated links
//! width = 300
//! height = 200
//! crop = true
//! quality = 80
//!
//! [processing]
//! max_processes = 4                   # Max parallel warm-up workers (omit for auto = CPU cores)
//! max_dimension = 8192                # Largest width or height a variant may have
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse, override just the values you want:
//!
//! ```toml
//! source = "public/images"
//!
//! [image]
//! quality = 90
//! ```
//!
//! The resolver form of a source and custom source validators are code-level
//! hooks on [`ImagePrinterBuilder`](crate::handler::ImagePrinterBuilder) and
//! have no TOML form.

use crate::handler::ImagePrinter;
use crate::imaging::{MAX_DIMENSION, OperationRegistry, RustBackend};
use crate::link::LinkGenerator;
use crate::options::{OptionSet, Separators};
use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE: &str = "imageprinter.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Printer configuration loaded from `imageprinter.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrinterConfig {
    /// Directory the cache tree lives in.
    pub destination: String,
    /// Directory source images are read from.
    pub source: Option<String>,
    /// URI prefix the handler is mounted under.
    pub prefix: String,
    /// `Cache-Control` max-age for served variants, in seconds.
    pub max_age: u64,
    pub use_alternate_processor: bool,
    pub single_flight: bool,
    pub separators: Separators,
    /// Default options for generated links.
    pub image: ImageConfig,
    pub processing: ProcessingConfig,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            destination: "/tmp/imageprinter".to_string(),
            source: None,
            prefix: "/ip".to_string(),
            max_age: 0,
            use_alternate_processor: false,
            single_flight: false,
            separators: Separators::default(),
            image: ImageConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PrinterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.trim().is_empty() {
            return Err(ConfigError::Validation(
                "destination must not be empty".into(),
            ));
        }
        self.separators.validate().map_err(ConfigError::Validation)?;
        if !(1..=100).contains(&self.image.quality) {
            return Err(ConfigError::Validation(
                "image.quality must be 1-100".into(),
            ));
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(ConfigError::Validation(
                "image.width and image.height must be non-zero".into(),
            ));
        }
        let max = self.processing.max_dimension;
        if max == 0 {
            return Err(ConfigError::Validation(
                "processing.max_dimension must be non-zero".into(),
            ));
        }
        if self.image.width > max || self.image.height > max {
            return Err(ConfigError::Validation(format!(
                "image.width and image.height must not exceed processing.max_dimension ({max})"
            )));
        }
        Ok(())
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    /// A request handler serving from the configured source directory.
    pub fn printer(&self) -> Result<ImagePrinter, ConfigError> {
        let Some(source) = &self.source else {
            return Err(ConfigError::Validation(
                "source must be set to serve images".into(),
            ));
        };
        let max_dimension = self.processing.max_dimension;
        Ok(
            ImagePrinter::builder(&self.destination, Source::PathRoot(source.into()))
                .prefix(&self.prefix)
                .separators(self.separators.clone())
                .backend(
                    RustBackend::select(self.use_alternate_processor)
                        .with_max_dimension(max_dimension),
                )
                .registry(Arc::new(OperationRegistry::with_max_dimension(max_dimension)))
                .max_age(self.max_age())
                .single_flight(self.single_flight)
                .build(),
        )
    }

    /// A link generator agreeing with this config's prefix and separators.
    pub fn link_generator(&self) -> LinkGenerator {
        LinkGenerator::new(&self.prefix, self.image.to_options())
            .with_separators(self.separators.clone())
    }
}

/// Default image options for link generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    pub crop: bool,
    /// JPEG quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 200,
            crop: true,
            quality: 80,
        }
    }
}

impl ImageConfig {
    pub fn to_options(&self) -> OptionSet {
        OptionSet::new()
            .with("width", self.width)
            .with("height", self.height)
            .with("crop", self.crop)
            .with("quality", self.quality)
    }
}

/// Processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel warm-up workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Largest width or height, in pixels, a variant may be rendered at.
    /// Requests asking for more are answered 404.
    pub max_dimension: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            max_dimension: MAX_DIMENSION,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PrinterConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PrinterConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PrinterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<PrinterConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(path)?)
}

/// Returns a fully-commented stock `imageprinter.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Printer Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Directory the resized variants are cached in.
destination = "/tmp/imageprinter"

# Directory source images are read from. Required by `fetch` and `warm`.
# source = "public/images"

# URI prefix the printer is mounted under. Generated links start with it
# and request paths must start with it.
prefix = "/ip"

# Cache-Control max-age sent with served variants, in seconds.
max_age = 0

# Use the alternate (faster, softer) resampling filter.
use_alternate_processor = false

# Let only one request render a given variant at a time; others wait for
# it and serve the result.
single_flight = false

# ---------------------------------------------------------------------------
# Path encoding
# ---------------------------------------------------------------------------
# Variant paths look like `large/image__width-200,height-100.jpg`.
# Changing these invalidates every cached variant and every generated link.
[separators]
# Between the source base name and the encoded options.
opts = "__"
# Between an option name and its value.
value = "-"
# Between options.
param = ","

# ---------------------------------------------------------------------------
# Link defaults
# ---------------------------------------------------------------------------
# Options generated links get when the caller leaves them out.
[image]
width = 300
height = 200
crop = true
# JPEG quality (1 = worst, 100 = best).
quality = 80

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `warm`. Omit for auto (= number of CPU cores).
# Values larger than the core count are clamped down.
# max_processes = 4

# Largest width or height, in pixels, a variant may be rendered at.
# Requests asking for more are answered 404.
max_dimension = 8192
"##
}
