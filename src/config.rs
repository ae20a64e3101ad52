use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::collector::{default_concurrency, CollectorOptions};
use crate::ranking::SortDirection;
use crate::scanner::{build_globset, ScanOptions};
use crate::types::Volume;

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
    pub path: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamsConfig {
    pub percent_threshold: u8,
    pub sort_direction: String,
    pub date_format: String,
    pub time_format: String,
    pub message_over_threshold: String,
    pub message_normal: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    pub follow_symlinks: bool,
    pub breakdown: bool,
    pub excludes: Vec<String>,
    pub concurrency: Option<usize>,
    pub unit_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub output: String,
    pub json_output: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,
    pub params: ParamsConfig,
    pub scanner: ScannerConfig,
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

impl AppConfig {
    pub fn volumes(&self) -> Vec<Volume> {
        self.volumes
            .iter()
            .map(|v| {
                let volume = Volume::new(&v.path, v.folders.clone());
                match &v.label {
                    Some(label) => volume.with_label(label),
                    None => volume,
                }
            })
            .collect()
    }

    pub fn sort_direction(&self) -> SortDirection {
        SortDirection::parse(&self.params.sort_direction)
    }

    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            concurrency: self.scanner.concurrency.unwrap_or_else(default_concurrency),
            unit_timeout: self.scanner.unit_timeout_secs.map(Duration::from_secs),
            percent_threshold: self.params.percent_threshold,
            sort: self.sort_direction(),
            scan: ScanOptions {
                follow_symlinks: self.scanner.follow_symlinks,
                excludes: self.scanner.excludes.clone(),
                breakdown: self.scanner.breakdown,
            },
            message_over_threshold: self.params.message_over_threshold.clone(),
            message_normal: self.params.message_normal.clone(),
        }
    }
}

/// Loads the configuration, layering (lowest precedence first): embedded
/// defaults, `volume-inventory.toml` in the CWD, `INVENTORY_CONFIG`, `path`,
/// then `INVENTORY__*` environment variables.
pub fn load_from(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("volume-inventory").required(false));

    if let Ok(custom_path) = std::env::var("INVENTORY_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    if let Some(p) = path {
        // An explicitly named file must exist.
        builder = builder.add_source(::config::File::from(p).required(true));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("INVENTORY").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn load() -> anyhow::Result<AppConfig> {
    load_from(None)
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Params
    if cfg.params.percent_threshold > 100 {
        return Err(anyhow::anyhow!("params.percent_threshold must be in 0..=100"));
    }
    if cfg.sort_direction() == SortDirection::Unordered {
        tracing::warn!(
            "params.sort_direction {:?} is neither ASC nor DESC - folders stay in discovery order",
            cfg.params.sort_direction
        );
    }

    check_strftime("params.date_format", &cfg.params.date_format)?;
    check_strftime("params.time_format", &cfg.params.time_format)?;

    // Scanner
    if let Some(c) = cfg.scanner.concurrency {
        if c == 0 || c > 256 {
            return Err(anyhow::anyhow!("scanner.concurrency must be in 1..=256"));
        }
    }
    if cfg.scanner.unit_timeout_secs == Some(0) {
        return Err(anyhow::anyhow!("scanner.unit_timeout_secs must be > 0 when set"));
    }
    build_globset(&cfg.scanner.excludes).map_err(|e| anyhow::anyhow!("scanner.excludes: {}", e))?;

    // Volumes
    for (i, v) in cfg.volumes.iter().enumerate() {
        if v.path.trim().is_empty() {
            return Err(anyhow::anyhow!("volumes[{}].path must not be empty", i));
        }
        for f in &v.folders {
            if f.trim().is_empty() {
                return Err(anyhow::anyhow!("volumes[{}].folders contains an empty name", i));
            }
            if Path::new(f).is_absolute() {
                return Err(anyhow::anyhow!("volumes[{}].folders entry {:?} must be relative", i, f));
            }
        }
    }

    // Report
    if cfg.report.output.trim().is_empty() {
        return Err(anyhow::anyhow!("report.output must not be empty"));
    }

    Ok(())
}

/// Rejects patterns chrono cannot format, which would otherwise panic at render time.
fn check_strftime(key: &str, pattern: &str) -> anyhow::Result<()> {
    use chrono::format::{Item, StrftimeItems};

    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(anyhow::anyhow!("{} {:?} is not a valid strftime pattern", key, pattern));
    }
    Ok(())
}
