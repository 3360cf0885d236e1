use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::ProcessingMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Where the pending queue is persisted; `None` means the platform data directory.
    #[serde(default)]
    pub queue_store_path: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            intake: IntakeConfig::default(),
            scheduler: SchedulerConfig::default(),
            analysis: AnalysisConfig::default(),
            queue_store_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Queue file location, falling back to `<data dir>/scanfolio/queue.json`.
    pub fn resolved_queue_store_path(&self) -> PathBuf {
        self.queue_store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("scanfolio")
                .join("queue.json")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Longest side of a canonical page image, in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_pdf_dpi")]
    pub pdf_dpi: u32,
}

fn default_max_dimension() -> u32 {
    2048
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_pdf_dpi() -> u32 {
    150
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            pdf_dpi: default_pdf_dpi(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent analyses per file in `parallel` mode.
    #[serde(default = "default_fan_out_limit")]
    pub fan_out_limit: usize,
    #[serde(default)]
    pub default_mode: ProcessingMode,
    #[serde(default)]
    pub extract_images: bool,
}

fn default_fan_out_limit() -> usize {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fan_out_limit: default_fan_out_limit(),
            default_mode: ProcessingMode::default(),
            extract_images: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Skip the remote service and classify pages locally.
    #[serde(default)]
    pub offline: bool,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_key_file: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
