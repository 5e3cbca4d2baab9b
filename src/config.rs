// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::drivers::{Framing, PipelineConfig};
/// Environment variable pointing at a JSON settings file.
pub const CONFIG_ENV: &str = "ADCSCOPE_CONFIG";
/// Looked up in the working directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "adcscope.json";
/// Runtime settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Serial port preselected in the device picker.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub read_buffer_bytes: usize,
    pub framing: Framing,
    pub stop_timeout_ms: u64,
    pub error_backoff_ms: u64,
    /// Defaults to the user's documents directory.
    pub export_dir: Option<PathBuf>,
    pub export_file_name: String,
    pub snapshot_file_name: String,
    /// Number of points kept in the live plot.
    pub plot_window: usize,
    /// Interval between readings of the built-in simulator.
    pub simulator_period_ms: u64,
}
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: None,
            // HC-05/HC-06 modules ship at 9600 baud
            baud_rate: 9600,
            read_timeout_ms: 100,
            read_buffer_bytes: 1024,
            framing: Framing::Read,
            stop_timeout_ms: 2000,
            error_backoff_ms: 50,
            export_dir: None,
            export_file_name: crate::drivers::export::DEFAULT_FILE_NAME.to_owned(),
            snapshot_file_name: crate::drivers::plot::DEFAULT_FILE_NAME.to_owned(),
            plot_window: 2000,
            simulator_period_ms: 10,
        }
    }
}
impl AppConfig {
    /// Reads `$ADCSCOPE_CONFIG`, else `./adcscope.json` if it exists, else
    /// returns the defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(Path::new(&path)),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_path(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
    pub fn simulator_period(&self) -> Duration {
        Duration::from_millis(self.simulator_period_ms.max(1))
    }
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            read_buffer_bytes: self.read_buffer_bytes.max(1),
            framing: self.framing,
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
        }
    }
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::document_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }
    #[test]
    fn partial_file_overrides_fields() {
        let config = AppConfig::from_json(
            r#"{"port":"/dev/rfcomm0","baud_rate":115200,"framing":"line","export_dir":"/tmp/adc"}"#,
        )
        .unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/rfcomm0"));
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.pipeline().framing, Framing::Line);
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/adc"));
        assert_eq!(config.export_file_name, "data.txt");
    }
    #[test]
    fn rejects_unknown_fields_and_framings() {
        assert!(AppConfig::from_json(r#"{"framing":"packet"}"#).is_err());
        assert!(AppConfig::from_json(r#"{"baud":9600}"#).is_err());
    }
    #[test]
    fn from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_path(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adcscope.json");
        std::fs::write(&path, r#"{"stop_timeout_ms":10}"#).unwrap();
        let config = AppConfig::from_path(&path).unwrap();
        assert_eq!(config.pipeline().stop_timeout, Duration::from_millis(10));
    }
}
