use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub base_url: String,
    pub predict_path: String,
    pub health_path: String,
    /// Multipart field the service reads the upload from.
    pub field_name: String,
    /// 0 keeps the transport default.
    pub timeout_seconds: u64,
}
impl Default for Service {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            predict_path: "/predict".into(),
            health_path: "/health".into(),
            field_name: "image".into(),
            timeout_seconds: 0,
        }
    }
}

impl Service {
    pub fn predict_url(&self) -> String {
        join_url(&self.base_url, &self.predict_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
    pub save_annotated_image: bool,
    /// Extension is appended from the image's mime type.
    pub annotated_basename: String,
    /// Draw the detections onto the input locally when the service sends
    /// no annotated image.
    pub render_overlay: bool,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "report.json".into(),
            save_annotated_image: true,
            annotated_basename: "annotated".into(),
            render_overlay: true,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
