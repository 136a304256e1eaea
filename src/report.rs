use crate::{analysis::AnalysisResult, intake::ImageSummary};
use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub image: ImageSummary,
    pub service_url: String,
    pub started: String,
    pub finished: String,
    pub result: AnalysisResult,
    /// Where the annotated image ended up, if it was written locally.
    #[serde(default)]
    pub annotated_image_file: Option<String>,
}

/// Payload of a `data:` URL.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

fn data_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^data:([^;,]*)((?:;[^;,]*)*?)(;base64)?,(.*)$")
            .expect("valid data URL regex")
    })
}

pub fn is_data_url(s: &str) -> bool {
    s.trim_start().starts_with("data:")
}

pub fn decode_data_url(s: &str) -> Result<DataUrl> {
    let caps = data_url_re()
        .captures(s.trim())
        .ok_or_else(|| anyhow!("not a data URL"))?;
    let mime = match caps.get(1).map(|m| m.as_str()) {
        Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
        _ => "text/plain".to_string(),
    };
    let payload = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
    if caps.get(3).is_none() {
        return Err(anyhow!("only base64 data URLs are supported"));
    }
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .with_context(|| "decoding base64 payload")?;
    Ok(DataUrl { mime, bytes })
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

/// Decodes an inline annotated image into `dir`. Remote URLs are left for
/// the viewer and return `Ok(None)`.
pub fn save_annotated_image(
    annotated: &str,
    dir: &Path,
    basename: &str,
) -> Result<Option<PathBuf>> {
    if !is_data_url(annotated) {
        return Ok(None);
    }
    let data = decode_data_url(annotated)?;
    let path = dir.join(format!("{}.{}", basename, extension_for_mime(&data.mime)));
    std::fs::write(&path, &data.bytes)
        .with_context(|| format!("writing annotated image: {}", path.display()))?;
    Ok(Some(path))
}

pub fn write_report(report: &AnalysisReport, path: &Path) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("writing report: {}", path.display()))
}

/// Plain-text rendering of a result for the terminal.
pub fn render_summary(image: &ImageSummary, result: &AnalysisResult) -> String {
    let health = match result.is_healthy() {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };
    let mut out = String::new();
    out.push_str(&format!("Image:       {} ({})\n", image.file_name, image.mime));
    out.push_str(&format!("Result:      {}\n", result.disease));
    out.push_str(&format!("Confidence:  {}%\n", result.confidence));
    out.push_str(&format!("Severity:    {}\n", result.severity));
    out.push_str(&format!("Healthy:     {}\n", health));
    out.push_str(&format!("Treatment:   {}\n", result.treatment));
    out.push_str(&format!("Description: {}\n", result.description));
    if !result.detections.is_empty() {
        out.push_str("Detections:\n");
        for d in &result.detections {
            let pct = crate::analysis::format_confidence(d.confidence);
            match &d.bbox {
                Some(b) => out.push_str(&format!(
                    "  - {} {}% [{:.0}, {:.0}, {:.0}, {:.0}]\n",
                    d.class_name, pct, b.min_x, b.min_y, b.max_x, b.max_y
                )),
                None => out.push_str(&format!("  - {} {}%\n", d.class_name, pct)),
            }
        }
    }
    out
}
