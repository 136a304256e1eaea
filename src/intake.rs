use crate::util::sha256_hex;
use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The file currently held for submission.
///
/// No type or size validation happens here: whatever the user picks is held
/// and submitted as-is. Non-image content simply yields a preview that no
/// viewer can render.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub sha256: String,
}

/// Serializable view of a [`SelectedImage`] without its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub path: String,
    pub file_name: String,
    pub mime: String,
    pub size_bytes: u64,
    pub sha256: String,
}

impl SelectedImage {
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            path: PathBuf::from(file_name),
            file_name: file_name.to_string(),
            mime: guess_mime(file_name).to_string(),
            sha256: sha256_hex(&bytes),
            bytes,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading image: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mut img = Self::from_bytes(&file_name, bytes);
        img.path = path.to_path_buf();
        Ok(img)
    }

    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            path: self.path.display().to_string(),
            file_name: self.file_name.clone(),
            mime: self.mime.clone(),
            size_bytes: self.bytes.len() as u64,
            sha256: self.sha256.clone(),
        }
    }
}

/// Takes exactly the first file of a selection (picker or drop). The rest
/// are ignored.
pub fn select_first<P: AsRef<Path>>(paths: &[P]) -> Result<Option<SelectedImage>> {
    let Some((first, rest)) = paths.split_first() else {
        return Ok(None);
    };
    if !rest.is_empty() {
        warn!(
            "{} extra file(s) offered; only {} is used",
            rest.len(),
            first.as_ref().display()
        );
    }
    let img = SelectedImage::read(first.as_ref())?;
    debug!(
        "selected {} ({} bytes, {})",
        img.file_name,
        img.bytes.len(),
        img.mime
    );
    Ok(Some(img))
}

pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
