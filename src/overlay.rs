use crate::{analysis::format_confidence, detection::Detection};
use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::debug;

const FONT: &[u8] = include_bytes!("../assets/font.ttf");
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draws detection boxes and `label NN.N%` captions onto an image. Used when
/// the service did not send a pre-rendered overlay.
pub struct Overlay<'a> {
    font: FontRef<'a>,
    color: Rgb<u8>,
}

impl Overlay<'static> {
    pub fn new() -> Result<Self> {
        let font = FontRef::try_from_slice(FONT).with_context(|| "loading embedded font")?;
        Ok(Self {
            font,
            color: BOX_COLOR,
        })
    }
}

impl Overlay<'_> {
    /// Decodes `image_bytes` and draws every detection that has a box.
    pub fn render(&self, image_bytes: &[u8], detections: &[Detection]) -> Result<RgbImage> {
        let mut image = image::load_from_memory(image_bytes)
            .with_context(|| "decoding input image")?
            .to_rgb8();

        // Stroke is width/300 (min 2px), text width/40 (min 12px).
        let line_width = (image.width() / 300).max(2);
        let scale = PxScale::from(((image.width() / 40).max(12)) as f32);

        for d in detections {
            let Some(b) = d.bbox else { continue };
            let x = b.min_x.round() as i32;
            let y = b.min_y.round() as i32;
            let w = b.width().round().max(1.0) as u32;
            let h = b.height().round().max(1.0) as u32;

            for t in 0..line_width {
                let (Some(wt), Some(ht)) = (w.checked_sub(2 * t), h.checked_sub(2 * t)) else {
                    break;
                };
                if wt == 0 || ht == 0 {
                    break;
                }
                let rect = Rect::at(x + t as i32, y + t as i32).of_size(wt, ht);
                draw_hollow_rect_mut(&mut image, rect, self.color);
            }

            let caption = format!("{} {}%", d.class_name, format_confidence(d.confidence));
            draw_text_mut(
                &mut image,
                self.color,
                x + 4,
                y + line_width as i32 + 2,
                scale,
                &self.font,
                &caption,
            );
            debug!("drew {} at [{}, {}, {}, {}]", caption, x, y, w, h);
        }

        Ok(image)
    }
}

pub fn has_boxes(detections: &[Detection]) -> bool {
    detections.iter().any(|d| d.bbox.is_some())
}

/// Renders the overlay as `<basename>.png` in `dir`. Returns `Ok(None)` when
/// no detection carries a box.
pub fn save_overlay(
    image_bytes: &[u8],
    detections: &[Detection],
    dir: &Path,
    basename: &str,
) -> Result<Option<PathBuf>> {
    if !has_boxes(detections) {
        return Ok(None);
    }
    let image = Overlay::new()?.render(image_bytes, detections)?;
    let path = dir.join(format!("{basename}.png"));
    image
        .save_with_format(&path, ImageFormat::Png)
        .with_context(|| format!("writing overlay: {}", path.display()))?;
    Ok(Some(path))
}
