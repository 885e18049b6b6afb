// Diploma template: a certificate background with a photo window given as
// fractional margins, so the window follows the template's resolution.

use crate::composite::{flatten, paste_over};
use crate::error::{Error, Result};
use crate::types::Rect;
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Paper color used when flattening the finished diploma.
pub const PAPER_WHITE: [u8; 3] = [255, 255, 255];

/// Photo window margins as fractions of the template's width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiplomaMargins {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Default for DiplomaMargins {
    fn default() -> Self {
        Self { left: 0.2, top: 0.3, right: 0.2, bottom: 0.2 }
    }
}

impl DiplomaMargins {
    pub fn validate(&self) -> Result<()> {
        let all = [self.left, self.top, self.right, self.bottom];
        if all.iter().any(|m| !m.is_finite() || *m < 0.0 || *m >= 1.0) {
            return Err(Error::InvalidTemplate(format!("margins must lie in [0, 1): {self:?}")));
        }
        if self.left + self.right >= 1.0 || self.top + self.bottom >= 1.0 {
            return Err(Error::InvalidTemplate(format!(
                "opposing margins leave no room for the photo: {self:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DiplomaTemplate {
    image: RgbaImage,
    margins: DiplomaMargins,
}

impl DiplomaTemplate {
    pub fn new(image: RgbaImage, margins: DiplomaMargins) -> Result<Self> {
        margins.validate()?;
        let template = Self { image, margins };
        let rect = template.placement_rect();
        if rect.width == 0 || rect.height == 0 {
            return Err(Error::InvalidTemplate(format!(
                "photo window is empty on a {}x{} template",
                template.image.width(),
                template.image.height()
            )));
        }
        Ok(template)
    }

    /// Load the template asset. A missing file is `TemplateMissing`, which
    /// aborts only the print attempt that needed it.
    pub fn load(path: &Path, margins: DiplomaMargins) -> Result<Self> {
        if !path.exists() {
            return Err(Error::TemplateMissing(path.to_path_buf()));
        }
        let img = image::open(path).map_err(|e| Error::asset(path, e))?;
        Self::new(img.to_rgba8(), margins)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The photo window in template pixels.
    pub fn placement_rect(&self) -> Rect {
        let (tw, th) = (self.image.width() as f64, self.image.height() as f64);
        let left = (tw * self.margins.left).round() as u32;
        let top = (th * self.margins.top).round() as u32;
        let right = (tw - (tw * self.margins.right).round()) as u32;
        let bottom = (th - (th * self.margins.bottom).round()) as u32;
        Rect {
            x: left,
            y: top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        }
    }
}

/// Size of `src` scaled to fit inside `bounds` (the tighter side wins).
pub fn fit_within(src: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (src.0.max(1) as f64, src.1.max(1) as f64);
    let (bw, bh) = bounds;
    let scale = (bw as f64 / sw).min(bh as f64 / sh);
    let w = ((sw * scale + 1e-9).floor() as u32).clamp(1, bw.max(1));
    let h = ((sh * scale + 1e-9).floor() as u32).clamp(1, bh.max(1));
    (w, h)
}

/// Place the sketch, centered, in the template's photo window.
/// The template itself is left untouched; the result is opaque.
pub fn compose_diploma(sketch: &RgbaImage, template: &DiplomaTemplate) -> RgbImage {
    let rect = template.placement_rect();
    let (w, h) = fit_within(sketch.dimensions(), (rect.width, rect.height));
    let resized = imageops::resize(sketch, w, h, FilterType::Lanczos3);

    let x = rect.x + (rect.width - w) / 2;
    let y = rect.y + (rect.height - h) / 2;

    let mut canvas = template.image().clone();
    paste_over(&mut canvas, &resized, x as i64, y as i64);
    flatten(&canvas, PAPER_WHITE)
}
