// Branding overlay: loaded once per session, stamped bottom-left on every capture.

use crate::composite::paste_over;
use crate::error::{Error, Result};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::path::Path;
use tracing::{info, warn};

/// Side length the overlay is resized to on load.
pub const OVERLAY_SIZE: u32 = 150;
/// Gap between the overlay and the photo's left and bottom edges.
pub const OVERLAY_MARGIN: i64 = 10;

/// The branding image, fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct Overlay {
    image: RgbaImage,
}

impl Overlay {
    pub fn from_image(image: RgbaImage) -> Self {
        let image = if image.dimensions() == (OVERLAY_SIZE, OVERLAY_SIZE) {
            image
        } else {
            imageops::resize(&image, OVERLAY_SIZE, OVERLAY_SIZE, FilterType::Lanczos3)
        };
        Self { image }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| Error::asset(path, e))?;
        Ok(Self::from_image(img.to_rgba8()))
    }

    /// Session start: a missing or unreadable overlay is logged once and
    /// the session runs without one from then on.
    pub fn load_for_session(path: &Path) -> Option<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "overlay not found, captured photos will not have an overlay");
            return None;
        }
        match Self::load(path) {
            Ok(overlay) => {
                info!(path = %path.display(), "overlay loaded");
                Some(overlay)
            }
            Err(e) => {
                warn!(error = %e, "overlay unreadable, captured photos will not have an overlay");
                None
            }
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Top-left corner of the overlay on a photo of `photo_height` rows.
    pub fn position(&self, photo_height: u32) -> (i64, i64) {
        let y = photo_height as i64 - self.image.height() as i64 - OVERLAY_MARGIN;
        (OVERLAY_MARGIN, y)
    }
}

/// Source-over the overlay onto the photo. Without an overlay the photo is
/// returned as-is.
pub fn apply_overlay(photo: RgbaImage, overlay: Option<&Overlay>) -> RgbaImage {
    let Some(overlay) = overlay else {
        return photo;
    };
    let mut out = photo;
    let (x, y) = overlay.position(out.height());
    paste_over(&mut out, overlay.image(), x, y);
    out
}
