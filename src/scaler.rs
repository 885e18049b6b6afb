// Fits camera frames (and the reviewed photo) into the window viewport.
// The preview is mirrored so the kiosk behaves like a mirror; the saved
// photo is not.

use crate::types::{Frame, FrameBuffer};
use image::RgbImage;
use image::imageops::{self, FilterType};

/// Fraction of the viewport the preview may occupy.
pub const VIEWPORT_FILL: f64 = 0.95;

/// Size of the fitted image for a `src` inside `viewport`.
/// Never returns a zero dimension and never distorts the aspect ratio
/// beyond integer rounding.
pub fn fit_dimensions(src: (u32, u32), viewport: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = src;
    let (vw, vh) = viewport;
    if sw == 0 || sh == 0 {
        return (sw, sh);
    }
    let scale = (vw as f64 / sw as f64).min(vh as f64 / sh as f64) * VIEWPORT_FILL;
    // epsilon keeps exact ratios like 1920 -> 760 from flooring to 759
    let w = ((sw as f64 * scale + 1e-9).floor() as u32).max(1);
    let h = ((sh as f64 * scale + 1e-9).floor() as u32).max(1);
    (w, h)
}

/// Mirror, convert and scale one frame for the preview surface.
/// With no known viewport (window still coming up) the frame is shown unscaled.
pub fn scale_frame(frame: &Frame, viewport: Option<(u32, u32)>) -> FrameBuffer {
    if !frame.is_well_formed() {
        tracing::debug!(width = frame.width, height = frame.height, "dropping malformed frame");
        return FrameBuffer::filled(0, 0, 0);
    }
    let mut rgb = frame.to_rgb();
    imageops::flip_horizontal_in_place(&mut rgb);
    fit_image(&rgb, viewport)
}

/// Scale an already-oriented image into the viewport.
pub fn fit_image(img: &RgbImage, viewport: Option<(u32, u32)>) -> FrameBuffer {
    match viewport {
        Some((vw, vh)) if vw > 0 && vh > 0 => {
            let (w, h) = fit_dimensions(img.dimensions(), (vw, vh));
            let scaled = imageops::resize(img, w, h, FilterType::Triangle);
            FrameBuffer::from_rgb(&scaled)
        }
        _ => FrameBuffer::from_rgb(img),
    }
}
