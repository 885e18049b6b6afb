// Print page layout: every artifact handed to the printer is exactly the
// declared page size, with the picture letterboxed in the middle.

use crate::composite::flatten;
use crate::diploma::PAPER_WHITE;
use crate::error::{Error, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Tenths of a millimetre per inch.
const DMM_PER_INCH: u64 = 254;

/// Physical page: size in tenths of a millimetre plus print resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub width_dmm: u32,
    pub height_dmm: u32,
    pub dpi: u32,
}

impl PageSpec {
    pub fn new(media: MediaSize, dpi: u32) -> Self {
        let (width_dmm, height_dmm) = media.dimensions_dmm();
        Self { width_dmm, height_dmm, dpi }
    }

    pub fn width_in(&self) -> f64 {
        self.width_dmm as f64 / DMM_PER_INCH as f64
    }

    pub fn height_in(&self) -> f64 {
        self.height_dmm as f64 / DMM_PER_INCH as f64
    }

    /// Canvas size in pixels, `ceil(inches * dpi)` per side.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |dmm: u32| (dmm as u64 * self.dpi as u64).div_ceil(DMM_PER_INCH) as u32;
        (px(self.width_dmm), px(self.height_dmm))
    }

    /// Same page turned sideways.
    pub fn landscape(self) -> Self {
        Self { width_dmm: self.height_dmm, height_dmm: self.width_dmm, dpi: self.dpi }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaSize {
    #[default]
    A4,
    A5,
    Letter,
    /// 4x6 inch photo paper.
    Photo4x6,
}

impl MediaSize {
    fn dimensions_dmm(self) -> (u32, u32) {
        match self {
            MediaSize::A4 => (2100, 2970),
            MediaSize::A5 => (1480, 2100),
            MediaSize::Letter => (2159, 2794),
            MediaSize::Photo4x6 => (1016, 1524),
        }
    }

    /// Name the CUPS `media` option understands.
    pub fn cups_name(self) -> &'static str {
        match self {
            MediaSize::A4 => "A4",
            MediaSize::A5 => "A5",
            MediaSize::Letter => "Letter",
            MediaSize::Photo4x6 => "4x6",
        }
    }
}

/// Scaled picture size: `fill` of the page width, unless that makes it
/// taller than `fill` of the page height, in which case height decides.
pub fn fit_on_page(src: (u32, u32), page: (u32, u32), fill: f64) -> (u32, u32) {
    let (sw, sh) = (src.0.max(1) as f64, src.1.max(1) as f64);
    let max_w = page.0 as f64 * fill;
    let max_h = page.1 as f64 * fill;
    let mut scale = max_w / sw;
    if sh * scale > max_h {
        scale = max_h / sh;
    }
    let w = ((sw * scale + 1e-9).floor() as u32).clamp(1, page.0.max(1));
    let h = ((sh * scale + 1e-9).floor() as u32).clamp(1, page.1.max(1));
    (w, h)
}

/// Render `img` centered on a white page canvas of exactly `page.pixel_size()`.
pub fn layout_page(img: &DynamicImage, page: &PageSpec, fill: f64) -> Result<RgbImage> {
    if page.dpi == 0 {
        return Err(Error::config("print resolution must be at least 1 dpi"));
    }
    if !(fill > 0.0 && fill <= 1.0) {
        return Err(Error::config(format!("page fill fraction {fill} is outside (0, 1]")));
    }
    let (pw, ph) = page.pixel_size();
    let (w, h) = fit_on_page((img.width(), img.height()), (pw, ph), fill);

    let opaque = flatten(&img.to_rgba8(), PAPER_WHITE);
    let scaled = imageops::resize(&opaque, w, h, FilterType::Lanczos3);

    let mut canvas = RgbImage::from_pixel(pw, ph, image::Rgb(PAPER_WHITE));
    imageops::replace(&mut canvas, &scaled, ((pw - w) / 2) as i64, ((ph - h) / 2) as i64);
    Ok(canvas)
}
