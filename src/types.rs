// Core types shared by the preview loop, the session and the print pipeline.

use chrono::{DateTime, Local};
use image::{RgbImage, RgbaImage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is on screen (pixels)
    pub height: usize,     // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    /// A solid-color buffer (used as the blank screen behind the preview).
    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Self { width, height, pixels: vec![color; width * height] }
    }

    /// Pack an RGB image into 0x00RRGGBB pixels.
    pub fn from_rgb(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect();
        Self { width: w as usize, height: h as usize, pixels }
    }

    /// Copy `src` into the middle of this buffer, clipping whatever does not fit.
    pub fn blit_centered(&mut self, src: &FrameBuffer) {
        let ox = (self.width as i64 - src.width as i64) / 2;
        let oy = (self.height as i64 - src.height as i64) / 2;
        for sy in 0..src.height {
            let dy = oy + sy as i64;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width {
                let dx = ox + sx as i64;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                self.pixels[dy as usize * self.width + dx as usize] = src.pixels[sy * src.width + sx];
            }
        }
    }
}

/// Byte order of a raw camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    // nokhwa always hands out RGB; other layouts only come from test sources
    #[cfg(test)]
    Bgr8,
    #[cfg(test)]
    Rgba8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            #[cfg(test)]
            PixelLayout::Bgr8 => 3,
            #[cfg(test)]
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// One raw frame straight from the camera. Replaced every tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    /// Normalize any supported layout into an RGB image.
    pub fn to_rgb(&self) -> RgbImage {
        let bpp = self.layout.bytes_per_pixel();
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * self.width as usize + x as usize) * bpp;
            let px = &self.data[i..i + bpp];
            match self.layout {
                PixelLayout::Rgb8 => image::Rgb([px[0], px[1], px[2]]),
                #[cfg(test)]
                PixelLayout::Rgba8 => image::Rgb([px[0], px[1], px[2]]),
                #[cfg(test)]
                PixelLayout::Bgr8 => image::Rgb([px[2], px[1], px[0]]),
            }
        })
    }

    /// RGBA copy of the frame with full opacity, the starting point of a capture.
    pub fn to_rgba(&self) -> RgbaImage {
        image::DynamicImage::ImageRgb8(self.to_rgb()).to_rgba8()
    }

    /// True when the buffer length matches the declared geometry.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }
}

/// The one photo produced by a capture event.
/// A retake produces a new value; this one is never edited.
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub image: Arc<RgbaImage>,
    pub created_at: DateTime<Local>,
    pub path: Option<PathBuf>,
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[cfg(test)]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_frames_are_swizzled_to_rgb() {
        let frame = Frame {
            width: 1,
            height: 1,
            layout: PixelLayout::Bgr8,
            data: vec![1, 2, 3],
            captured_at: Instant::now(),
        };
        assert_eq!(frame.to_rgb().get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(frame.to_rgba().get_pixel(0, 0).0, [3, 2, 1, 255]);
    }

    #[test]
    fn rgba_frames_drop_alpha_and_short_buffers_are_flagged() {
        let mut frame = Frame {
            width: 2,
            height: 1,
            layout: PixelLayout::Rgba8,
            data: vec![9, 8, 7, 0, 1, 2, 3, 128],
            captured_at: Instant::now(),
        };
        assert!(frame.is_well_formed());
        assert_eq!(frame.to_rgb().as_raw(), &vec![9, 8, 7, 1, 2, 3]);
        frame.data.pop();
        assert!(!frame.is_well_formed());
    }

    #[test]
    fn blit_centered_clips_oversized_sources() {
        let mut screen = FrameBuffer::filled(4, 4, 0);
        let src = FrameBuffer::filled(6, 2, 0x00FF_FFFF);
        screen.blit_centered(&src);
        // rows 1 and 2 are fully covered, rows 0 and 3 untouched
        assert!(screen.pixels[4..12].iter().all(|&p| p == 0x00FF_FFFF));
        assert!(screen.pixels[..4].iter().all(|&p| p == 0));
        assert!(screen.pixels[12..].iter().all(|&p| p == 0));
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect { x: 2, y: 3, width: 4, height: 5 };
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 7));
        assert!(!r.contains(6, 7));
        assert!(!r.contains(5, 8));
    }
}
