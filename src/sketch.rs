// Pencil-sketch filter ("colour dodge" of the grayscale over its blurred negative).
// Pure integer pipeline: the same input bytes always give the same output bytes.

use image::{GrayImage, Luma, RgbaImage};

/// Blur radius; 2 * 10 + 1 = 21 taps per axis.
pub const SKETCH_BLUR_RADIUS: u32 = 10;
/// Sigma a 21-tap Gaussian gets when derived from its kernel size.
pub const SKETCH_BLUR_SIGMA: f64 = 3.5;

/// Photo in, normalized pencil sketch out (same dimensions).
pub fn pencil_sketch(photo: &RgbaImage) -> GrayImage {
    let gray = image::imageops::grayscale(photo);
    let inverted = invert(&gray);
    let blurred = gaussian_blur(&inverted, SKETCH_BLUR_RADIUS, SKETCH_BLUR_SIGMA);
    let dodge_base = invert(&blurred);
    let dodged = divide_scaled(&gray, &dodge_base, 256);
    normalize_min_max(dodged)
}

/// Same sketch as RGBA with full opacity, ready for compositing.
pub fn pencil_sketch_rgba(photo: &RgbaImage) -> RgbaImage {
    image::DynamicImage::ImageLuma8(pencil_sketch(photo)).to_rgba8()
}

fn invert(img: &GrayImage) -> GrayImage {
    let mut out = img.clone();
    image::imageops::invert(&mut out);
    out
}

/// `num * scale / den` per pixel, rounded and clamped to 0..=255.
fn divide_scaled(num: &GrayImage, den: &GrayImage, scale: u32) -> GrayImage {
    GrayImage::from_fn(num.width(), num.height(), |x, y| {
        let n = u32::from(num.get_pixel(x, y).0[0]);
        let d = u32::from(den.get_pixel(x, y).0[0]);
        let v = if d == 0 {
            if n == 0 { 0 } else { 255 }
        } else {
            ((n * scale + d / 2) / d).min(255)
        };
        Luma([v as u8])
    })
}

/// Stretch values to span 0..=255. A flat image is returned unchanged.
fn normalize_min_max(mut img: GrayImage) -> GrayImage {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if min >= max {
        return img;
    }
    let range = u32::from(max - min);
    for p in img.pixels_mut() {
        let v = u32::from(p.0[0] - min);
        p.0[0] = ((v * 255 + range / 2) / range) as u8;
    }
    img
}

/// Separable Gaussian blur in Q16 fixed point with clamped edges.
fn gaussian_blur(src: &GrayImage, radius: u32, sigma: f64) -> GrayImage {
    if radius == 0 {
        return src.clone();
    }
    let kernel = gaussian_kernel_q16(radius, sigma);
    let (w, h) = src.dimensions();
    let r = radius as i64;

    let mut tmp = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in kernel.iter().enumerate() {
                let sx = (x as i64 + ki as i64 - r).clamp(0, w as i64 - 1) as u32;
                acc += u64::from(kw) * u64::from(src.get_pixel(sx, y).0[0]);
            }
            tmp.put_pixel(x, y, Luma([q16_to_u8(acc)]));
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u64;
            for (ki, &kw) in kernel.iter().enumerate() {
                let sy = (y as i64 + ki as i64 - r).clamp(0, h as i64 - 1) as u32;
                acc += u64::from(kw) * u64::from(tmp.get_pixel(x, sy).0[0]);
            }
            out.put_pixel(x, y, Luma([q16_to_u8(acc)]));
        }
    }
    out
}

/// Normalized weights summing to exactly 1.0 in Q16.
fn gaussian_kernel_q16(radius: u32, sigma: f64) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // push the rounding error into the center tap
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + 65536 - acc).clamp(0, 65536) as u32;
    weights
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn test_photo() -> RgbaImage {
        RgbaImage::from_fn(64, 48, |x, y| {
            let v = if (x / 8 + y / 8) % 2 == 0 { 200 } else { 40 };
            Rgba([v, (x * 3) as u8, (y * 5) as u8, 255])
        })
    }

    #[test]
    fn sketch_is_deterministic() {
        let photo = test_photo();
        let a = pencil_sketch(&photo);
        let b = pencil_sketch(&photo);
        let c = pencil_sketch(&photo.clone());
        assert_eq!(a.as_raw(), b.as_raw());
        assert_eq!(a.as_raw(), c.as_raw());
    }

    #[test]
    fn sketch_keeps_dimensions_and_spans_full_range() {
        let photo = test_photo();
        let out = pencil_sketch(&photo);
        assert_eq!(out.dimensions(), photo.dimensions());
        let min = out.pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert_eq!((min, max), (0, 255));
    }

    #[test]
    fn flat_image_stays_flat() {
        let photo = RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 255]));
        let out = pencil_sketch(&photo);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn darker_side_of_an_edge_gets_the_line() {
        let photo = RgbaImage::from_fn(60, 20, |x, _| {
            if x < 30 { Rgba([200, 200, 200, 255]) } else { Rgba([100, 100, 100, 255]) }
        });
        let out = pencil_sketch(&photo);
        let flat_dark = out.get_pixel(57, 10).0[0];
        let near_edge = out.get_pixel(30, 10).0[0];
        assert_eq!(flat_dark, 255);
        assert!(near_edge < flat_dark, "edge {near_edge} vs flat {flat_dark}");
    }

    #[test]
    fn kernel_sums_to_one() {
        let k = gaussian_kernel_q16(SKETCH_BLUR_RADIUS, SKETCH_BLUR_SIGMA);
        assert_eq!(k.len(), 21);
        assert_eq!(k.iter().sum::<u32>(), 65536);
        assert!(k[10] > k[0]);
    }

    #[test]
    fn blur_of_constant_is_identity() {
        let img = GrayImage::from_pixel(9, 7, Luma([77]));
        assert_eq!(gaussian_blur(&img, 10, 3.5).as_raw(), img.as_raw());
    }

    #[test]
    fn invert_leaves_the_source_alone() {
        let img = GrayImage::from_raw(3, 1, vec![0, 100, 255]).unwrap();
        assert_eq!(invert(&img).as_raw(), &vec![255, 155, 0]);
        assert_eq!(img.as_raw(), &vec![0, 100, 255]);
    }

    #[test]
    fn divide_handles_zero_denominator() {
        let num = GrayImage::from_raw(3, 1, vec![0, 10, 100]).unwrap();
        let den = GrayImage::from_raw(3, 1, vec![0, 0, 200]).unwrap();
        let out = divide_scaled(&num, &den, 256);
        assert_eq!(out.as_raw(), &vec![0, 255, 128]);
    }
}
