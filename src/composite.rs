// Straight-alpha source-over blending and flattening, shared by the overlay
// and diploma stages. Integer math keeps fully transparent and fully opaque
// source pixels exact.

use image::{RgbImage, RgbaImage};

pub type Rgba8 = [u8; 4];

/// `src` over `dst`, both non-premultiplied.
pub fn over(dst: Rgba8, src: Rgba8) -> Rgba8 {
    let sa = u32::from(src[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }
    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    // alpha scaled by 255 to keep precision through the divide
    let da_inv = da * inv;
    let out_a255 = sa * 255 + da_inv;
    if out_a255 == 0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = u32::from(src[i]) * sa * 255 + u32::from(dst[i]) * da_inv;
        out[i] = ((c + out_a255 / 2) / out_a255).min(255) as u8;
    }
    out[3] = ((out_a255 + 127) / 255).min(255) as u8;
    out
}

/// Blend `top` onto `base` with its top-left corner at (`x`, `y`).
/// Parts of `top` outside `base` are clipped.
pub fn paste_over(base: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    let (bw, bh) = (base.width() as i64, base.height() as i64);
    for (tx, ty, px) in top.enumerate_pixels() {
        let dx = x + tx as i64;
        let dy = y + ty as i64;
        if dx < 0 || dy < 0 || dx >= bw || dy >= bh {
            continue;
        }
        let dst = base.get_pixel_mut(dx as u32, dy as u32);
        dst.0 = over(dst.0, px.0);
    }
}

/// Drop the alpha channel by compositing onto an opaque background.
pub fn flatten(img: &RgbaImage, background: [u8; 3]) -> RgbImage {
    let bg = [background[0], background[1], background[2], 255];
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let px = over(bg, img.get_pixel(x, y).0);
        image::Rgb([px[0], px[1], px[2]])
    })
}
