use image::{RgbImage, Rgba};

/// Paste `color` over every pixel whose mask entry is set, weighted by the color's alpha.
///
/// `mask` is row-major with one entry per pixel of `base`.
pub fn blend_mask(base: &RgbImage, mask: &[bool], color: Rgba<u8>) -> RgbImage {
    let (w, h) = base.dimensions();
    debug_assert_eq!(mask.len(), (w * h) as usize);
    let alpha = color[3] as u32;
    let mut out = base.clone();
    for (idx, pixel) in out.pixels_mut().enumerate() {
        if !mask.get(idx).copied().unwrap_or(false) {
            continue;
        }
        for c in 0..3 {
            let mixed = (pixel[c] as u32 * (255 - alpha) + color[c] as u32 * alpha + 127) / 255;
            pixel[c] = mixed as u8;
        }
    }
    out
}
