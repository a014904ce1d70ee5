//! Colour-space conversion.
//!
//! Pure numeric routines, no I/O: decode-domain remapping, the device
//! colour transforms (gray, RGB, CMYK, YCbCr, YCCK), low-bit grayscale
//! lookup tables and indexed-palette construction. Every function maps
//! raw sample values to packed ARGB (`0xAARRGGBB`).

use crate::config::{CmykStrategy, DecodeConfig};
use crate::model::colorspace::ColorSpace;

/// Pack ARGB channels into one pixel.
#[inline]
pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Fully transparent pixel.
pub const TRANSPARENT: u32 = 0x0000_0000;
/// Opaque black; also the padding colour for short palettes.
pub const OPAQUE_BLACK: u32 = 0xFF00_0000;

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Apply a decode-domain remap to one raw sample.
///
/// `dmin` and `scale` come straight from the normalized decode array
/// (`decode[2i]` and `decode[2i+1]`); the result lives in the component's
/// decode domain, usually 0..1.
#[inline]
pub fn apply_decode(raw: u32, dmin: f32, scale: f32) -> f32 {
    dmin + raw as f32 * scale
}

/// Grayscale level in 0..1 to ARGB.
#[inline]
pub fn gray_to_argb(level: f32) -> u32 {
    let v = clamp_u8(level * 255.0);
    argb(0xFF, v, v, v)
}

/// RGB components in 0..1 to ARGB.
#[inline]
pub fn rgb_to_argb(r: f32, g: f32, b: f32) -> u32 {
    argb(
        0xFF,
        clamp_u8(r * 255.0),
        clamp_u8(g * 255.0),
        clamp_u8(b * 255.0),
    )
}

/// CMYK to RGB by direct arithmetic approximation, with rounding.
#[inline]
pub fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> (u8, u8, u8) {
    let inv_k = 255u16.saturating_sub(k as u16);
    let r = ((255u16.saturating_sub(c as u16)) * inv_k + 127) / 255;
    let g = ((255u16.saturating_sub(m as u16)) * inv_k + 127) / 255;
    let b = ((255u16.saturating_sub(y as u16)) * inv_k + 127) / 255;
    (r as u8, g as u8, b as u8)
}

/// CMYK to ARGB via the arithmetic approximation.
#[inline]
pub fn cmyk_to_argb(c: u8, m: u8, y: u8, k: u8) -> u32 {
    let (r, g, b) = cmyk_to_rgb(c, m, y, k);
    argb(0xFF, r, g, b)
}

/// Full-range (JPEG) ITU-R BT.601 YCbCr to RGB.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

/// YCCK to CMYK: the chroma planes carry the complement of CMY, the K
/// plane passes through.
#[inline]
pub fn ycck_to_cmyk(y: u8, cb: u8, cr: u8, k: u8) -> (u8, u8, u8, u8) {
    let (r, g, b) = ycbcr_to_rgb(y, cb, cr);
    (255 - r, 255 - g, 255 - b, k)
}

/// Convert a buffer of interleaved CMYK samples to ARGB pixels using the
/// configured strategy. The ICC path needs both the `icc` feature and a
/// profile; in every other case the arithmetic approximation runs.
pub fn cmyk_buffer_to_argb(samples: &[u8], cfg: &DecodeConfig, profile: Option<&[u8]>) -> Vec<u32> {
    if cfg.cmyk_strategy == CmykStrategy::Icc
        && let Some(out) = cmyk_to_argb_icc(samples, profile)
    {
        return out;
    }
    samples
        .chunks_exact(4)
        .map(|px| cmyk_to_argb(px[0], px[1], px[2], px[3]))
        .collect()
}

/// ICC-profile CMYK -> sRGB transform; `None` on any profile or
/// transform failure so the caller can fall back to arithmetic.
#[cfg(feature = "icc")]
fn cmyk_to_argb_icc(samples: &[u8], profile: Option<&[u8]>) -> Option<Vec<u32>> {
    use moxcms::{ColorProfile, Layout, TransformOptions};

    let src = ColorProfile::new_from_slice(profile?).ok()?;
    let dst = ColorProfile::new_srgb();
    let transform = src
        .create_transform_8bit(Layout::Rgba, &dst, Layout::Rgb, TransformOptions::default())
        .ok()?;
    let npix = samples.len() / 4;
    let mut rgb = vec![0u8; npix * 3];
    transform.transform(&samples[..npix * 4], &mut rgb).ok()?;
    Some(
        rgb.chunks_exact(3)
            .map(|px| argb(0xFF, px[0], px[1], px[2]))
            .collect(),
    )
}

#[cfg(not(feature = "icc"))]
fn cmyk_to_argb_icc(_samples: &[u8], _profile: Option<&[u8]>) -> Option<Vec<u32>> {
    None
}

/// Map boundary component values (0..1, up to 4 components) through a base
/// colour space to ARGB. Used to turn colour-key ranges into pixel ranges.
pub fn components_to_argb(cs: &ColorSpace, comps: &[f32; 4]) -> u32 {
    match cs {
        ColorSpace::DeviceGray | ColorSpace::CalGray => gray_to_argb(comps[0]),
        ColorSpace::DeviceRgb | ColorSpace::CalRgb => rgb_to_argb(comps[0], comps[1], comps[2]),
        ColorSpace::DeviceCmyk => cmyk_to_argb(
            clamp_u8(comps[0] * 255.0),
            clamp_u8(comps[1] * 255.0),
            clamp_u8(comps[2] * 255.0),
            clamp_u8(comps[3] * 255.0),
        ),
        // Indexed/Separation/ICC are stripped by base_space() before we
        // get here; gray is the defensive default.
        _ => gray_to_argb(comps[0]),
    }
}

/// Build a grayscale lookup table for `bits`-deep samples.
///
/// The decode pair is the normalized `(Dmin, scale)` form; an inverted
/// decode array (`Dmin > Dmax`) produces a reversed table, which is how
/// fax streams and stencil masks flip polarity.
pub fn build_gray_lut(bits: u32, dmin: f32, scale: f32) -> Vec<u32> {
    let entries = 1usize << bits;
    (0..entries)
        .map(|i| gray_to_argb(apply_decode(i as u32, dmin, scale)))
        .collect()
}

/// Two-entry paint-or-skip table for stencil masks (ImageMask streams).
///
/// With the default decode, sample 0 paints the fill colour and sample 1
/// clears; an inverted decode array swaps the entries.
pub fn build_stencil_lut(inverted: bool, fill: u32) -> [u32; 2] {
    if inverted {
        [TRANSPARENT, fill]
    } else {
        [fill, TRANSPARENT]
    }
}

/// Build the ARGB palette for an indexed colour space.
///
/// The table always has `2^bits` entries: declared entries come from the
/// lookup data (clamped to `hival + 1`), anything beyond is padded with
/// opaque black.
pub fn build_indexed_palette(cs: &ColorSpace, bits: u32, cfg: &DecodeConfig) -> Vec<u32> {
    let entries = 1usize << bits.min(8);
    let mut palette = vec![OPAQUE_BLACK; entries];
    let ColorSpace::Indexed {
        base,
        hival,
        lookup,
    } = cs
    else {
        return palette;
    };

    let base = base.base_space();
    let ncomp = base.ncomponents().min(4);
    let declared = (*hival as usize + 1).min(entries);
    for (i, slot) in palette.iter_mut().enumerate().take(declared) {
        let offset = i * ncomp;
        if offset + ncomp > lookup.len() {
            break;
        }
        let entry = &lookup[offset..offset + ncomp];
        *slot = match base {
            ColorSpace::DeviceCmyk => {
                let px = [entry[0], entry[1], entry[2], entry[3]];
                cmyk_buffer_to_argb(&px, cfg, None)[0]
            }
            ColorSpace::DeviceRgb | ColorSpace::CalRgb => argb(0xFF, entry[0], entry[1], entry[2]),
            _ => argb(0xFF, entry[0], entry[0], entry[0]),
        };
    }
    palette
}
