//! Raw sample decoder.
//!
//! The decoder of last resort: unpacks uncompressed (or already
//! decompressed) sample data bit by bit and maps it through the decode
//! array and colour space. For well-formed sample data this path must
//! always produce an image, which is what makes it a safe fallback when a
//! specialised codec rejects its stream.
//!
//! Truncated data is tolerated: missing samples read as zero, so a short
//! buffer yields an image with a dark tail instead of an error.

use crate::codec::BitReader;
use crate::config::DecodeConfig;
use crate::error::Result;
use crate::image::convert;
use crate::image::params::{ImageParams, MaskRef};
use crate::image::pixmap::{Pixmap, Transparency};
use crate::model::colorspace::{ColorKeyMask, ColorSpace};

/// Decode raw samples into a pixmap.
///
/// `stencil_fill` carries the graphics-state fill colour when the stream
/// is a 1-bit image mask (paint-or-skip semantics).
pub fn decode(
    data: &[u8],
    params: &ImageParams,
    cfg: &DecodeConfig,
    stencil_fill: Option<u32>,
) -> Result<Option<Pixmap>> {
    let (w, h) = (params.width, params.height);
    if w == 0 || h == 0 {
        return Ok(None);
    }
    let bits = params.bits_per_component;
    let row_bytes = params.row_bytes();

    // Stencil path: a 1-bit mask selects between the fill colour and
    // nothing, via a 2-entry palette honouring the decode polarity.
    if params.is_image_mask || (bits == 1 && stencil_fill.is_some()) {
        let fill = stencil_fill.unwrap_or(convert::OPAQUE_BLACK);
        let lut = convert::build_stencil_lut(params.decode_inverted(0), fill);
        let mut px = unpack_lut(data, w, h, row_bytes, bits, &lut);
        px.set_transparency(Transparency::Bitmask);
        return Ok(Some(px));
    }

    let color_key = match &params.mask {
        Some(MaskRef::ColorKey(key)) => Some(key),
        _ => None,
    };

    match &params.colorspace {
        ColorSpace::Indexed { .. } => Ok(Some(decode_indexed(data, params, cfg, color_key))),
        ColorSpace::Separation { named, .. } => Ok(Some(decode_separation(data, params, *named))),
        cs if cs.base_space() == &ColorSpace::DeviceCmyk => {
            Ok(Some(decode_cmyk(data, params, cfg)))
        }
        cs => match cs.base_space().ncomponents() {
            3 => Ok(Some(decode_rgb(data, params))),
            _ => Ok(Some(decode_gray(data, params))),
        },
    }
}

/// Unpack fixed-depth single-component samples through a lookup table.
fn unpack_lut(data: &[u8], w: u32, h: u32, row_bytes: usize, bits: u32, lut: &[u32]) -> Pixmap {
    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let row = row_slice(data, y, row_bytes);
        let mut reader = BitReader::new(row);
        for _ in 0..w {
            let sample = reader.read_bits(bits).unwrap_or(0) as usize;
            out.push(*lut.get(sample).unwrap_or(&convert::OPAQUE_BLACK));
        }
    }
    Pixmap::from_argb(w, h, out)
}

fn row_slice(data: &[u8], y: usize, row_bytes: usize) -> &[u8] {
    let start = y * row_bytes;
    if start >= data.len() {
        return &[];
    }
    &data[start..(start + row_bytes).min(data.len())]
}

/// Grayscale at any supported depth. 1/2/4-bit depths go through a small
/// fixed lookup table; 8/16-bit samples are remapped directly.
fn decode_gray(data: &[u8], params: &ImageParams) -> Pixmap {
    let (w, h, bits) = (params.width, params.height, params.bits_per_component);
    let row_bytes = params.row_bytes();
    let (dmin, scale) = (params.decode[0], params.decode[1]);

    if bits <= 8 {
        let lut = convert::build_gray_lut(bits, dmin, scale);
        return unpack_lut(data, w, h, row_bytes, bits, &lut);
    }

    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let row = row_slice(data, y, row_bytes);
        let mut reader = BitReader::new(row);
        for _ in 0..w {
            let sample = reader.read_bits(bits).unwrap_or(0) >> (bits - 8);
            let level = convert::apply_decode(sample, dmin, scale * 256.0);
            out.push(convert::gray_to_argb(level));
        }
    }
    Pixmap::from_argb(w, h, out)
}

fn decode_rgb(data: &[u8], params: &ImageParams) -> Pixmap {
    let (w, h, bits) = (params.width, params.height, params.bits_per_component);
    let row_bytes = params.row_bytes();
    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let row = row_slice(data, y, row_bytes);
        let mut reader = BitReader::new(row);
        for _ in 0..w {
            let mut ch = [0f32; 3];
            for (c, slot) in ch.iter_mut().enumerate() {
                let sample = read_sample8(&mut reader, bits);
                *slot = convert::apply_decode(sample, params.decode[2 * c], scale8(params, c));
            }
            out.push(convert::rgb_to_argb(ch[0], ch[1], ch[2]));
        }
    }
    Pixmap::from_argb(w, h, out)
}

fn decode_cmyk(data: &[u8], params: &ImageParams, cfg: &DecodeConfig) -> Pixmap {
    let (w, h, bits) = (params.width, params.height, params.bits_per_component);
    let row_bytes = params.row_bytes();
    let npix = w as usize * h as usize;
    let mut samples = Vec::with_capacity(npix * 4);
    for y in 0..h as usize {
        let row = row_slice(data, y, row_bytes);
        let mut reader = BitReader::new(row);
        for _ in 0..w {
            for c in 0..4 {
                let sample = read_sample8(&mut reader, bits);
                let v = convert::apply_decode(sample, params.decode[2 * c], scale8(params, c));
                samples.push((v * 255.0).round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    let profile = params.colorspace.icc_profile();
    let out = convert::cmyk_buffer_to_argb(&samples, cfg, profile);
    Pixmap::from_argb(w, h, out)
}

/// A single colourant rendered through its alternate space: the tint is
/// approximated as darkness, with the named /All and /None colourants
/// painting nothing.
fn decode_separation(data: &[u8], params: &ImageParams, named: bool) -> Pixmap {
    let (w, h, bits) = (params.width, params.height, params.bits_per_component);
    if named {
        let mut px = Pixmap::new(w, h, convert::TRANSPARENT);
        px.set_transparency(Transparency::Bitmask);
        return px;
    }
    let row_bytes = params.row_bytes();
    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let row = row_slice(data, y, row_bytes);
        let mut reader = BitReader::new(row);
        for _ in 0..w {
            let sample = read_sample8(&mut reader, bits);
            let tint = convert::apply_decode(sample, params.decode[0], scale8(params, 0));
            out.push(convert::gray_to_argb(1.0 - tint.clamp(0.0, 1.0)));
        }
    }
    Pixmap::from_argb(w, h, out)
}

fn decode_indexed(
    data: &[u8],
    params: &ImageParams,
    cfg: &DecodeConfig,
    color_key: Option<&ColorKeyMask>,
) -> Pixmap {
    let (w, h, bits) = (params.width, params.height, params.bits_per_component);
    let row_bytes = params.row_bytes();
    let palette = convert::build_indexed_palette(&params.colorspace, bits, cfg);
    let maxval = (1u32 << bits.min(8)) - 1;
    let inverted = params.decode_inverted(0);

    let mut keyed = false;
    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let row = row_slice(data, y, row_bytes);
        let mut reader = BitReader::new(row);
        for _ in 0..w {
            let mut index = reader.read_bits(bits).unwrap_or(0).min(maxval);
            // Inverted decode domains flip the sample before lookup.
            if inverted {
                index = maxval - index;
            }
            if let Some(key) = color_key
                && key.masks_index(index as u16)
            {
                keyed = true;
                out.push(convert::TRANSPARENT);
                continue;
            }
            out.push(palette[index as usize]);
        }
    }
    let mut px = Pixmap::from_argb(w, h, out);
    if keyed {
        px.set_transparency(Transparency::Bitmask);
    }
    px
}

/// Read one component sample normalized to an 8-bit step count
/// (16-bit samples drop their low byte).
fn read_sample8(reader: &mut BitReader, bits: u32) -> u32 {
    let sample = reader.read_bits(bits).unwrap_or(0);
    if bits > 8 { sample >> (bits - 8) } else { sample }
}

/// Decode-array scale adjusted for the 8-bit normalization of
/// [`read_sample8`].
fn scale8(params: &ImageParams, component: usize) -> f32 {
    let scale = params.decode[2 * component + 1];
    if params.bits_per_component > 8 {
        scale * ((1u32 << (params.bits_per_component - 8)) as f32)
    } else {
        scale
    }
}
