//! JPXDecode (JPEG2000) support.
//!
//! Behind the `jpeg2000` feature, decoding is handled by the `jpeg2k`
//! crate; components are interleaved and mapped by count (1 = gray,
//! 3 = RGB, 4 = CMYK), with precision normalized to 8 bits. Without the
//! feature the decoder reports "unavailable" and the facade moves on.

use crate::config::DecodeConfig;
use crate::error::Result;
use crate::image::params::ImageParams;
use crate::image::pixmap::Pixmap;

#[cfg(feature = "jpeg2000")]
pub fn decode(data: &[u8], params: &ImageParams, cfg: &DecodeConfig) -> Result<Option<Pixmap>> {
    use crate::error::RasterError;
    use crate::image::convert;

    let image = jpeg2k::Image::from_bytes(data)
        .map_err(|e| RasterError::Codec(format!("JPXDecode failed: {e:?}")))?;

    let width = image.width();
    let height = image.height();
    let components = image.components();
    let ncomp = components.len();
    if width == 0 || height == 0 || ncomp == 0 {
        return Ok(None);
    }
    let npix = width as usize * height as usize;

    // Components may differ in precision; normalize each to 8 bits while
    // interleaving.
    let mut interleaved = Vec::with_capacity(npix * ncomp);
    for y in 0..height as usize {
        for x in 0..width as usize {
            for comp in components {
                let cw = comp.width() as usize;
                let idx = y * cw + x;
                let v = comp.data().get(idx).copied().unwrap_or(0);
                let precision = comp.precision();
                let v8 = if precision > 8 {
                    (v >> (precision - 8)).clamp(0, 255) as u8
                } else if precision < 8 && precision > 0 {
                    let maxval = (1i32 << precision) - 1;
                    ((v.clamp(0, maxval) * 255) / maxval) as u8
                } else {
                    v.clamp(0, 255) as u8
                };
                interleaved.push(v8);
            }
        }
    }

    let out: Vec<u32> = match ncomp {
        1 => interleaved
            .iter()
            .map(|&v| convert::argb(0xFF, v, v, v))
            .collect(),
        3 => interleaved
            .chunks_exact(3)
            .map(|px| convert::argb(0xFF, px[0], px[1], px[2]))
            .collect(),
        4 => convert::cmyk_buffer_to_argb(&interleaved, cfg, params.colorspace.icc_profile()),
        _ => return Ok(None),
    };

    Ok(Some(Pixmap::from_argb(width, height, out)))
}

#[cfg(not(feature = "jpeg2000"))]
pub fn decode(_data: &[u8], _params: &ImageParams, _cfg: &DecodeConfig) -> Result<Option<Pixmap>> {
    tracing::warn!("JPXDecode stream encountered but JPEG2000 support is not compiled in");
    Ok(None)
}
