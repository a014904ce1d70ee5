//! DCT (JPEG) decoding.
//!
//! Entropy decoding is delegated to the `jpeg-decoder` crate; the work
//! here is the byte-level framing the format demands: scanning the marker
//! stream for the frame header (component count, precision) and the APP14
//! Adobe marker whose transform byte disambiguates YCbCr / YCCK / CMYK
//! encodings. The sniffed encoding decides the colour transform — the
//! declared colour space of the surrounding dictionary does not.

use crate::config::DecodeConfig;
use crate::error::{RasterError, Result};
use crate::image::convert;
use crate::image::params::ImageParams;
use crate::image::pixmap::Pixmap;
use byteorder::{BigEndian, ByteOrder};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use std::io::Cursor;
use tracing::debug;

/// Colour encoding of a JPEG scan, as determined from the markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTransform {
    Grayscale,
    Rgb,
    YCbCr,
    Cmyk,
    Ycck,
}

/// Frame layout sniffed from the marker stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegLayout {
    pub precision: u8,
    pub width: u16,
    pub height: u16,
    pub components: u8,
    /// APP14 Adobe transform byte: 0 = none, 1 = YCbCr, 2 = YCCK.
    pub adobe_transform: Option<u8>,
}

impl JpegLayout {
    /// Walk the marker stream up to the first scan.
    ///
    /// Tolerant of junk between markers (scanners emit it); a missing
    /// frame header just leaves the defaults in place.
    pub fn scan(data: &[u8]) -> JpegLayout {
        let mut layout = JpegLayout::default();
        let mut pos = 0usize;
        // SOI
        if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
            pos = 2;
        }
        while pos + 4 <= data.len() {
            if data[pos] != 0xFF {
                pos += 1;
                continue;
            }
            let marker = data[pos + 1];
            match marker {
                // Fill bytes and standalone markers.
                0xFF => {
                    pos += 1;
                    continue;
                }
                0x01 | 0xD0..=0xD8 => {
                    pos += 2;
                    continue;
                }
                // Start of scan or EOI: the frame header is behind us.
                0xDA | 0xD9 => break,
                _ => {}
            }
            let length = BigEndian::read_u16(&data[pos + 2..pos + 4]) as usize;
            if length < 2 || pos + 2 + length > data.len() {
                break;
            }
            let body = &data[pos + 4..pos + 2 + length];
            match marker {
                // SOF0-SOF15, excluding the DHT/DAC/JPG gaps.
                0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                    if body.len() >= 6 {
                        layout.precision = body[0];
                        layout.height = BigEndian::read_u16(&body[1..3]);
                        layout.width = BigEndian::read_u16(&body[3..5]);
                        layout.components = body[5];
                    }
                }
                // APP14 "Adobe": version(2) flags0(2) flags1(2) transform(1).
                0xEE => {
                    if body.len() >= 12 && &body[..5] == b"Adobe" {
                        layout.adobe_transform = Some(body[11]);
                    }
                }
                _ => {}
            }
            pos += 2 + length;
        }
        layout
    }

    /// Decide the colour transform from the sniffed layout.
    ///
    /// Three-component scans default to YCbCr (the JFIF convention)
    /// unless the Adobe marker says the data is plain RGB; four-component
    /// scans are CMYK unless the Adobe transform byte says YCCK.
    pub fn color_transform(&self) -> ColorTransform {
        match self.components {
            1 => ColorTransform::Grayscale,
            3 => match self.adobe_transform {
                Some(0) => ColorTransform::Rgb,
                _ => ColorTransform::YCbCr,
            },
            4 => match self.adobe_transform {
                Some(2) => ColorTransform::Ycck,
                _ => ColorTransform::Cmyk,
            },
            _ => ColorTransform::Grayscale,
        }
    }
}

/// Decode a JPEG payload into a pixmap.
pub fn decode(data: &[u8], params: &ImageParams, cfg: &DecodeConfig) -> Result<Option<Pixmap>> {
    let layout = JpegLayout::scan(data);
    let transform = layout.color_transform();
    debug!(
        components = layout.components,
        adobe = ?layout.adobe_transform,
        ?transform,
        "DCT scan"
    );

    let mut decoder = JpegDecoder::new(Cursor::new(data));
    decoder
        .read_info()
        .map_err(|e| RasterError::Codec(format!("DCT header error: {e}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| RasterError::Codec("DCT header missing".into()))?;
    let pixels = decoder
        .decode()
        .map_err(|e| RasterError::Codec(format!("DCT decode error: {e}")))?;

    let (w, h) = (info.width as u32, info.height as u32);
    let npix = w as usize * h as usize;
    if w == 0 || h == 0 {
        return Ok(None);
    }

    let out: Vec<u32> = match info.pixel_format {
        PixelFormat::L8 => {
            let (dmin, scale) = gray_decode(params);
            pixels
                .iter()
                .take(npix)
                .map(|&v| convert::gray_to_argb(convert::apply_decode(v as u32, dmin, scale)))
                .collect()
        }
        PixelFormat::L16 => {
            let (dmin, scale) = gray_decode(params);
            pixels
                .chunks_exact(2)
                .take(npix)
                .map(|px| {
                    convert::gray_to_argb(convert::apply_decode(px[0] as u32, dmin, scale))
                })
                .collect()
        }
        // The library already ran the YCbCr (or declared-RGB) path.
        PixelFormat::RGB24 => pixels
            .chunks_exact(3)
            .take(npix)
            .map(|px| convert::argb(0xFF, px[0], px[1], px[2]))
            .collect(),
        PixelFormat::CMYK32 => {
            // Adobe CMYK scans store inverted ink values; YCCK has been
            // unfolded to CMYK by the library already.
            let mut cmyk = pixels;
            cmyk.truncate(npix * 4);
            if layout.adobe_transform.is_some() {
                for v in &mut cmyk {
                    *v = 255 - *v;
                }
            }
            convert::cmyk_buffer_to_argb(&cmyk, cfg, params.colorspace.icc_profile())
        }
    };

    Ok(Some(Pixmap::from_argb(w, h, out)))
}

/// Decode-array pair for the gray path; JPEG sample steps are 8-bit
/// regardless of the dictionary's claimed depth.
fn gray_decode(params: &ImageParams) -> (f32, f32) {
    if params.explicit_decode && params.bits_per_component == 8 {
        (params.decode[0], params.decode[1])
    } else {
        (0.0, 1.0 / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sof0(components: u8) -> Vec<u8> {
        // SOF0 body: precision 8, 1x1, n components (3 bytes each).
        let mut body = vec![8, 0, 1, 0, 1, components];
        for id in 0..components {
            body.extend_from_slice(&[id + 1, 0x11, 0]);
        }
        let mut seg = vec![0xFF, 0xC0];
        seg.extend_from_slice(&((body.len() as u16 + 2).to_be_bytes()));
        seg.extend_from_slice(&body);
        seg
    }

    fn app14(transform: u8) -> Vec<u8> {
        let mut body = b"Adobe".to_vec();
        body.extend_from_slice(&[0, 100, 0, 0, 0, 0, transform]);
        let mut seg = vec![0xFF, 0xEE];
        seg.extend_from_slice(&((body.len() as u16 + 2).to_be_bytes()));
        seg.extend_from_slice(&body);
        seg
    }

    fn jpeg_header(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        for seg in segments {
            data.extend_from_slice(seg);
        }
        data.extend_from_slice(&[0xFF, 0xDA, 0, 2]);
        data
    }

    #[test]
    fn adobe_transform_one_selects_ycbcr() {
        // Three components with Adobe transform byte 1: the YCbCr path
        // applies no matter what colour space the dictionary declares.
        let data = jpeg_header(&[app14(1), sof0(3)]);
        let layout = JpegLayout::scan(&data);
        assert_eq!(layout.components, 3);
        assert_eq!(layout.adobe_transform, Some(1));
        assert_eq!(layout.color_transform(), ColorTransform::YCbCr);
    }

    #[test]
    fn adobe_transform_zero_selects_rgb() {
        let data = jpeg_header(&[app14(0), sof0(3)]);
        assert_eq!(JpegLayout::scan(&data).color_transform(), ColorTransform::Rgb);
    }

    #[test]
    fn four_components_default_cmyk_unless_ycck() {
        let cmyk = jpeg_header(&[sof0(4)]);
        assert_eq!(JpegLayout::scan(&cmyk).color_transform(), ColorTransform::Cmyk);
        let ycck = jpeg_header(&[app14(2), sof0(4)]);
        assert_eq!(JpegLayout::scan(&ycck).color_transform(), ColorTransform::Ycck);
    }

    #[test]
    fn jfif_three_components_default_ycbcr() {
        let data = jpeg_header(&[sof0(3)]);
        let layout = JpegLayout::scan(&data);
        assert_eq!(layout.adobe_transform, None);
        assert_eq!(layout.color_transform(), ColorTransform::YCbCr);
    }
}
