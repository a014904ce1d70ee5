//! JBIG2 embedded-stream decoding.
//!
//! PDF embeds JBIG2 as bare segment sequences: an optional shared
//! `JBIG2Globals` stream followed by the page's own segments, with no file
//! header. Segment headers are parsed for the page-information and
//! generic-region segments; MMR-coded generic regions run through the
//! CCITT engine. Arithmetic-coded regions are reported as unavailable
//! (a clean `None`) so the facade can fall back, instead of guessing at
//! data we cannot decode.

use crate::codec::ccitt::{self, CcittParams, FaxDecoder};
use crate::codec::filters;
use crate::config::DecodeConfig;
use crate::error::Result;
use crate::image::params::ImageParams;
use crate::image::pixmap::Pixmap;
use crate::model::objects::{Object, Resolver};
use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

// Segment header flag masks.
const HEADER_FLAG_PAGE_ASSOC_LONG: u8 = 0b0100_0000;
const SEG_TYPE_MASK: u8 = 0b0011_1111;

// Long-form referred-segment count marker.
const REF_COUNT_LONG: u8 = 7;

const DATA_LEN_UNKNOWN: u32 = 0xFFFF_FFFF;

// Segment types consumed here.
pub const SEG_TYPE_INTERMEDIATE_GEN_REGION: u8 = 36;
pub const SEG_TYPE_IMMEDIATE_GEN_REGION: u8 = 38;
pub const SEG_TYPE_IMMEDIATE_LOSSLESS_GEN_REGION: u8 = 39;
pub const SEG_TYPE_PAGE_INFO: u8 = 48;

/// A parsed JBIG2 segment header plus its payload.
#[derive(Debug, Clone)]
pub struct Segment {
    pub number: u32,
    pub seg_type: u8,
    pub page_assoc: u32,
    pub data: Vec<u8>,
}

/// Parse a bare segment sequence (the PDF embedding carries no file
/// header). Truncated trailing segments are dropped, not errors.
pub fn parse_segments(data: &[u8]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        match parse_segment(data, pos) {
            Some((segment, next)) => {
                segments.push(segment);
                pos = next;
            }
            None => break,
        }
    }
    segments
}

fn parse_segment(data: &[u8], mut pos: usize) -> Option<(Segment, usize)> {
    if pos + 11 > data.len() {
        return None;
    }
    let number = BigEndian::read_u32(&data[pos..pos + 4]);
    let flags = data[pos + 4];
    let seg_type = flags & SEG_TYPE_MASK;
    let page_assoc_long = flags & HEADER_FLAG_PAGE_ASSOC_LONG != 0;
    pos += 5;

    // Referred-to segment count and retention flags.
    let first = *data.get(pos)?;
    let mut ref_count = (first >> 5) as u32;
    if ref_count < REF_COUNT_LONG as u32 {
        pos += 1;
    } else {
        if pos + 4 > data.len() {
            return None;
        }
        ref_count = BigEndian::read_u32(&data[pos..pos + 4]) & 0x1FFF_FFFF;
        pos += 4 + ((ref_count as usize + 1).div_ceil(8));
    }

    // Referred-to segment numbers, sized by this segment's number.
    let ref_size = if number <= 256 {
        1
    } else if number <= 65536 {
        2
    } else {
        4
    };
    pos += ref_count as usize * ref_size;

    // Page association.
    let page_assoc = if page_assoc_long {
        if pos + 4 > data.len() {
            return None;
        }
        let v = BigEndian::read_u32(&data[pos..pos + 4]);
        pos += 4;
        v
    } else {
        let v = *data.get(pos)? as u32;
        pos += 1;
        v
    };

    if pos + 4 > data.len() {
        return None;
    }
    let data_length = BigEndian::read_u32(&data[pos..pos + 4]);
    pos += 4;
    if data_length == DATA_LEN_UNKNOWN {
        // Unknown-length generic regions need pixel-level scanning; bail.
        return None;
    }
    let end = pos.checked_add(data_length as usize)?;
    if end > data.len() {
        return None;
    }
    let segment = Segment {
        number,
        seg_type,
        page_assoc,
        data: data[pos..end].to_vec(),
    };
    Some((segment, end))
}

/// One-bit page bitmap in JBIG2 polarity (1 = black).
struct PageBitmap {
    width: usize,
    height: usize,
    row_bytes: usize,
    data: Vec<u8>,
}

impl PageBitmap {
    fn new(width: usize, height: usize, default_black: bool) -> Self {
        let row_bytes = width.div_ceil(8);
        let fill = if default_black { 0xFF } else { 0x00 };
        Self {
            width,
            height,
            row_bytes,
            data: vec![fill; row_bytes * height],
        }
    }

    #[inline]
    fn get(&self, x: usize, y: usize) -> u8 {
        (self.data[y * self.row_bytes + x / 8] >> (7 - x % 8)) & 1
    }

    #[inline]
    fn put(&mut self, x: usize, y: usize, bit: u8) {
        let mask = 0x80 >> (x % 8);
        let byte = &mut self.data[y * self.row_bytes + x / 8];
        if bit != 0 {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Compose a decoded region (packed rows, 1 = black) at (x0, y0)
    /// using the external combination operator.
    fn compose(&mut self, region: &[u8], rw: usize, rh: usize, x0: usize, y0: usize, op: u8) {
        let region_row_bytes = rw.div_ceil(8);
        for ry in 0..rh {
            let y = y0 + ry;
            if y >= self.height {
                break;
            }
            for rx in 0..rw {
                let x = x0 + rx;
                if x >= self.width {
                    break;
                }
                let idx = ry * region_row_bytes + rx / 8;
                let bit = match region.get(idx) {
                    Some(byte) => (byte >> (7 - rx % 8)) & 1,
                    None => 0,
                };
                let old = self.get(x, y);
                let new = match op {
                    0 => old | bit,
                    1 => old & bit,
                    2 => old ^ bit,
                    3 => !(old ^ bit) & 1,
                    _ => bit, // REPLACE
                };
                self.put(x, y, new);
            }
        }
    }

    /// Flip to the sample polarity the rest of the pipeline expects
    /// (1 = white, matching CCITT packing with BlackIs1 unset).
    fn into_white_one(mut self) -> Vec<u8> {
        for byte in &mut self.data {
            *byte = !*byte;
        }
        self.data
    }
}

/// Fetch the shared `JBIG2Globals` stream named in the filter parameters.
fn globals_segments(params: &ImageParams, resolver: &dyn Resolver) -> Vec<Segment> {
    let dict = params
        .filters
        .iter()
        .find(|(name, _)| filters::is_jbig2(name))
        .and_then(|(_, d)| d.as_ref());
    let Some(obj) = dict.and_then(|d| d.get("JBIG2Globals")) else {
        return Vec::new();
    };
    match resolver.resolve_deep(obj) {
        Object::Stream(stream) => match filters::decode_stream(&stream, None) {
            Ok(bytes) => parse_segments(&bytes),
            Err(_) => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Decode a JBIG2 payload into a pixmap.
///
/// Returns `Ok(None)` when the stream only contains region codings this
/// build cannot decode (arithmetic generic regions, symbol dictionaries),
/// so the caller treats the image as unavailable rather than failed.
pub fn decode(
    data: &[u8],
    params: &ImageParams,
    _cfg: &DecodeConfig,
    resolver: &dyn Resolver,
    stencil_fill: Option<u32>,
) -> Result<Option<Pixmap>> {
    let mut segments = globals_segments(params, resolver);
    segments.extend(parse_segments(data));
    if segments.is_empty() {
        return Ok(None);
    }

    let mut page_w = params.width as usize;
    let mut page_h = params.height as usize;
    let mut default_black = false;
    for seg in &segments {
        if seg.seg_type == SEG_TYPE_PAGE_INFO && seg.data.len() >= 17 {
            let w = BigEndian::read_u32(&seg.data[0..4]);
            let h = BigEndian::read_u32(&seg.data[4..8]);
            if w > 0 && w != DATA_LEN_UNKNOWN {
                page_w = w as usize;
            }
            if h > 0 && h != DATA_LEN_UNKNOWN {
                page_h = h as usize;
            }
            // Flags bit 2: page default pixel value.
            default_black = seg.data[16] & 0b100 != 0;
        }
    }
    if page_w == 0 || page_h == 0 {
        return Ok(None);
    }

    let mut page = PageBitmap::new(page_w, page_h, default_black);
    let mut decoded_regions = 0usize;

    for seg in &segments {
        let is_region = matches!(
            seg.seg_type,
            SEG_TYPE_INTERMEDIATE_GEN_REGION
                | SEG_TYPE_IMMEDIATE_GEN_REGION
                | SEG_TYPE_IMMEDIATE_LOSSLESS_GEN_REGION
        );
        if !is_region {
            continue;
        }
        // Region segment info: width, height, x, y (u32 each) and the
        // external combination operator byte, then the generic region
        // flags byte.
        if seg.data.len() < 18 {
            continue;
        }
        let rw = BigEndian::read_u32(&seg.data[0..4]) as usize;
        let rh = BigEndian::read_u32(&seg.data[4..8]) as usize;
        let rx = BigEndian::read_u32(&seg.data[8..12]) as usize;
        let ry = BigEndian::read_u32(&seg.data[12..16]) as usize;
        let comb_op = seg.data[16] & 0b111;
        let region_flags = seg.data[17];
        let mmr = region_flags & 1 != 0;

        if !mmr {
            debug!(
                segment = seg.number,
                "arithmetic-coded JBIG2 generic region: decoder unavailable"
            );
            continue;
        }
        if rw == 0 || rh == 0 || rw > 1 << 20 || rh > 1 << 20 {
            continue;
        }

        // MMR data is a T.6 codestream; the region bitmap polarity
        // (1 = black) matches BlackIs1 packing.
        let fax_params = CcittParams {
            k: -1,
            columns: rw,
            rows: Some(rh),
            encoded_byte_align: false,
            black_is_1: true,
        };
        match FaxDecoder::new(fax_params).decode_rows(&seg.data[18..]) {
            Ok(rows) => {
                page.compose(&rows, rw, rh, rx, ry, comb_op);
                decoded_regions += 1;
            }
            Err(err) => {
                debug!(segment = seg.number, "JBIG2 MMR region failed: {err}");
            }
        }
    }

    if decoded_regions == 0 {
        return Ok(None);
    }

    let packed = page.into_white_one();
    Ok(Some(ccitt::bits_to_pixmap(
        &packed,
        page_w,
        true,
        params,
        stencil_fill,
    )))
}
