//! Non-image stream filters.
//!
//! An image stream's filter chain may stack transport encodings
//! (ASCII85, Flate, LZW, RunLength) in front of the image codec proper.
//! This module undoes everything up to the first image-format filter and
//! applies PNG/TIFF predictors, leaving the codec layer a clean payload.
//!
//! Decoded size is capped against the expected image size: a malformed
//! stream must not be allowed to inflate without bound.

use crate::error::{RasterError, Result};
use crate::model::objects::{Dict, Object, Stream};
use flate2::read::ZlibDecoder;
use smallvec::SmallVec;
use std::io::Read;
use weezl::{BitOrder, decode::Decoder as LzwDecoder};

/// Hard ceiling for any decoded image payload.
pub const MAX_DECODED_BYTES: usize = 256 * 1024 * 1024;

/// One filter chain entry: name plus its decode parameters.
pub type FilterEntry = (String, Option<Dict>);

pub fn is_flate(name: &str) -> bool {
    name == "FlateDecode" || name.eq_ignore_ascii_case("Fl")
}

pub fn is_lzw(name: &str) -> bool {
    name == "LZWDecode" || name.eq_ignore_ascii_case("LZW")
}

pub fn is_ascii85(name: &str) -> bool {
    name == "ASCII85Decode" || name.eq_ignore_ascii_case("A85")
}

pub fn is_asciihex(name: &str) -> bool {
    name == "ASCIIHexDecode" || name.eq_ignore_ascii_case("AHx")
}

pub fn is_runlength(name: &str) -> bool {
    name == "RunLengthDecode" || name.eq_ignore_ascii_case("RL")
}

pub fn is_dct(name: &str) -> bool {
    name == "DCTDecode" || name.eq_ignore_ascii_case("DCT")
}

pub fn is_jpx(name: &str) -> bool {
    name == "JPXDecode" || name.eq_ignore_ascii_case("JPX")
}

pub fn is_jbig2(name: &str) -> bool {
    name.eq_ignore_ascii_case("JBIG2Decode")
}

pub fn is_ccitt(name: &str) -> bool {
    name == "CCITTFaxDecode" || name.eq_ignore_ascii_case("CCF")
}

/// True for filters handled by an image codec rather than this module.
pub fn is_image_filter(name: &str) -> bool {
    is_dct(name) || is_jpx(name) || is_jbig2(name) || is_ccitt(name)
}

/// Extract the stream's filter chain with per-filter parameters.
///
/// `/DecodeParms` may be a single dict (broadcast across every filter) or
/// an array running parallel to the `/Filter` array.
pub fn get_filters(stream: &Stream) -> SmallVec<[FilterEntry; 2]> {
    let filters: SmallVec<[Object; 2]> = match stream.get("Filter") {
        Some(obj @ Object::Name(_)) => SmallVec::from_iter([obj.clone()]),
        Some(Object::Array(arr)) => SmallVec::from_iter(arr.iter().cloned()),
        _ => SmallVec::new(),
    };
    let params_obj = stream
        .get("DecodeParms")
        .or_else(|| stream.get("DP"))
        .or_else(|| stream.get("DecodeParams"));
    let params_list: Vec<Option<Dict>> = match params_obj {
        Some(Object::Dict(d)) => vec![Some(d.clone())],
        Some(Object::Array(arr)) => arr
            .iter()
            .map(|obj| match obj {
                Object::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut result = SmallVec::new();
    if filters.is_empty() {
        return result;
    }
    let params = if params_list.is_empty() {
        vec![None; filters.len()]
    } else if params_list.len() == 1 && filters.len() > 1 {
        vec![params_list[0].clone(); filters.len()]
    } else {
        params_list
    };

    for (idx, filter) in filters.into_iter().enumerate() {
        if let Object::Name(name) = filter {
            let p = params.get(idx).cloned().unwrap_or(None);
            result.push((name, p));
        }
    }
    result
}

/// Decode a stream's transport filters, stopping at the first image-format
/// filter. Returns the remaining payload (the image codec's input).
pub fn decode_stream(stream: &Stream, max_len: Option<usize>) -> Result<Vec<u8>> {
    let filters = get_filters(stream);
    decode_chain(stream.rawdata(), &filters, max_len)
}

/// Apply a filter chain to raw bytes; see [`decode_stream`].
pub fn decode_chain(
    raw: &[u8],
    filters: &[FilterEntry],
    max_len: Option<usize>,
) -> Result<Vec<u8>> {
    let max_len = Some(max_len.unwrap_or(MAX_DECODED_BYTES).min(MAX_DECODED_BYTES));
    let mut data = raw.to_vec();

    for (filter, params) in filters {
        if is_flate(filter) {
            data = flate_decode_limited(&data, max_len)?;
        } else if is_lzw(filter) {
            let early_change = dict_int(params, "EarlyChange").unwrap_or(1);
            data = lzwdecode(&data, early_change as i32);
            enforce_max_len(data.len(), max_len)?;
        } else if is_ascii85(filter) {
            data = ascii85decode(&data);
            enforce_max_len(data.len(), max_len)?;
        } else if is_asciihex(filter) {
            data = asciihexdecode(&data);
            enforce_max_len(data.len(), max_len)?;
        } else if is_runlength(filter) {
            data = rldecode(&data);
            enforce_max_len(data.len(), max_len)?;
        } else if is_image_filter(filter) {
            // The image codec owns the rest of the chain.
            break;
        }

        if let Some(p) = params {
            data = apply_predictor(p, &data)?;
            enforce_max_len(data.len(), max_len)?;
        }
    }

    Ok(data)
}

fn dict_int(params: &Option<Dict>, key: &str) -> Option<i64> {
    params.as_ref()?.get(key)?.as_int().ok()
}

fn enforce_max_len(len: usize, max_len: Option<usize>) -> Result<()> {
    if let Some(max) = max_len
        && len > max
    {
        return Err(RasterError::Limit(format!(
            "decoded data exceeds expected size ({} > {})",
            len, max
        )));
    }
    Ok(())
}

fn flate_decode_limited(data: &[u8], max_len: Option<usize>) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| RasterError::Codec(format!("FlateDecode error: {}", e)))?;
        if n == 0 {
            break;
        }
        if let Some(max) = max_len
            && out.len().saturating_add(n) > max
        {
            return Err(RasterError::Limit(format!(
                "decoded data exceeds expected size ({} > {})",
                out.len() + n,
                max
            )));
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

/// Decode LZW data (PDF variant: MSB first, 8-bit symbols).
///
/// Lenient on corrupt tails: partial output is returned rather than an
/// error, matching how viewers treat damaged scans.
pub fn lzwdecode(data: &[u8], early_change: i32) -> Vec<u8> {
    let mut decoder = if early_change == 0 {
        LzwDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        LzwDecoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let _ = decoder.into_vec(&mut output).decode(data);
    output
}

/// Decode ASCII85 data (PDF variant: `z` shorthand, `<~ ~>` markers,
/// embedded whitespace, tolerated missing EOD).
pub fn ascii85decode(data: &[u8]) -> Vec<u8> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut filtered = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'z' => filtered.extend_from_slice(b"!!!!!"),
            b'!'..=b'u' => filtered.push(byte),
            _ => continue,
        }
    }

    let mut result = Vec::with_capacity(filtered.len() / 5 * 4 + 4);
    for chunk in filtered.chunks(5) {
        let mut padded = [b'u'; 5];
        padded[..chunk.len()].copy_from_slice(chunk);
        let mut value: u32 = 0;
        for &byte in &padded {
            value = value.wrapping_mul(85).wrapping_add((byte - b'!') as u32);
        }
        let bytes = value.to_be_bytes();
        let take = if chunk.len() == 5 { 4 } else { chunk.len().saturating_sub(1) };
        result.extend_from_slice(&bytes[..take]);
    }
    result
}

/// Decode ASCIIHex data; whitespace is skipped, `>` terminates, an odd
/// trailing digit is padded with zero.
pub fn asciihexdecode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut hi: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => continue,
        };
        match hi.take() {
            Some(h) => result.push((h << 4) | digit),
            None => hi = Some(digit),
        }
    }
    if let Some(h) = hi {
        result.push(h << 4);
    }
    result
}

/// Decode RunLength data. Truncated input is tolerated: decoding stops
/// gracefully at the end of the buffer.
pub fn rldecode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;

        match length {
            128 => break, // EOD
            0..=127 => {
                let count = length as usize + 1;
                if i + count <= data.len() {
                    result.extend_from_slice(&data[i..i + count]);
                    i += count;
                }
            }
            129..=255 => {
                if i < data.len() {
                    let count = 257 - length as usize;
                    let byte = data[i];
                    i += 1;
                    result.extend(std::iter::repeat_n(byte, count));
                }
            }
        }
    }
    result
}

/// Undo the predictor named in a filter's DecodeParms, if any.
fn apply_predictor(params: &Dict, data: &[u8]) -> Result<Vec<u8>> {
    let predictor = params
        .get("Predictor")
        .and_then(|v| v.as_int().ok())
        .unwrap_or(1);
    if predictor == 1 {
        return Ok(data.to_vec());
    }
    let colors = params
        .get("Colors")
        .and_then(|v| v.as_int().ok())
        .unwrap_or(1)
        .max(1) as usize;
    let columns = params
        .get("Columns")
        .and_then(|v| v.as_int().ok())
        .unwrap_or(1)
        .max(1) as usize;
    let bits = params
        .get("BitsPerComponent")
        .and_then(|v| v.as_int().ok())
        .unwrap_or(8)
        .max(1) as usize;
    if predictor == 2 {
        apply_tiff_predictor(colors, columns, bits, data)
    } else if predictor >= 10 {
        apply_png_predictor(data, columns, colors, bits)
    } else {
        Ok(data.to_vec())
    }
}

/// Number of extra bytes predictors add per row (the PNG filter-type
/// prefix), used for decoded-size estimates.
pub fn predictor_overhead(filters: &[FilterEntry], height: u32) -> usize {
    for (_, params) in filters {
        if let Some(p) = params {
            let pred = p
                .get("Predictor")
                .and_then(|v| v.as_int().ok())
                .unwrap_or(1);
            if pred == 2 || pred >= 10 {
                return height as usize;
            }
        }
    }
    0
}

fn apply_tiff_predictor(
    colors: usize,
    columns: usize,
    bits_per_component: usize,
    data: &[u8],
) -> Result<Vec<u8>> {
    // Sub-byte components pass through untouched; horizontal differencing
    // on packed rows is not seen in practice.
    if bits_per_component != 8 {
        return Ok(data.to_vec());
    }
    let bpp = colors * (bits_per_component / 8);
    let nbytes = columns * bpp;
    let mut out = Vec::with_capacity(data.len());
    for row in data.chunks(nbytes.max(1)) {
        let mut raw = Vec::with_capacity(nbytes);
        for i in 0..row.len() {
            let mut v = row[i];
            if i >= bpp {
                v = v.wrapping_add(raw[i - bpp]);
            }
            raw.push(v);
        }
        out.extend_from_slice(&raw);
    }
    Ok(out)
}

fn apply_png_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    let row_bytes = (colors * columns * bits_per_component).div_ceil(8);
    let bpp = std::cmp::max(1, colors * bits_per_component / 8);
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for row_start in (0..data.len()).step_by(row_size) {
        if row_start + row_size > data.len() {
            break;
        }

        let filter_type = data[row_start];
        let row_data = &data[row_start + 1..row_start + row_size];
        let mut current_row = vec![0u8; row_bytes];

        match filter_type {
            0 => current_row.copy_from_slice(row_data),
            1 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp {
                        current_row[i - bpp] as u16
                    } else {
                        0
                    };
                    let above = prev_row[i] as u16;
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    let paeth = paeth_predictor(left, above, upper_left);
                    current_row[i] = row_data[i].wrapping_add(paeth);
                }
            }
            _ => return Err(RasterError::Codec("invalid PNG predictor".to_string())),
        }

        result.extend_from_slice(&current_row);
        prev_row = current_row;
    }

    Ok(result)
}

const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
