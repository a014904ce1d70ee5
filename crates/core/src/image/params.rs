//! Image dictionary parameter extraction.
//!
//! Pulls width/height/bits/colour-space/decode/mask information out of an
//! image stream dictionary, normalizing and defaulting as it goes. The
//! policy is permissive throughout: a missing or malformed entry gets a
//! default, never an error, because real-world documents omit and mangle
//! these entries constantly.
//!
//! Parameters are re-derived per render pass: colour-space resolution is
//! resource-scoped and the fill colour used for image masks follows the
//! graphics state.

use crate::codec::filters::{self, FilterEntry};
use crate::config::DecodeConfig;
use crate::model::colorspace::{ColorKeyMask, ColorSpace, mask_stream};
use crate::model::objects::{Object, Resolver, Stream};
use smallvec::SmallVec;

/// The `/Mask` entry: either a stencil image stream or a colour-key range.
#[derive(Debug, Clone)]
pub enum MaskRef {
    Stencil(Stream),
    ColorKey(ColorKeyMask),
}

/// Normalized image parameters for one decode pass.
#[derive(Debug, Clone)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u32,
    pub colorspace: ColorSpace,
    /// Normalized decode array, `2 * ncomponents` entries:
    /// `decode[2i]` is Dmin, `decode[2i+1]` is the per-step scale
    /// `(Dmax - Dmin) / (2^bits - 1)`. Callers remap a raw sample with
    /// `value = decode[2i] + sample * decode[2i+1]`.
    pub decode: Vec<f32>,
    /// Whether the dictionary carried an explicit /Decode entry.
    pub explicit_decode: bool,
    pub filters: SmallVec<[FilterEntry; 2]>,
    pub is_image_mask: bool,
    pub mask: Option<MaskRef>,
    pub smask: Option<Stream>,
}

fn get_entry<'a>(stream: &'a Stream, long: &str, short: &str) -> Option<&'a Object> {
    stream.get(long).or_else(|| stream.get(short))
}

fn int_entry(stream: &Stream, resolver: &dyn Resolver, long: &str, short: &str) -> Option<i64> {
    let obj = get_entry(stream, long, short)?;
    resolver.resolve_deep(obj).as_int().ok()
}

impl ImageParams {
    /// Derive parameters from an image stream dictionary.
    pub fn from_stream(stream: &Stream, resolver: &dyn Resolver, cfg: &DecodeConfig) -> Self {
        let is_image_mask = get_entry(stream, "ImageMask", "IM")
            .map(|o| resolver.resolve_deep(o))
            .and_then(|o| o.as_bool().ok())
            .unwrap_or(false);

        let bits_per_component = match int_entry(stream, resolver, "BitsPerComponent", "BPC") {
            Some(b @ 1) | Some(b @ 2) | Some(b @ 4) | Some(b @ 8) | Some(b @ 16) => b as u32,
            // Stencil masks are 1 bit by definition; everything else
            // defaults to 8.
            _ if is_image_mask => 1,
            _ => 8,
        };
        // A mask dictionary claiming a deeper sample size is still a
        // 1-bit stencil.
        let bits_per_component = if is_image_mask { 1 } else { bits_per_component };

        let colorspace = if is_image_mask {
            ColorSpace::DeviceGray
        } else {
            match get_entry(stream, "ColorSpace", "CS") {
                Some(obj) => ColorSpace::resolve(obj, resolver),
                None => ColorSpace::DeviceGray,
            }
        };

        let (width, height) = Self::dimensions(stream, resolver, cfg);
        let (decode, explicit_decode) =
            Self::decode_array(stream, resolver, &colorspace, bits_per_component);

        let mask = Self::mask_entry(stream, resolver, &colorspace, bits_per_component);
        let smask = stream
            .get("SMask")
            .and_then(|obj| mask_stream(obj, resolver));

        Self {
            width,
            height,
            bits_per_component,
            colorspace,
            decode,
            explicit_decode,
            filters: filters::get_filters(stream),
            is_image_mask,
            mask,
            smask,
        }
    }

    /// Width/height with the missing-dimension heuristic: scanned and fax
    /// streams occasionally omit one dimension; it is inferred from the
    /// other via the configured page ratio.
    fn dimensions(stream: &Stream, resolver: &dyn Resolver, cfg: &DecodeConfig) -> (u32, u32) {
        let w = int_entry(stream, resolver, "Width", "W").unwrap_or(0);
        let h = int_entry(stream, resolver, "Height", "H").unwrap_or(0);
        let w = w.clamp(0, u32::MAX as i64) as u32;
        let h = h.clamp(0, u32::MAX as i64) as u32;
        match (w, h) {
            (0, 0) => (1, 1),
            (0, h) => (((h as f64 * cfg.page_ratio).round() as u32).max(1), h),
            (w, 0) => (w, ((w as f64 / cfg.page_ratio).round() as u32).max(1)),
            other => other,
        }
    }

    /// Build the normalized decode array.
    ///
    /// Without an explicit /Decode the default domain is `[0, 1]` per
    /// component (`[0, 2^bits - 1]` for indexed spaces), which normalizes
    /// to `(0, 1/maxval)` (`(0, 1)` for indexed).
    fn decode_array(
        stream: &Stream,
        resolver: &dyn Resolver,
        cs: &ColorSpace,
        bits: u32,
    ) -> (Vec<f32>, bool) {
        let ncomp = cs.ncomponents();
        let maxval = ((1u64 << bits) - 1) as f32;
        let default_dmax = if matches!(cs, ColorSpace::Indexed { .. }) {
            maxval
        } else {
            1.0
        };

        let raw: Option<Vec<f32>> = get_entry(stream, "Decode", "D")
            .map(|o| resolver.resolve_deep(o))
            .and_then(|o| o.as_array().ok().cloned())
            .map(|arr| {
                arr.iter()
                    .map(|v| resolver.resolve_deep(v).as_num().unwrap_or(0.0) as f32)
                    .collect()
            });

        let explicit = raw.as_ref().is_some_and(|r| r.len() >= 2 * ncomp);
        let mut decode = Vec::with_capacity(2 * ncomp);
        for i in 0..ncomp {
            let (dmin, dmax) = match raw.as_ref() {
                Some(raw) if explicit => (raw[2 * i], raw[2 * i + 1]),
                _ => (0.0, default_dmax),
            };
            decode.push(dmin);
            decode.push((dmax - dmin) / maxval);
        }
        (decode, explicit)
    }

    fn mask_entry(
        stream: &Stream,
        resolver: &dyn Resolver,
        cs: &ColorSpace,
        bits: u32,
    ) -> Option<MaskRef> {
        let obj = stream.get("Mask")?;
        match resolver.resolve_deep(obj) {
            Object::Array(arr) => {
                let ranges: Vec<i64> = arr
                    .iter()
                    .map(|v| resolver.resolve_deep(v).as_int().unwrap_or(0))
                    .collect();
                ColorKeyMask::resolve(&ranges, cs, bits).map(MaskRef::ColorKey)
            }
            _ => mask_stream(obj, resolver).map(MaskRef::Stencil),
        }
    }

    /// Components per pixel in the sample data.
    pub fn ncomponents(&self) -> usize {
        self.colorspace.ncomponents()
    }

    /// Whether the decode domain for component `i` is inverted
    /// (`Dmin > Dmax`); inverted domains flip sample polarity before
    /// palette lookup.
    pub fn decode_inverted(&self, component: usize) -> bool {
        self.decode
            .get(2 * component + 1)
            .is_some_and(|&scale| scale < 0.0)
    }

    /// Bytes per packed sample row (rows are byte-aligned).
    pub fn row_bytes(&self) -> usize {
        (self.width as usize * self.ncomponents() * self.bits_per_component as usize).div_ceil(8)
    }

    /// Expected sample data length for the full image.
    pub fn expected_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// The name of the image-format filter ending the chain, if any.
    pub fn image_filter(&self) -> Option<&FilterEntry> {
        self.filters
            .iter()
            .find(|(name, _)| filters::is_image_filter(name))
    }
}
