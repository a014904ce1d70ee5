//! PDF colour space resolution.
//!
//! Colour spaces arrive as names (`/DeviceRGB`), inline-image abbreviations
//! (`/RGB`), or arrays (`[/Indexed /DeviceRGB 255 <...>]`), possibly behind
//! indirect references. Resolution is permissive: anything unreadable
//! degrades to DeviceGray rather than failing the decode.

use crate::codec::filters;
use crate::model::objects::{Object, Resolver, Stream};

/// A resolved PDF colour space.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    /// Palette-based space: each sample is an index into `lookup`, which
    /// holds `hival + 1` entries of `base.ncomponents()` bytes each.
    Indexed {
        base: Box<ColorSpace>,
        hival: u16,
        lookup: Vec<u8>,
    },
    /// Single named colourant with an alternate space for rendering.
    Separation {
        alternate: Box<ColorSpace>,
        /// True for the special /All and /None colourant names.
        named: bool,
    },
    /// ICC profile stream with an alternate fallback derived from /N.
    IccBased {
        ncomponents: usize,
        alternate: Box<ColorSpace>,
        /// Decoded profile bytes, kept for the ICC CMYK strategy.
        profile: Vec<u8>,
    },
}

impl ColorSpace {
    /// Number of colour components per sample.
    pub fn ncomponents(&self) -> usize {
        match self {
            Self::DeviceGray | Self::CalGray => 1,
            Self::DeviceRgb | Self::CalRgb => 3,
            Self::DeviceCmyk => 4,
            Self::Indexed { .. } => 1,
            Self::Separation { .. } => 1,
            Self::IccBased { ncomponents, .. } => *ncomponents,
        }
    }

    /// The space samples are actually expressed in after palette/tint
    /// indirection is stripped (what the pixel converter works with).
    pub fn base_space(&self) -> &ColorSpace {
        match self {
            Self::IccBased { alternate, .. } => alternate.base_space(),
            Self::Separation { alternate, .. } => alternate.base_space(),
            other => other,
        }
    }

    /// Embedded ICC profile bytes, when this space carries one.
    pub fn icc_profile(&self) -> Option<&[u8]> {
        match self {
            Self::IccBased { profile, .. } if !profile.is_empty() => Some(profile),
            _ => None,
        }
    }

    /// Map a colour space name (full or inline abbreviation) to a space.
    pub fn from_name(name: &str) -> Option<ColorSpace> {
        match name {
            "DeviceGray" | "G" => Some(Self::DeviceGray),
            "DeviceRGB" | "RGB" => Some(Self::DeviceRgb),
            "DeviceCMYK" | "CMYK" => Some(Self::DeviceCmyk),
            "CalGray" => Some(Self::CalGray),
            "CalRGB" => Some(Self::CalRgb),
            // Lab renders through its illuminant-relative RGB approximation;
            // we treat it as calibrated RGB at this layer.
            "Lab" => Some(Self::CalRgb),
            _ => None,
        }
    }

    /// Resolve a colour space object against the resource context.
    ///
    /// Never fails: malformed or unknown spaces come back as DeviceGray,
    /// matching the tolerance policy for real-world documents.
    pub fn resolve(obj: &Object, resolver: &dyn Resolver) -> ColorSpace {
        Self::try_resolve(obj, resolver, 0).unwrap_or(Self::DeviceGray)
    }

    fn try_resolve(obj: &Object, resolver: &dyn Resolver, depth: usize) -> Option<ColorSpace> {
        if depth > 8 {
            return None;
        }
        let obj = resolver.resolve_deep(obj);
        match &obj {
            Object::Name(name) => Self::from_name(name),
            Object::Array(arr) => Self::resolve_array(arr, resolver, depth),
            _ => None,
        }
    }

    fn resolve_array(arr: &[Object], resolver: &dyn Resolver, depth: usize) -> Option<ColorSpace> {
        let family = resolver.resolve_deep(arr.first()?);
        let family = family.as_name().ok()?;
        match family {
            "Indexed" | "I" => {
                let base = Self::try_resolve(arr.get(1)?, resolver, depth + 1)?;
                let hival = resolver.resolve_deep(arr.get(2)?).as_int().ok()?;
                let hival = hival.clamp(0, 255) as u16;
                let lookup = Self::lookup_bytes(arr.get(3)?, resolver)?;
                Some(Self::Indexed {
                    base: Box::new(base),
                    hival,
                    lookup,
                })
            }
            "ICCBased" => {
                let stream_obj = resolver.resolve_deep(arr.get(1)?);
                let stream = stream_obj.as_stream().ok()?;
                let n = stream
                    .get("N")
                    .map(|o| resolver.resolve_deep(o))
                    .and_then(|o| o.as_int().ok())
                    .unwrap_or(1);
                let alternate = match stream.get("Alternate") {
                    Some(alt) => Self::try_resolve(alt, resolver, depth + 1),
                    None => None,
                }
                .unwrap_or(match n {
                    3 => Self::DeviceRgb,
                    4 => Self::DeviceCmyk,
                    _ => Self::DeviceGray,
                });
                let profile = filters::decode_stream(stream, None).unwrap_or_default();
                Some(Self::IccBased {
                    ncomponents: alternate.ncomponents(),
                    alternate: Box::new(alternate),
                    profile,
                })
            }
            "Separation" => {
                let named = matches!(
                    resolver.resolve_deep(arr.get(1)?).as_name(),
                    Ok("All") | Ok("None")
                );
                let alternate = arr
                    .get(2)
                    .and_then(|alt| Self::try_resolve(alt, resolver, depth + 1))
                    .unwrap_or(Self::DeviceGray);
                Some(Self::Separation {
                    alternate: Box::new(alternate),
                    named,
                })
            }
            "CalGray" => Some(Self::CalGray),
            "CalRGB" | "Lab" => Some(Self::CalRgb),
            "DeviceN" => {
                // Render through the alternate space like Separation.
                let alternate = arr
                    .get(2)
                    .and_then(|alt| Self::try_resolve(alt, resolver, depth + 1))
                    .unwrap_or(Self::DeviceGray);
                Some(Self::Separation {
                    alternate: Box::new(alternate),
                    named: false,
                })
            }
            other => Self::from_name(other),
        }
    }

    /// Extract an indexed-space lookup table from a string or stream.
    fn lookup_bytes(obj: &Object, resolver: &dyn Resolver) -> Option<Vec<u8>> {
        match resolver.resolve_deep(obj) {
            Object::String(bytes) => Some(bytes),
            Object::Stream(stream) => filters::decode_stream(&stream, None).ok(),
            _ => None,
        }
    }
}

/// Resolved colour-key (chroma) mask range.
///
/// Derived once from the raw `/Mask` array and the image's colour space.
/// Boundaries are inclusive on both ends.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorKeyMask {
    /// RGB range in 0..=255 per channel.
    Rgb { min: [u8; 3], max: [u8; 3] },
    /// Palette-index range for indexed spaces.
    Index { min: u16, max: u16 },
}

impl ColorKeyMask {
    /// Build a colour-key mask from the raw `/Mask` integer array.
    ///
    /// The array holds `2 * ncomponents` sample values: min/max pairs per
    /// component in sample space. For indexed spaces the range stays in
    /// index space; otherwise the boundary tuples are pushed through the
    /// colour transform so masking can test final RGB pixels.
    pub fn resolve(ranges: &[i64], cs: &ColorSpace, bits_per_component: u32) -> Option<Self> {
        let ncomp = cs.ncomponents();
        if ranges.len() < 2 * ncomp {
            return None;
        }
        let maxval = ((1u32 << bits_per_component) - 1) as i64;
        let clamp = |v: i64| v.clamp(0, maxval);

        if let ColorSpace::Indexed { .. } = cs {
            let (a, b) = (clamp(ranges[0]) as u16, clamp(ranges[1]) as u16);
            return Some(Self::Index {
                min: a.min(b),
                max: a.max(b),
            });
        }

        let mut lo = [0f32; 4];
        let mut hi = [0f32; 4];
        for i in 0..ncomp.min(4) {
            let a = clamp(ranges[2 * i]) as f32 / maxval as f32;
            let b = clamp(ranges[2 * i + 1]) as f32 / maxval as f32;
            lo[i] = a.min(b);
            hi[i] = a.max(b);
        }
        let to_rgb = |c: &[f32; 4]| -> [u8; 3] {
            let px = crate::image::convert::components_to_argb(cs.base_space(), c);
            [(px >> 16) as u8, (px >> 8) as u8, px as u8]
        };
        let a = to_rgb(&lo);
        let b = to_rgb(&hi);
        let mut min = [0u8; 3];
        let mut max = [0u8; 3];
        for i in 0..3 {
            min[i] = a[i].min(b[i]);
            max[i] = a[i].max(b[i]);
        }
        Some(Self::Rgb { min, max })
    }

    /// Test an RGB pixel (ARGB-packed) against the range.
    pub fn masks_pixel(&self, argb: u32) -> bool {
        match self {
            Self::Rgb { min, max } => {
                let rgb = [(argb >> 16) as u8, (argb >> 8) as u8, argb as u8];
                (0..3).all(|i| rgb[i] >= min[i] && rgb[i] <= max[i])
            }
            Self::Index { .. } => false,
        }
    }

    /// Test a raw palette index against the range.
    pub fn masks_index(&self, index: u16) -> bool {
        match self {
            Self::Index { min, max } => index >= *min && index <= *max,
            Self::Rgb { .. } => false,
        }
    }
}

/// Resolve the stencil-mask stream referenced by `/Mask`, if the referenced
/// object is itself a decodable image stream.
pub fn mask_stream(obj: &Object, resolver: &dyn Resolver) -> Option<Stream> {
    match resolver.resolve_deep(obj) {
        Object::Stream(s) => {
            let is_image = s
                .get("Subtype")
                .map(|o| resolver.resolve_deep(o))
                .and_then(|o| o.as_name().map(str::to_owned).ok())
                .is_none_or(|n| n == "Image");
            is_image.then(|| *s)
        }
        _ => None,
    }
}
