//! Image codecs and stream filters.
//!
//! `select_codec` inspects a stream's filter chain and names the codec
//! responsible for the payload; each codec module implements the same
//! contract: `decode(...) -> Result<Option<Pixmap>>`, where `Ok(None)`
//! means "no image can be produced here" (unsupported variant, missing
//! optional dependency) and `Err` is a codec failure the facade catches
//! and degrades from.

pub mod ccitt;
pub mod dct;
pub mod filters;
pub mod jbig2;
pub mod jpx;
pub mod raw;

use crate::config::DecodeConfig;
use crate::error::Result;
use crate::image::params::ImageParams;
use crate::image::pixmap::Pixmap;
use crate::model::objects::Resolver;
use filters::FilterEntry;

/// The codec responsible for an image stream's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// No compression: direct sample unpacking.
    Raw,
    /// CCITT Group 3/4 fax.
    CcittFax,
    /// DCT (baseline/progressive JPEG).
    Dct,
    /// JBIG2 embedded streams.
    Jbig2,
    /// JPEG2000 codestreams.
    Jpx,
}

/// Pick the codec for a filter chain. First image-format filter wins;
/// a chain of pure transport filters decodes as raw samples.
pub fn select_codec(chain: &[FilterEntry]) -> CodecKind {
    for (name, _) in chain {
        if filters::is_ccitt(name) {
            return CodecKind::CcittFax;
        } else if filters::is_dct(name) {
            return CodecKind::Dct;
        } else if filters::is_jbig2(name) {
            return CodecKind::Jbig2;
        } else if filters::is_jpx(name) {
            return CodecKind::Jpx;
        }
    }
    CodecKind::Raw
}

/// Run the selected codec over a payload whose transport filters have
/// already been undone.
pub fn run_codec(
    kind: CodecKind,
    data: &[u8],
    params: &ImageParams,
    cfg: &DecodeConfig,
    resolver: &dyn Resolver,
    stencil_fill: Option<u32>,
) -> Result<Option<Pixmap>> {
    match kind {
        CodecKind::Raw => raw::decode(data, params, cfg, stencil_fill),
        CodecKind::CcittFax => ccitt::decode(data, params, cfg, stencil_fill),
        CodecKind::Dct => dct::decode(data, params, cfg),
        CodecKind::Jbig2 => jbig2::decode(data, params, cfg, resolver, stencil_fill),
        CodecKind::Jpx => jpx::decode(data, params, cfg),
    }
}

/// MSB-first bit reader over a byte slice.
#[derive(Debug, Clone)]
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    /// Bit cursor from the start of `data`.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    pub fn read_bit(&mut self) -> Option<bool> {
        let byte = *self.data.get(self.pos / 8)?;
        let bit = (byte >> (7 - self.pos % 8)) & 1 != 0;
        self.pos += 1;
        Some(bit)
    }

    /// Read up to 16 bits as an unsigned value. Returns `None` when the
    /// data runs out.
    pub fn read_bits(&mut self, n: u32) -> Option<u32> {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.read_bit()? as u32;
        }
        Some(v)
    }

    /// Advance to the next byte boundary.
    pub fn align_byte(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
    }
}
