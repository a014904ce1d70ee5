//! Decode pipeline configuration.
//!
//! One immutable struct threaded through the pipeline instead of
//! process-wide mutable settings, so tests can vary every knob.

/// Strategy used to convert CMYK samples to RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmykStrategy {
    /// Direct arithmetic approximation; always available.
    #[default]
    Arithmetic,
    /// ICC-profile transform when a profile is present (`icc` feature);
    /// silently degrades to arithmetic otherwise.
    Icc,
}

/// Configuration for the image decoding pipeline.
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Images with a longer side than this are downscaled after decoding.
    pub max_image_dimension: u32,
    /// Target for the longest side when defensive downscaling kicks in.
    pub preferred_dimension: u32,
    /// Quality mode for mask reconciliation: scale the smaller image up to
    /// the larger one. When false the mask is always shrunk to the base.
    pub scale_quality: bool,
    /// A mask with more pixels than base * this ratio is subsampled before
    /// the base is scaled up to meet it, bounding peak memory.
    pub mask_oversize_ratio: u32,
    /// Subsampling factor applied to pathologically large masks.
    pub mask_subsample_factor: u32,
    /// CMYK conversion strategy.
    pub cmyk_strategy: CmykStrategy,
    /// Permit falling back to the external fax library when the in-tree
    /// CCITT parser rejects a stream.
    pub ccitt_library_fallback: bool,
    /// Width/height ratio used to infer a missing image dimension
    /// (US-letter aspect; scanned fax streams sometimes omit one).
    pub page_ratio: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 7000,
            preferred_dimension: 2048,
            scale_quality: true,
            mask_oversize_ratio: 16,
            mask_subsample_factor: 10,
            cmyk_strategy: CmykStrategy::Arithmetic,
            ccitt_library_fallback: true,
            page_ratio: 8.5 / 11.0,
        }
    }
}
