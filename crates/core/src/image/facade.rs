//! Image decoding facade.
//!
//! Ties the pipeline together for one image resource: parameter
//! resolution, filter chain, codec dispatch with the raw-sample fallback,
//! mask compositing and pooled caching of the final result. Nothing in
//! here throws past the boundary: every codec failure is logged and
//! degraded, and a total failure is `None` ("nothing to paint").

use crate::codec::{self, CodecKind, filters, raw};
use crate::config::DecodeConfig;
use crate::image::convert;
use crate::image::mask;
use crate::image::params::{ImageParams, MaskRef};
use crate::image::pixmap::Pixmap;
use crate::model::objects::{ObjRef, Resolver, Stream};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Concurrent cache of composited images keyed by originating reference.
///
/// Internally synchronized; safe for concurrent decode threads. Entries
/// are reconstructible, so a miss is always safe and population races
/// resolve as last-writer-wins. Eviction is coarse: the whole pool is
/// flushed when it fills, which costs at most a re-decode.
#[derive(Debug, Default)]
pub struct ImagePool {
    map: RwLock<FxHashMap<ObjRef, Arc<Pixmap>>>,
}

const MAX_POOL_ENTRIES: usize = 256;

impl ImagePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ObjRef) -> Option<Arc<Pixmap>> {
        self.map.read().ok()?.get(key).cloned()
    }

    pub fn put(&self, key: ObjRef, image: Arc<Pixmap>) {
        if let Ok(mut map) = self.map.write() {
            if map.len() >= MAX_POOL_ENTRIES {
                debug!(entries = map.len(), "image pool flushed");
                map.clear();
            }
            map.insert(key, image);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.map.write() {
            map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Facade over the decode pipeline.
pub struct ImageDecoder {
    cfg: DecodeConfig,
    pool: ImagePool,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(DecodeConfig::default())
    }
}

impl ImageDecoder {
    pub fn new(cfg: DecodeConfig) -> Self {
        Self {
            cfg,
            pool: ImagePool::new(),
        }
    }

    pub const fn config(&self) -> &DecodeConfig {
        &self.cfg
    }

    pub const fn pool(&self) -> &ImagePool {
        &self.pool
    }

    /// Decode an image stream to its final composited form.
    ///
    /// `fill` is the graphics state's current fill colour, used when the
    /// stream is a stencil image mask. Returns `None` when nothing can be
    /// painted for this resource.
    pub fn get_image(
        &self,
        stream: &Stream,
        resolver: &dyn Resolver,
        fill: u32,
    ) -> Option<Arc<Pixmap>> {
        let params = ImageParams::from_stream(stream, resolver, &self.cfg);

        // Image masks paint with the current fill colour, which varies
        // per invocation; caching them by reference would pin one fill.
        let key = if params.is_image_mask {
            None
        } else {
            stream.obj_ref()
        };
        if let Some(key) = key
            && let Some(hit) = self.pool.get(&key)
        {
            return Some(hit);
        }

        let image = Arc::new(self.decode_composited(stream, &params, resolver, fill)?);
        if let Some(key) = key {
            self.pool.put(key, image.clone());
        }
        Some(image)
    }

    /// Steps 2-5: codec, fallback, masks, defensive downscale.
    fn decode_composited(
        &self,
        stream: &Stream,
        params: &ImageParams,
        resolver: &dyn Resolver,
        fill: u32,
    ) -> Option<Pixmap> {
        let mut base = self.decode_base(stream, params, resolver, fill)?;

        // When both an explicit mask and a soft mask resolve (the format
        // normally forbids it), the explicit mask is applied first, then
        // the soft mask.
        if let Some(MaskRef::Stencil(mask_stream)) = &params.mask
            && let Some(mask_px) = self.decode_mask(mask_stream, resolver)
        {
            base = mask::apply_explicit_mask(base, mask_px, &self.cfg);
        }
        if let Some(smask_stream) = &params.smask
            && let Some(smask_px) = self.decode_mask(smask_stream, resolver)
        {
            base = mask::apply_soft_mask(base, smask_px, &self.cfg);
        }
        if let Some(MaskRef::ColorKey(key)) = &params.mask {
            mask::apply_color_key(&mut base, key);
        }

        // Resource exhaustion guard: oversized rasters are scaled down
        // rather than kept at full size.
        let longest = base.width().max(base.height());
        if longest > self.cfg.max_image_dimension {
            let target = self.cfg.preferred_dimension.max(1);
            let w = (base.width() as u64 * target as u64 / longest as u64).max(1) as u32;
            let h = (base.height() as u64 * target as u64 / longest as u64).max(1) as u32;
            debug!(
                from_w = base.width(),
                from_h = base.height(),
                w,
                h,
                "defensive downscale"
            );
            base = base.scale_bilinear(w, h);
        }

        Some(base)
    }

    /// Steps 2-4: undo transport filters, run the selected codec, and
    /// fall back to raw sample decoding when it fails or declines.
    fn decode_base(
        &self,
        stream: &Stream,
        params: &ImageParams,
        resolver: &dyn Resolver,
        fill: u32,
    ) -> Option<Pixmap> {
        let stencil_fill = params.is_image_mask.then_some(fill);
        let kind = codec::select_codec(&params.filters);

        // The expected-size cap only applies when the payload really is
        // raw samples; an image codec's compressed payload has no fixed
        // relation to the pixel count.
        let cap = if kind == CodecKind::Raw {
            let expected = params
                .expected_len()
                .saturating_add(filters::predictor_overhead(&params.filters, params.height));
            Some(expected.min(filters::MAX_DECODED_BYTES))
        } else {
            None
        };

        let data = match filters::decode_chain(stream.rawdata(), &params.filters, cap) {
            Ok(data) => data,
            Err(err) => {
                warn!("stream filter chain failed: {err}; using raw payload");
                stream.rawdata().to_vec()
            }
        };

        match codec::run_codec(kind, &data, params, &self.cfg, resolver, stencil_fill) {
            Ok(Some(px)) => return Some(px),
            Ok(None) => debug!(?kind, "codec unavailable, trying raw fallback"),
            Err(err) => warn!(?kind, "codec failed: {err}, trying raw fallback"),
        }
        if kind == CodecKind::Raw || data.is_empty() {
            // Raw already ran, or there is nothing left to reinterpret:
            // a total failure, "nothing to paint".
            return None;
        }

        // Decoder of last resort: treat whatever bytes we have as raw
        // samples. For well-formed sample data this cannot fail.
        match raw::decode(&data, params, &self.cfg, stencil_fill) {
            Ok(px) => px,
            Err(err) => {
                warn!("raw fallback failed: {err}");
                None
            }
        }
    }

    /// Decode a mask or soft-mask stream: a full recursive pass through
    /// parameter resolution and codec dispatch, but without chasing the
    /// mask's own masks.
    fn decode_mask(&self, stream: &Stream, resolver: &dyn Resolver) -> Option<Pixmap> {
        let params = ImageParams::from_stream(stream, resolver, &self.cfg);
        self.decode_base(stream, &params, resolver, convert::OPAQUE_BLACK)
    }
}
