//! sucre - PDF image decoding and compositing.
//!
//! Decodes the embedded images of PDF documents into ARGB pixel buffers:
//! codec selection over the stream's filter chain (raw, DCT/JPEG, CCITT
//! fax, JBIG2, JPEG2000), colour-space conversion, and transparency via
//! stencil masks, soft masks and colour-key masks. The document object
//! model and decryption are external collaborators reached through the
//! [`model::Resolver`] boundary trait.

pub mod codec;
pub mod config;
pub mod error;
pub mod exec;
pub mod image;
pub mod model;

pub use config::{CmykStrategy, DecodeConfig};
pub use error::{RasterError, Result};
pub use exec::DecodePool;
pub use image::{ImageDecoder, ImagePool, Pixmap, Transparency};
