//! Image pipeline: parameters, conversion, compositing, facade.

pub mod convert;
pub mod export;
pub mod facade;
pub mod mask;
pub mod params;
pub mod pixmap;

pub use facade::{ImageDecoder, ImagePool};
pub use params::{ImageParams, MaskRef};
pub use pixmap::{Pixmap, Transparency};
