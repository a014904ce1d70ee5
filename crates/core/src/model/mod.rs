//! Boundary data model: PDF objects and colour spaces.

pub mod colorspace;
pub mod objects;

pub use colorspace::{ColorKeyMask, ColorSpace};
pub use objects::{Dict, MemoryResolver, NullResolver, ObjRef, Object, Resolver, Stream};
