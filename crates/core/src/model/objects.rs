//! Boundary object model.
//!
//! The document/xref machinery lives outside this crate; it hands us
//! dictionaries, parameter values and raw (already decrypted) stream bytes.
//! These types define that boundary, together with the [`Resolver`] trait
//! standing in for indirect-reference resolution.

use crate::error::{RasterError, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// Dictionary type used throughout the image pipeline.
pub type Dict = HashMap<String, Object>;

/// PDF object values as consumed by the image pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /DeviceRGB)
    Name(String),
    /// String (byte array)
    String(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(Dict),
    /// Stream (dictionary + binary data)
    Stream(Box<Stream>),
    /// Indirect object reference
    Ref(ObjRef),
}

impl Object {
    /// Check if this is a null object
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as integer
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(RasterError::TypeError {
                expected: "int",
                got: self.type_name(),
            }),
        }
    }

    /// Get as boolean
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(RasterError::TypeError {
                expected: "bool",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(RasterError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get as name string
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(RasterError::TypeError {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get as byte string
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(RasterError::TypeError {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    /// Get as array
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(RasterError::TypeError {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    /// Get as dictionary
    pub const fn as_dict(&self) -> Result<&Dict> {
        match self {
            Self::Dict(d) => Ok(d),
            _ => Err(RasterError::TypeError {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(RasterError::TypeError {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    /// Get type name for error messages
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    /// Object ID
    pub objid: u32,
    /// Generation number
    pub genno: u32,
}

impl ObjRef {
    /// Create a new object reference.
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

/// PDF stream: dictionary attributes + raw binary payload.
///
/// The payload is the post-decryption, pre-filter byte content; filter
/// chains are undone by the codec layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary attributes
    pub attrs: Dict,
    /// Raw (possibly filter-encoded) data
    rawdata: Bytes,
    /// Object ID (set when the stream is part of a document)
    pub objid: Option<u32>,
    /// Generation number
    pub genno: Option<u32>,
}

impl Stream {
    pub fn new(attrs: Dict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            objid: None,
            genno: None,
        }
    }

    /// Attach the originating object reference; used as the pool cache key.
    pub fn with_ref(mut self, objid: u32, genno: u32) -> Self {
        self.objid = Some(objid);
        self.genno = Some(genno);
        self
    }

    /// Look up a dictionary entry by name.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.attrs.get(key)
    }

    /// Raw (unfiltered) stream bytes.
    pub fn rawdata(&self) -> &[u8] {
        &self.rawdata
    }

    /// The originating reference, when known.
    pub fn obj_ref(&self) -> Option<ObjRef> {
        Some(ObjRef::new(self.objid?, self.genno?))
    }
}

/// Indirect-reference resolution, implemented by the document layer.
///
/// A miss is never fatal to the pipeline: callers substitute defaults.
pub trait Resolver: Sync {
    /// Resolve an indirect reference to its object, if known.
    fn resolve(&self, r: &ObjRef) -> Option<Object>;

    /// Follow references until a direct object is reached.
    ///
    /// Cycles are cut off after a fixed depth; a dangling reference
    /// resolves to `Object::Null`.
    fn resolve_deep(&self, obj: &Object) -> Object {
        let mut current = obj.clone();
        for _ in 0..32 {
            match current {
                Object::Ref(r) => match self.resolve(&r) {
                    Some(next) => current = next,
                    None => return Object::Null,
                },
                other => return other,
            }
        }
        Object::Null
    }
}

/// Resolver over an in-memory object table; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    objects: HashMap<ObjRef, Object>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, r: ObjRef, obj: Object) {
        self.objects.insert(r, obj);
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, r: &ObjRef) -> Option<Object> {
        self.objects.get(r).cloned()
    }
}

/// Resolver that knows nothing; every reference resolves to a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl Resolver for NullResolver {
    fn resolve(&self, _r: &ObjRef) -> Option<Object> {
        None
    }
}
