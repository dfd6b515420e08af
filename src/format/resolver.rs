/*!
 Allow-listed resolution of recorded type names.

 The legacy deserializer loads whatever type a stream names; this resolver
 refuses that entirely. A recorded name either maps onto a fixed, statically
 known descriptor or resolution fails with a typed "not supported" outcome the
 caller can ignore while still holding the raw record graph.
*/

use std::collections::HashMap;

use crate::{
    error::resolve::ResolveError,
    format::models::{Id, PrimitiveType, RecordMap},
    shapes::{BITMAP_TYPE_NAME, IMAGE_LIST_TYPE_NAME, JSON_DATA_OBJECT_TYPE_NAME, JSON_DATA_TYPE_NAME},
};

/// A type descriptor usable only for reconstruction of allow-listed shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Primitive(PrimitiveType),
    String,
    /// An encoded image raster payload
    Bitmap,
    /// A serialized image collection payload
    ImageList,
    /// A JSON envelope with a single payload string
    JsonData,
    /// A JSON envelope carrying the payload and the originating type name
    JsonDataObject,
}

/// Maps recorded type names plus a library identifier onto the allow-list
///
/// Seeded with the library records already present in the parsed map; never
/// performs dynamic type loading of any kind.
#[derive(Debug)]
pub struct TypeResolver {
    libraries: HashMap<Id, String>,
}

impl TypeResolver {
    pub(crate) fn new(map: &RecordMap) -> Self {
        Self {
            libraries: map
                .libraries()
                .map(|library| (library.library_id, library.library_name.clone()))
                .collect(),
        }
    }

    /// The display name a library identifier was bound to, if any
    pub fn library_name(&self, library_id: Id) -> Option<&str> {
        self.libraries.get(&library_id).map(String::as_str)
    }

    /// Resolve a type name against a library. The null identifier stands for
    /// the format's own built-in library and is always known.
    pub fn resolve(&self, name: &str, library_id: Id) -> Result<ResolvedType, ResolveError> {
        if !library_id.is_null() && !self.libraries.contains_key(&library_id) {
            return Err(ResolveError::UnknownLibrary(library_id));
        }

        if let Some(primitive) = primitive_wrapper(name) {
            return Ok(ResolvedType::Primitive(primitive));
        }
        if name == "System.String" {
            return Ok(ResolvedType::String);
        }
        if name == BITMAP_TYPE_NAME {
            return Ok(ResolvedType::Bitmap);
        }
        if name == IMAGE_LIST_TYPE_NAME {
            return Ok(ResolvedType::ImageList);
        }
        // JSON envelopes may carry generic arity suffixes, so the check is a
        // containment test; the two-field variant's name contains the
        // one-field variant's name and must win
        if name.contains(JSON_DATA_OBJECT_TYPE_NAME) {
            return Ok(ResolvedType::JsonDataObject);
        }
        if name.contains(JSON_DATA_TYPE_NAME) {
            return Ok(ResolvedType::JsonData);
        }

        Err(ResolveError::UnsupportedType(name.to_string()))
    }
}

fn primitive_wrapper(name: &str) -> Option<PrimitiveType> {
    Some(match name {
        "System.Boolean" => PrimitiveType::Boolean,
        "System.Byte" => PrimitiveType::Byte,
        "System.SByte" => PrimitiveType::SByte,
        "System.Char" => PrimitiveType::Char,
        "System.Int16" => PrimitiveType::Int16,
        "System.UInt16" => PrimitiveType::UInt16,
        "System.Int32" => PrimitiveType::Int32,
        "System.UInt32" => PrimitiveType::UInt32,
        "System.Int64" => PrimitiveType::Int64,
        "System.UInt64" => PrimitiveType::UInt64,
        "System.Single" => PrimitiveType::Single,
        "System.Double" => PrimitiveType::Double,
        "System.Decimal" => PrimitiveType::Decimal,
        "System.TimeSpan" => PrimitiveType::TimeSpan,
        "System.DateTime" => PrimitiveType::DateTime,
        _ => return None,
    })
}
