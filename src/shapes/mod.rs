/*!
 Contains logic and data structures used to recognize and rebuild the
 allow-listed record shapes, and to write minimal streams for them.

 ## Overview

 Recognition is purely structural: an extractor checks the declared type name
 of the root record and the presence and shape of the members it needs. No
 extractor ever asks the type resolver to load anything. A shape that does not
 match falls through silently to the next candidate.

 Extractors run in a fixed priority order, framework shapes before
 host-specific shapes. Embedding applications can append their own extractors
 to the registry; a custom extractor maps its recognized records onto the same
 closed [`KnownShape`] value set, so the registry stays closed against
 arbitrary-type instantiation.
*/

use crate::format::{
    models::{ClassRecord, Id, MemberValue, PrimitiveArrayValues, PrimitiveValue, Record},
    parser::BinaryFormattedObject,
};

pub mod bitmap;
pub mod framework;
pub mod image_list;
pub mod json;
mod tests;

pub use self::bitmap::{BitmapPayload, BITMAP_TYPE_NAME};
pub use self::image_list::{ImageListPayload, IMAGE_LIST_TYPE_NAME};
pub use self::json::{JsonEnvelope, JSON_DATA_OBJECT_TYPE_NAME, JSON_DATA_TYPE_NAME};

/// Assembly display name written for shapes owned by the forms library
pub const WINFORMS_LIBRARY_NAME: &str =
    "System.Windows.Forms, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089";
/// Assembly display name written for the image raster shape
pub const SYSTEM_DRAWING_LIBRARY_NAME: &str =
    "System.Drawing, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a";

/// Identifier of the root record in every stream this crate writes
pub(crate) const ROOT_ID: Id = Id::new(1);
/// Identifier of the single library record in every stream this crate writes
pub(crate) const LIBRARY_ID: Id = Id::new(2);
/// Identifier of the payload record for shapes that reference one
pub(crate) const PAYLOAD_ID: Id = Id::new(3);

/// A value rebuilt from an allow-listed record shape
#[derive(Debug, Clone, PartialEq)]
pub enum KnownShape {
    String(String),
    Primitive(PrimitiveValue),
    PrimitiveArray(PrimitiveArrayValues),
    Bitmap(BitmapPayload),
    ImageList(ImageListPayload),
    Json(JsonEnvelope),
}

/// A predicate/constructor pair for one allow-listed shape
pub trait ShapeExtractor {
    /// Rebuild the shape's value if the parsed graph matches it, structural
    /// mismatch included; never an error
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape>;
}

/// Ordered registry of shape extractors, tried first to last
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn ShapeExtractor>>,
}

impl Default for ExtractorRegistry {
    /// The built-in extractors: framework shapes first, host shapes after
    fn default() -> Self {
        Self {
            extractors: vec![
                Box::new(framework::StringShape),
                Box::new(framework::PrimitiveShape),
                Box::new(framework::PrimitiveArrayShape),
                Box::new(bitmap::BitmapShape),
                Box::new(image_list::ImageListShape),
                Box::new(json::JsonShape),
            ],
        }
    }
}

impl ExtractorRegistry {
    /// A registry with no extractors at all
    pub fn empty() -> Self {
        Self { extractors: vec![] }
    }

    /// Append an extractor; it runs after everything already registered
    pub fn register(&mut self, extractor: Box<dyn ShapeExtractor>) {
        self.extractors.push(extractor);
    }

    /// Try each extractor in order until one recognizes the graph
    ///
    /// Reconstruction is refused outright when the cycle check is positive,
    /// since a recognized shape could recurse through shared records.
    pub fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        if format.has_cycle() {
            return None;
        }
        self.extractors
            .iter()
            .find_map(|extractor| extractor.try_extract(format))
    }
}

impl BinaryFormattedObject {
    /// Try to rebuild this graph as one of the registry's known shapes
    pub fn try_get_object(&self, registry: &ExtractorRegistry) -> Option<KnownShape> {
        registry.try_extract(self)
    }
}

/// The root record as a class, if it is one
pub(crate) fn root_class(format: &BinaryFormattedObject) -> Option<&ClassRecord> {
    match format.root_record().ok()? {
        Record::Class(class) => Some(class),
        _ => None,
    }
}

/// A named byte-array member, inline or behind one reference
pub(crate) fn byte_array_member<'a>(
    format: &'a BinaryFormattedObject,
    class: &'a ClassRecord,
    name: &str,
) -> Option<&'a [u8]> {
    match class.member(name)? {
        MemberValue::PrimitiveArray(array) => array.values.as_bytes(),
        MemberValue::Reference(id) => match format.record_by_id(*id).ok()? {
            Record::PrimitiveArray(array) => array.values.as_bytes(),
            _ => None,
        },
        _ => None,
    }
}

/// A named string member, inline or behind one reference
pub(crate) fn string_member<'a>(
    format: &'a BinaryFormattedObject,
    class: &'a ClassRecord,
    name: &str,
) -> Option<&'a str> {
    match class.member(name)? {
        MemberValue::String(string) => Some(&string.value),
        MemberValue::Reference(id) => match format.record_by_id(*id).ok()? {
            Record::String(string) => Some(&string.value),
            _ => None,
        },
        _ => None,
    }
}
