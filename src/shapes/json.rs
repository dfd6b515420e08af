/*!
 The JSON envelope shapes: a class carrying JSON text in one string field,
 optionally alongside the fully qualified name of the originating type.

 The JSON text itself is opaque to the record model. [`JsonEnvelope::value`]
 hands it to the JSON collaborator, and only after structural recognition has
 already succeeded; a payload that is not valid JSON is surfaced there, never
 as an extraction failure.
*/

use std::io::Write;

use json::JsonValue;

use crate::{
    format::{
        models::{
            BinaryLibrary, BinaryObjectString, ClassInfo, ClassRecord, Id, MemberTypeDescriptor,
            MemberValue, Record, SerializationHeader,
        },
        parser::BinaryFormattedObject,
        writer::BinaryFormatWriter,
    },
    shapes::{
        root_class, string_member, KnownShape, ShapeExtractor, LIBRARY_ID, PAYLOAD_ID, ROOT_ID,
        WINFORMS_LIBRARY_NAME,
    },
};

/// Declared type name of the single-field JSON envelope. Written names may
/// carry generic arity suffixes, so recognition is a containment check.
pub const JSON_DATA_TYPE_NAME: &str = "System.Windows.Forms.JsonData";
/// Declared type name of the two-field JSON envelope
pub const JSON_DATA_OBJECT_TYPE_NAME: &str = "System.Windows.Forms.JsonDataObject";
/// The backing field carrying the JSON text in the single-field envelope
pub(crate) const JSON_STRING_MEMBER: &str = "<JsonString>k__BackingField";
/// The originating type name member of the two-field envelope
pub(crate) const TYPE_NAME_MEMBER: &str = "FullyQualifiedTypeName";
/// The JSON text member of the two-field envelope
pub(crate) const JSON_DATA_MEMBER: &str = "JsonData";

/// JSON text plus, optionally, the originating type's fully qualified name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonEnvelope {
    pub json_string: String,
    pub type_name: Option<String>,
}

impl JsonEnvelope {
    pub fn new(json_string: impl Into<String>) -> Self {
        Self {
            json_string: json_string.into(),
            type_name: None,
        }
    }

    pub fn with_type_name(json_string: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            json_string: json_string.into(),
            type_name: Some(type_name.into()),
        }
    }

    /// Parse the carried text through the JSON collaborator
    pub fn value(&self) -> Result<JsonValue, json::Error> {
        json::parse(&self.json_string)
    }

    /// Emit this envelope as a minimal stream; the presence of a type name
    /// selects the two-field shape
    pub fn write_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        let mut writer = BinaryFormatWriter::start(sink, SerializationHeader::new(ROOT_ID))?;
        writer.write_record(&Record::Library(BinaryLibrary::new(
            LIBRARY_ID,
            WINFORMS_LIBRARY_NAME,
        )))?;
        let class = match &self.type_name {
            Some(type_name) => ClassRecord {
                class_info: ClassInfo::new(
                    ROOT_ID,
                    JSON_DATA_OBJECT_TYPE_NAME,
                    vec![TYPE_NAME_MEMBER.to_string(), JSON_DATA_MEMBER.to_string()],
                ),
                member_types: vec![MemberTypeDescriptor::String, MemberTypeDescriptor::String],
                library_id: LIBRARY_ID,
                member_values: vec![
                    MemberValue::String(BinaryObjectString::new(PAYLOAD_ID, type_name.clone())),
                    MemberValue::String(BinaryObjectString::new(
                        Id::new(PAYLOAD_ID.value() + 1),
                        self.json_string.clone(),
                    )),
                ],
            },
            None => ClassRecord {
                class_info: ClassInfo::new(
                    ROOT_ID,
                    JSON_DATA_TYPE_NAME,
                    vec![JSON_STRING_MEMBER.to_string()],
                ),
                member_types: vec![MemberTypeDescriptor::String],
                library_id: LIBRARY_ID,
                member_values: vec![MemberValue::String(BinaryObjectString::new(
                    PAYLOAD_ID,
                    self.json_string.clone(),
                ))],
            },
        };
        writer.write_record(&Record::Class(class))?;
        writer.finish()
    }
}

/// Recognizes both JSON envelope shapes
pub struct JsonShape;

impl ShapeExtractor for JsonShape {
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        let root = root_class(format)?;
        // The two-field name contains the one-field name; check it first
        if root.name().contains(JSON_DATA_OBJECT_TYPE_NAME) {
            let type_name = string_member(format, root, TYPE_NAME_MEMBER)?;
            let json_string = string_member(format, root, JSON_DATA_MEMBER)?;
            return Some(KnownShape::Json(JsonEnvelope::with_type_name(
                json_string,
                type_name,
            )));
        }
        if root.name().contains(JSON_DATA_TYPE_NAME) {
            let json_string = string_member(format, root, JSON_STRING_MEMBER)?;
            return Some(KnownShape::Json(JsonEnvelope::new(json_string)));
        }
        None
    }
}
