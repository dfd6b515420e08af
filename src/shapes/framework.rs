/*!
 Primitive, string, and primitive-array wrapper shapes.

 These are the simplest streams the format can carry: a header, one value
 record, and the terminator.
*/

use std::io::Write;

use crate::{
    format::{
        models::{
            ArraySinglePrimitive, BinaryObjectString, PrimitiveValue, Record, SerializationHeader,
        },
        parser::BinaryFormattedObject,
        writer::BinaryFormatWriter,
    },
    shapes::{KnownShape, ShapeExtractor, ROOT_ID},
};

/// Write a string as a minimal stream
pub fn write_string<W: Write>(sink: &mut W, value: &str) -> std::io::Result<()> {
    let mut writer = BinaryFormatWriter::start(sink, SerializationHeader::new(ROOT_ID))?;
    writer.write_record(&Record::String(BinaryObjectString::new(ROOT_ID, value)))?;
    writer.finish()
}

/// Write a single primitive as a minimal stream
///
/// The primitive record carries no identifier, so the header's root id cannot
/// name it; it is written immediately after the header and recognized there.
pub fn write_primitive<W: Write>(sink: &mut W, value: &PrimitiveValue) -> std::io::Result<()> {
    let mut writer = BinaryFormatWriter::start(sink, SerializationHeader::new(ROOT_ID))?;
    writer.write_record(&Record::PrimitiveTyped(value.clone()))?;
    writer.finish()
}

/// Write a primitive array as a minimal stream
pub fn write_primitive_array<W: Write>(
    sink: &mut W,
    array: &ArraySinglePrimitive,
) -> std::io::Result<()> {
    let mut writer =
        BinaryFormatWriter::start(sink, SerializationHeader::new(array.object_id()))?;
    writer.write_record(&Record::PrimitiveArray(array.clone()))?;
    writer.finish()
}

/// Recognizes a lone string record as the root
pub struct StringShape;

impl ShapeExtractor for StringShape {
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        match format.root_record().ok()? {
            Record::String(string) => Some(KnownShape::String(string.value.clone())),
            _ => None,
        }
    }
}

/// Recognizes a lone typed primitive directly after the header
pub struct PrimitiveShape;

impl ShapeExtractor for PrimitiveShape {
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        match format.record_at(1)? {
            Record::PrimitiveTyped(value) => Some(KnownShape::Primitive(value.clone())),
            _ => None,
        }
    }
}

/// Recognizes a lone primitive array as the root
pub struct PrimitiveArrayShape;

impl ShapeExtractor for PrimitiveArrayShape {
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        match format.root_record().ok()? {
            Record::PrimitiveArray(array) => {
                Some(KnownShape::PrimitiveArray(array.values.clone()))
            }
            _ => None,
        }
    }
}
