/*!
 The encoded image raster shape: a fixed single-field class wrapping a byte
 array with the image's encoded bits. Codec internals are out of scope; the
 payload is carried as opaque bytes.
*/

use std::io::Write;

use crate::{
    format::{
        models::{
            ArraySinglePrimitive, BinaryLibrary, ClassInfo, ClassRecord, MemberTypeDescriptor,
            MemberValue, PrimitiveType, Record, SerializationHeader,
        },
        parser::BinaryFormattedObject,
        writer::BinaryFormatWriter,
    },
    shapes::{
        byte_array_member, root_class, KnownShape, ShapeExtractor, LIBRARY_ID, PAYLOAD_ID,
        ROOT_ID, SYSTEM_DRAWING_LIBRARY_NAME,
    },
};

/// Declared type name of the image raster shape
pub const BITMAP_TYPE_NAME: &str = "System.Drawing.Bitmap";
/// The single member carrying the encoded bits
pub(crate) const DATA_MEMBER_NAME: &str = "Data";

/// The encoded bytes of an image raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapPayload {
    pub data: Vec<u8>,
}

impl BitmapPayload {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Emit this payload as a minimal stream: header, library, the wrapper
    /// class referencing the payload, the byte array, terminator
    pub fn write_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        let mut writer = BinaryFormatWriter::start(sink, SerializationHeader::new(ROOT_ID))?;
        writer.write_record(&Record::Library(BinaryLibrary::new(
            LIBRARY_ID,
            SYSTEM_DRAWING_LIBRARY_NAME,
        )))?;
        writer.write_record(&Record::Class(ClassRecord {
            class_info: ClassInfo::new(
                ROOT_ID,
                BITMAP_TYPE_NAME,
                vec![DATA_MEMBER_NAME.to_string()],
            ),
            member_types: vec![MemberTypeDescriptor::PrimitiveArray(PrimitiveType::Byte)],
            library_id: LIBRARY_ID,
            member_values: vec![MemberValue::Reference(PAYLOAD_ID)],
        }))?;
        writer.write_record(&Record::PrimitiveArray(ArraySinglePrimitive::bytes(
            PAYLOAD_ID,
            self.data.clone(),
        )))?;
        writer.finish()
    }
}

/// Recognizes the image raster wrapper class
pub struct BitmapShape;

impl ShapeExtractor for BitmapShape {
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        let root = root_class(format)?;
        if root.name() != BITMAP_TYPE_NAME {
            return None;
        }
        let data = byte_array_member(format, root, DATA_MEMBER_NAME)?;
        Some(KnownShape::Bitmap(BitmapPayload::new(data.to_vec())))
    }
}
