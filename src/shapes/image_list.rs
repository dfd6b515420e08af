/*!
 The serialized image collection shape. Same wrapper layout as the image
 raster shape, but owned by the forms library and carrying a serialized image
 list instead of one encoded raster.
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
        bitmap::DATA_MEMBER_NAME, byte_array_member, root_class, KnownShape, ShapeExtractor,
        LIBRARY_ID, PAYLOAD_ID, ROOT_ID, WINFORMS_LIBRARY_NAME,
    },
};

/// Declared type name of the image collection shape
pub const IMAGE_LIST_TYPE_NAME: &str = "System.Windows.Forms.ImageListStreamer";

/// The serialized bytes of an image collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageListPayload {
    pub data: Vec<u8>,
}

impl ImageListPayload {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Emit this payload as a minimal stream
    pub fn write_to<W: Write>(&self, sink: &mut W) -> std::io::Result<()> {
        let mut writer = BinaryFormatWriter::start(sink, SerializationHeader::new(ROOT_ID))?;
        writer.write_record(&Record::Library(BinaryLibrary::new(
            LIBRARY_ID,
            WINFORMS_LIBRARY_NAME,
        )))?;
        writer.write_record(&Record::Class(ClassRecord {
            class_info: ClassInfo::new(
                ROOT_ID,
                IMAGE_LIST_TYPE_NAME,
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

/// Recognizes the image collection wrapper class
pub struct ImageListShape;

impl ShapeExtractor for ImageListShape {
    fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
        let root = root_class(format)?;
        if root.name() != IMAGE_LIST_TYPE_NAME {
            return None;
        }
        let data = byte_array_member(format, root, DATA_MEMBER_NAME)?;
        Some(KnownShape::ImageList(ImageListPayload::new(data.to_vec())))
    }
}
