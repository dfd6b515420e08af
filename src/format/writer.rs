/*!
 Minimal writer for remoting binary format streams.

 The writer emits the closed record variants only; there is no path that
 serializes an arbitrary object graph. Sink failures propagate unchanged as
 [`std::io::Error`].
*/

use std::io::Write;

use crate::format::{
    io::StreamWriter,
    models::{
        ArrayInfo, ArraySingleObject, ArraySinglePrimitive, ArraySingleString, BinaryObjectString,
        ClassRecord, MemberTypeDescriptor, MemberValue, PrimitiveArrayValues, PrimitiveValue,
        Record, RecordType, SerializationHeader,
    },
};

/// Writes records to a sink, one at a time, in stream order
///
/// Callers are responsible for stream shape: a header first, the terminal
/// record last ([`BinaryFormatWriter::finish`] emits it). Records are written
/// exactly as constructed; descriptors and values must agree for the stream to
/// parse back.
#[derive(Debug)]
pub struct BinaryFormatWriter<'a, W: Write> {
    stream: StreamWriter<'a, W>,
}

impl<'a, W: Write> BinaryFormatWriter<'a, W> {
    pub fn new(sink: &'a mut W) -> Self {
        Self {
            stream: StreamWriter::new(sink),
        }
    }

    /// Start a stream: write the header record for the given root
    pub fn start(sink: &'a mut W, header: SerializationHeader) -> std::io::Result<Self> {
        let mut writer = Self::new(sink);
        writer.write_record(&Record::Header(header))?;
        Ok(writer)
    }

    /// Write the terminal record and consume the writer
    pub fn finish(mut self) -> std::io::Result<()> {
        self.write_record(&Record::End)
    }

    /// Write one record, tag byte included
    pub fn write_record(&mut self, record: &Record) -> std::io::Result<()> {
        match record {
            Record::Header(header) => {
                self.stream
                    .write_u8(RecordType::SerializedStreamHeader.byte())?;
                self.stream.write_i32(header.root_id.value())?;
                self.stream.write_i32(header.header_id.value())?;
                self.stream.write_i32(header.major_version)?;
                self.stream.write_i32(header.minor_version)
            }
            Record::Library(library) => {
                self.stream.write_u8(RecordType::BinaryLibrary.byte())?;
                self.stream.write_i32(library.library_id.value())?;
                self.stream.write_string(&library.library_name)
            }
            Record::Class(class) => self.write_class(class),
            Record::PrimitiveArray(array) => self.write_primitive_array(array),
            Record::ObjectArray(array) => self.write_object_array(array),
            Record::StringArray(array) => self.write_string_array(array),
            Record::String(string) => self.write_object_string(string),
            Record::PrimitiveTyped(value) => {
                self.stream
                    .write_u8(RecordType::MemberPrimitiveTyped.byte())?;
                self.stream.write_u8(value.primitive_type().byte())?;
                self.write_primitive(value)
            }
            Record::Null(count) => self.write_nulls(*count),
            Record::Reference(reference) => {
                self.stream.write_u8(RecordType::MemberReference.byte())?;
                self.stream.write_i32(reference.id_ref.value())
            }
            Record::End => self.stream.write_u8(RecordType::MessageEnd.byte()),
        }
    }

    fn write_class(&mut self, class: &ClassRecord) -> std::io::Result<()> {
        let record_type = if class.library_id.is_null() {
            RecordType::SystemClassWithMembersAndTypes
        } else {
            RecordType::ClassWithMembersAndTypes
        };
        self.stream.write_u8(record_type.byte())?;
        self.stream.write_i32(class.class_info.object_id.value())?;
        self.stream.write_string(&class.class_info.name)?;
        self.stream
            .write_i32(class.class_info.member_names.len() as i32)?;
        for name in &class.class_info.member_names {
            self.stream.write_string(name)?;
        }
        // All member type tags first, extra information after, in member order
        for descriptor in &class.member_types {
            self.stream.write_u8(descriptor.binary_type())?;
        }
        for descriptor in &class.member_types {
            match descriptor {
                MemberTypeDescriptor::Primitive(primitive_type)
                | MemberTypeDescriptor::PrimitiveArray(primitive_type) => {
                    self.stream.write_u8(primitive_type.byte())?;
                }
                MemberTypeDescriptor::SystemClass(name) => self.stream.write_string(name)?,
                MemberTypeDescriptor::Class { name, library_id } => {
                    self.stream.write_string(name)?;
                    self.stream.write_i32(library_id.value())?;
                }
                MemberTypeDescriptor::String
                | MemberTypeDescriptor::Object
                | MemberTypeDescriptor::ObjectArray
                | MemberTypeDescriptor::StringArray => {}
            }
        }
        if !class.library_id.is_null() {
            self.stream.write_i32(class.library_id.value())?;
        }
        self.write_values(&class.member_values)
    }

    fn write_values(&mut self, values: &[MemberValue]) -> std::io::Result<()> {
        for value in values {
            match value {
                MemberValue::Primitive(primitive) => self.write_primitive(primitive)?,
                MemberValue::Null => self.write_nulls(1)?,
                MemberValue::Reference(id) => {
                    self.stream.write_u8(RecordType::MemberReference.byte())?;
                    self.stream.write_i32(id.value())?;
                }
                MemberValue::String(string) => self.write_object_string(string)?,
                MemberValue::Class(class) => self.write_class(class)?,
                MemberValue::PrimitiveArray(array) => self.write_primitive_array(array)?,
                MemberValue::ObjectArray(array) => self.write_object_array(array)?,
                MemberValue::StringArray(array) => self.write_string_array(array)?,
            }
        }
        Ok(())
    }

    fn write_object_array(&mut self, array: &ArraySingleObject) -> std::io::Result<()> {
        self.stream.write_u8(RecordType::ArraySingleObject.byte())?;
        self.write_array_info(&array.array_info)?;
        self.write_values(&array.values)
    }

    fn write_string_array(&mut self, array: &ArraySingleString) -> std::io::Result<()> {
        self.stream.write_u8(RecordType::ArraySingleString.byte())?;
        self.write_array_info(&array.array_info)?;
        self.write_values(&array.values)
    }

    fn write_object_string(&mut self, string: &BinaryObjectString) -> std::io::Result<()> {
        self.stream.write_u8(RecordType::BinaryObjectString.byte())?;
        self.stream.write_i32(string.object_id.value())?;
        self.stream.write_string(&string.value)
    }

    fn write_array_info(&mut self, array_info: &ArrayInfo) -> std::io::Result<()> {
        self.stream.write_i32(array_info.object_id.value())?;
        self.stream.write_i32(array_info.length)
    }

    fn write_primitive_array(&mut self, array: &ArraySinglePrimitive) -> std::io::Result<()> {
        self.stream
            .write_u8(RecordType::ArraySinglePrimitive.byte())?;
        self.write_array_info(&array.array_info)?;
        self.stream
            .write_u8(array.values.primitive_type().byte())?;
        match &array.values {
            PrimitiveArrayValues::Bool(values) => {
                for value in values {
                    self.stream.write_bool(*value)?;
                }
            }
            PrimitiveArrayValues::Byte(values) => self.stream.write_bytes(values)?,
            PrimitiveArrayValues::SByte(values) => {
                for value in values {
                    self.stream.write_i8(*value)?;
                }
            }
            PrimitiveArrayValues::Char(values) => {
                for value in values {
                    self.stream.write_char(*value)?;
                }
            }
            PrimitiveArrayValues::Int16(values) => {
                for value in values {
                    self.stream.write_i16(*value)?;
                }
            }
            PrimitiveArrayValues::UInt16(values) => {
                for value in values {
                    self.stream.write_u16(*value)?;
                }
            }
            PrimitiveArrayValues::Int32(values) => {
                for value in values {
                    self.stream.write_i32(*value)?;
                }
            }
            PrimitiveArrayValues::UInt32(values) => {
                for value in values {
                    self.stream.write_u32(*value)?;
                }
            }
            PrimitiveArrayValues::Int64(values) => {
                for value in values {
                    self.stream.write_i64(*value)?;
                }
            }
            PrimitiveArrayValues::UInt64(values) => {
                for value in values {
                    self.stream.write_u64(*value)?;
                }
            }
            PrimitiveArrayValues::Single(values) => {
                for value in values {
                    self.stream.write_f32(*value)?;
                }
            }
            PrimitiveArrayValues::Double(values) => {
                for value in values {
                    self.stream.write_f64(*value)?;
                }
            }
            PrimitiveArrayValues::Decimal(values) => {
                for value in values {
                    self.stream.write_string(value)?;
                }
            }
            PrimitiveArrayValues::TimeSpan(values) => {
                for value in values {
                    self.stream.write_i64(*value)?;
                }
            }
            PrimitiveArrayValues::DateTime(values) => {
                for value in values {
                    self.stream.write_u64(*value)?;
                }
            }
        }
        Ok(())
    }

    fn write_primitive(&mut self, value: &PrimitiveValue) -> std::io::Result<()> {
        match value {
            PrimitiveValue::Bool(value) => self.stream.write_bool(*value),
            PrimitiveValue::Byte(value) => self.stream.write_u8(*value),
            PrimitiveValue::SByte(value) => self.stream.write_i8(*value),
            PrimitiveValue::Char(value) => self.stream.write_char(*value),
            PrimitiveValue::Int16(value) => self.stream.write_i16(*value),
            PrimitiveValue::UInt16(value) => self.stream.write_u16(*value),
            PrimitiveValue::Int32(value) => self.stream.write_i32(*value),
            PrimitiveValue::UInt32(value) => self.stream.write_u32(*value),
            PrimitiveValue::Int64(value) => self.stream.write_i64(*value),
            PrimitiveValue::UInt64(value) => self.stream.write_u64(*value),
            PrimitiveValue::Single(value) => self.stream.write_f32(*value),
            PrimitiveValue::Double(value) => self.stream.write_f64(*value),
            PrimitiveValue::Decimal(value) => self.stream.write_string(value),
            PrimitiveValue::TimeSpan(value) => self.stream.write_i64(*value),
            PrimitiveValue::DateTime(value) => self.stream.write_u64(*value),
        }
    }

    fn write_nulls(&mut self, count: usize) -> std::io::Result<()> {
        if count == 1 {
            self.stream.write_u8(RecordType::ObjectNull.byte())
        } else if count <= u8::MAX as usize {
            self.stream
                .write_u8(RecordType::ObjectNullMultiple256.byte())?;
            self.stream.write_u8(count as u8)
        } else {
            self.stream.write_u8(RecordType::ObjectNullMultiple.byte())?;
            self.stream.write_i32(count as i32)
        }
    }
}
