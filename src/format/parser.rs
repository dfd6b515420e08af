/*!
 Contains logic to parse a remoting binary format stream into an inert record
 graph.

 The parser reads one record at a time until the terminal record, keeping an
 ordered record list and an identifier map. References between records stay
 symbolic; nothing is resolved eagerly and no serialized type is ever
 instantiated.
*/

use std::collections::HashSet;

use once_cell::sync::OnceCell;

use crate::{
    error::{format::FormatError, resolve::ResolveError},
    format::{
        io::StreamReader,
        models::{
            ArrayInfo, ArraySingleObject, ArraySinglePrimitive, ArraySingleString, BinaryLibrary,
            BinaryObjectString, ClassInfo, ClassRecord, Id, MemberReference, MemberTypeDescriptor,
            MemberValue, PrimitiveArrayValues, PrimitiveType, PrimitiveValue, Record, RecordMap,
            RecordType, SerializationHeader,
        },
        resolver::{ResolvedType, TypeResolver},
    },
};

/// Declared lengths are advisory: never reserve storage for more entries than
/// this, so corrupted or adversarial length fields cannot exhaust memory.
pub const MAX_NEW_COLLECTION_SIZE: usize = 1024 * 10;

fn capped_capacity(length: usize) -> usize {
    length.min(MAX_NEW_COLLECTION_SIZE)
}

/// The result of reading one member or array element slot
enum ValueRead {
    Value(MemberValue),
    Nulls(usize),
}

/// Contains logic and data used to read records from a stream
#[derive(Debug)]
struct RecordReader<'a> {
    stream: StreamReader<'a>,
    map: RecordMap,
}

impl<'a> RecordReader<'a> {
    fn new(stream: &'a [u8]) -> Self {
        Self {
            stream: StreamReader::new(stream),
            map: RecordMap::new(),
        }
    }

    /// Read one record, dispatching on the leading tag byte. Identified
    /// records (including nested ones) are also inserted into the map.
    fn read_record(&mut self) -> Result<Record, FormatError> {
        let tag = self.stream.read_u8()?;
        let record = match RecordType::from_byte(tag)? {
            RecordType::SerializedStreamHeader => Record::Header(self.read_header()?),
            RecordType::ClassWithId => Record::Class(self.read_class_with_id()?),
            RecordType::SystemClassWithMembersAndTypes => Record::Class(self.read_class(true)?),
            RecordType::ClassWithMembersAndTypes => Record::Class(self.read_class(false)?),
            RecordType::BinaryObjectString => Record::String(self.read_object_string()?),
            RecordType::MemberPrimitiveTyped => {
                let primitive_type = PrimitiveType::from_byte(self.stream.read_u8()?)?;
                Record::PrimitiveTyped(self.read_primitive(primitive_type)?)
            }
            RecordType::MemberReference => {
                Record::Reference(MemberReference::new(Id::new(self.stream.read_i32()?)))
            }
            RecordType::ObjectNull => Record::Null(1),
            RecordType::MessageEnd => Record::End,
            RecordType::BinaryLibrary => Record::Library(self.read_library()?),
            RecordType::ObjectNullMultiple256 => {
                let count = self.stream.read_u8()?;
                if count == 0 {
                    return Err(FormatError::LengthOutOfRange(0));
                }
                Record::Null(count as usize)
            }
            RecordType::ObjectNullMultiple => {
                let count = self.stream.read_i32()?;
                if count <= 0 {
                    return Err(FormatError::LengthOutOfRange(count as i64));
                }
                Record::Null(count as usize)
            }
            RecordType::ArraySinglePrimitive => {
                Record::PrimitiveArray(self.read_primitive_array()?)
            }
            RecordType::ArraySingleObject => {
                let array_info = self.read_array_info()?;
                let values = self.read_value_list(array_info.length as usize)?;
                Record::ObjectArray(ArraySingleObject { array_info, values })
            }
            RecordType::ArraySingleString => {
                let array_info = self.read_array_info()?;
                let values = self.read_value_list(array_info.length as usize)?;
                Record::StringArray(ArraySingleString { array_info, values })
            }
        };

        let id = record.id();
        if !id.is_null() {
            self.map.insert(id, record.clone())?;
        }
        Ok(record)
    }

    fn read_header(&mut self) -> Result<SerializationHeader, FormatError> {
        let header = SerializationHeader {
            root_id: Id::new(self.stream.read_i32()?),
            header_id: Id::new(self.stream.read_i32()?),
            major_version: self.stream.read_i32()?,
            minor_version: self.stream.read_i32()?,
        };
        if header.major_version != 1 || header.minor_version != 0 {
            return Err(FormatError::InvalidHeader);
        }
        Ok(header)
    }

    fn read_library(&mut self) -> Result<BinaryLibrary, FormatError> {
        Ok(BinaryLibrary {
            library_id: Id::new(self.stream.read_i32()?),
            library_name: self.stream.read_string()?,
        })
    }

    fn read_object_string(&mut self) -> Result<BinaryObjectString, FormatError> {
        Ok(BinaryObjectString {
            object_id: Id::new(self.stream.read_i32()?),
            value: self.stream.read_string()?,
        })
    }

    fn read_class_info(&mut self) -> Result<ClassInfo, FormatError> {
        let object_id = Id::new(self.stream.read_i32()?);
        let name = self.stream.read_string()?;
        let member_count = self.stream.read_i32()?;
        if member_count < 0 {
            return Err(FormatError::LengthOutOfRange(member_count as i64));
        }
        let member_count = member_count as usize;
        let mut member_names = Vec::with_capacity(capped_capacity(member_count));
        for _ in 0..member_count {
            member_names.push(self.stream.read_string()?);
        }
        Ok(ClassInfo {
            object_id,
            name,
            member_names,
        })
    }

    /// Read the per-member type tags, then the extra information some of the
    /// tags require, in member order
    fn read_member_type_info(
        &mut self,
        member_count: usize,
    ) -> Result<Vec<MemberTypeDescriptor>, FormatError> {
        let binary_types = self.stream.read_byte_array(member_count)?;
        let mut descriptors = Vec::with_capacity(capped_capacity(member_count));
        for binary_type in binary_types {
            descriptors.push(match binary_type {
                0 => MemberTypeDescriptor::Primitive(PrimitiveType::from_byte(
                    self.stream.read_u8()?,
                )?),
                1 => MemberTypeDescriptor::String,
                2 => MemberTypeDescriptor::Object,
                3 => MemberTypeDescriptor::SystemClass(self.stream.read_string()?),
                4 => MemberTypeDescriptor::Class {
                    name: self.stream.read_string()?,
                    library_id: Id::new(self.stream.read_i32()?),
                },
                5 => MemberTypeDescriptor::ObjectArray,
                6 => MemberTypeDescriptor::StringArray,
                7 => MemberTypeDescriptor::PrimitiveArray(PrimitiveType::from_byte(
                    self.stream.read_u8()?,
                )?),
                other => return Err(FormatError::InvalidBinaryType(other)),
            });
        }
        Ok(descriptors)
    }

    fn read_class(&mut self, system: bool) -> Result<ClassRecord, FormatError> {
        let class_info = self.read_class_info()?;
        let member_types = self.read_member_type_info(class_info.member_names.len())?;
        let library_id = if system {
            Id::NULL
        } else {
            Id::new(self.stream.read_i32()?)
        };
        let member_values = self.read_members(&member_types)?;
        Ok(ClassRecord {
            class_info,
            member_types,
            library_id,
            member_values,
        })
    }

    /// A `ClassWithId` record reuses the name and member layout of an earlier
    /// class record; only the object identifier and values are its own
    fn read_class_with_id(&mut self) -> Result<ClassRecord, FormatError> {
        let object_id = Id::new(self.stream.read_i32()?);
        let metadata_id = Id::new(self.stream.read_i32()?);
        let metadata = match self.map.get(metadata_id) {
            Some(Record::Class(class)) => class.clone(),
            _ => return Err(FormatError::UnknownMetadataId(metadata_id)),
        };
        let member_values = self.read_members(&metadata.member_types)?;
        Ok(ClassRecord {
            class_info: ClassInfo {
                object_id,
                name: metadata.class_info.name,
                member_names: metadata.class_info.member_names,
            },
            member_types: metadata.member_types,
            library_id: metadata.library_id,
            member_values,
        })
    }

    fn read_array_info(&mut self) -> Result<ArrayInfo, FormatError> {
        let object_id = Id::new(self.stream.read_i32()?);
        let length = self.stream.read_i32()?;
        if length < 0 {
            return Err(FormatError::LengthOutOfRange(length as i64));
        }
        Ok(ArrayInfo { object_id, length })
    }

    fn read_primitive_array(&mut self) -> Result<ArraySinglePrimitive, FormatError> {
        let array_info = self.read_array_info()?;
        let primitive_type = PrimitiveType::from_byte(self.stream.read_u8()?)?;
        let length = array_info.length as usize;
        let values = self.read_primitive_values(primitive_type, length)?;
        Ok(ArraySinglePrimitive { array_info, values })
    }

    fn read_primitive_values(
        &mut self,
        primitive_type: PrimitiveType,
        length: usize,
    ) -> Result<PrimitiveArrayValues, FormatError> {
        macro_rules! read_into {
            ($variant:ident, $read:ident) => {{
                let mut values = Vec::with_capacity(capped_capacity(length));
                for _ in 0..length {
                    values.push(self.stream.$read()?);
                }
                PrimitiveArrayValues::$variant(values)
            }};
        }

        Ok(match primitive_type {
            PrimitiveType::Boolean => read_into!(Bool, read_bool),
            // Byte arrays are the common case; the slice bounds check keeps
            // the allocation no larger than the bytes actually present
            PrimitiveType::Byte => PrimitiveArrayValues::Byte(self.stream.read_byte_array(length)?),
            PrimitiveType::SByte => read_into!(SByte, read_i8),
            PrimitiveType::Char => read_into!(Char, read_char),
            PrimitiveType::Int16 => read_into!(Int16, read_i16),
            PrimitiveType::UInt16 => read_into!(UInt16, read_u16),
            PrimitiveType::Int32 => read_into!(Int32, read_i32),
            PrimitiveType::UInt32 => read_into!(UInt32, read_u32),
            PrimitiveType::Int64 => read_into!(Int64, read_i64),
            PrimitiveType::UInt64 => read_into!(UInt64, read_u64),
            PrimitiveType::Single => read_into!(Single, read_f32),
            PrimitiveType::Double => read_into!(Double, read_f64),
            PrimitiveType::Decimal => read_into!(Decimal, read_string),
            PrimitiveType::TimeSpan => read_into!(TimeSpan, read_i64),
            PrimitiveType::DateTime => read_into!(DateTime, read_u64),
            PrimitiveType::Null | PrimitiveType::String => {
                return Err(FormatError::InvalidPrimitiveType(primitive_type.byte()))
            }
        })
    }

    /// Read one raw primitive of the given type
    fn read_primitive(
        &mut self,
        primitive_type: PrimitiveType,
    ) -> Result<PrimitiveValue, FormatError> {
        Ok(match primitive_type {
            PrimitiveType::Boolean => PrimitiveValue::Bool(self.stream.read_bool()?),
            PrimitiveType::Byte => PrimitiveValue::Byte(self.stream.read_u8()?),
            PrimitiveType::SByte => PrimitiveValue::SByte(self.stream.read_i8()?),
            PrimitiveType::Char => PrimitiveValue::Char(self.stream.read_char()?),
            PrimitiveType::Int16 => PrimitiveValue::Int16(self.stream.read_i16()?),
            PrimitiveType::UInt16 => PrimitiveValue::UInt16(self.stream.read_u16()?),
            PrimitiveType::Int32 => PrimitiveValue::Int32(self.stream.read_i32()?),
            PrimitiveType::UInt32 => PrimitiveValue::UInt32(self.stream.read_u32()?),
            PrimitiveType::Int64 => PrimitiveValue::Int64(self.stream.read_i64()?),
            PrimitiveType::UInt64 => PrimitiveValue::UInt64(self.stream.read_u64()?),
            PrimitiveType::Single => PrimitiveValue::Single(self.stream.read_f32()?),
            PrimitiveType::Double => PrimitiveValue::Double(self.stream.read_f64()?),
            PrimitiveType::Decimal => PrimitiveValue::Decimal(self.stream.read_string()?),
            PrimitiveType::TimeSpan => PrimitiveValue::TimeSpan(self.stream.read_i64()?),
            PrimitiveType::DateTime => PrimitiveValue::DateTime(self.stream.read_u64()?),
            PrimitiveType::Null | PrimitiveType::String => {
                return Err(FormatError::InvalidPrimitiveType(primitive_type.byte()))
            }
        })
    }

    /// Read one member or element value slot. Library records may interleave
    /// with values; they register in the map and the value follows.
    fn read_value(&mut self) -> Result<ValueRead, FormatError> {
        loop {
            let record = self.read_record()?;
            return Ok(match record {
                Record::Library(_) => continue,
                Record::String(string) => ValueRead::Value(MemberValue::String(string)),
                Record::Class(class) => ValueRead::Value(MemberValue::Class(Box::new(class))),
                Record::PrimitiveArray(array) => {
                    ValueRead::Value(MemberValue::PrimitiveArray(array))
                }
                Record::ObjectArray(array) => {
                    ValueRead::Value(MemberValue::ObjectArray(Box::new(array)))
                }
                Record::StringArray(array) => {
                    ValueRead::Value(MemberValue::StringArray(Box::new(array)))
                }
                Record::Reference(reference) => {
                    ValueRead::Value(MemberValue::Reference(reference.id_ref))
                }
                Record::PrimitiveTyped(value) => ValueRead::Value(MemberValue::Primitive(value)),
                Record::Null(count) => ValueRead::Nulls(count),
                Record::Header(_) => {
                    return Err(FormatError::UnexpectedRecord(
                        RecordType::SerializedStreamHeader.byte(),
                    ))
                }
                Record::End => {
                    return Err(FormatError::UnexpectedRecord(RecordType::MessageEnd.byte()))
                }
            });
        }
    }

    /// Read one value per member descriptor. Primitive members are raw values
    /// with no record tag; everything else is a nested record. A null run
    /// covers that many consecutive non-primitive slots.
    fn read_members(
        &mut self,
        member_types: &[MemberTypeDescriptor],
    ) -> Result<Vec<MemberValue>, FormatError> {
        let mut values = Vec::with_capacity(capped_capacity(member_types.len()));
        let mut pending_nulls = 0usize;
        for descriptor in member_types {
            if pending_nulls > 0 {
                pending_nulls -= 1;
                values.push(MemberValue::Null);
                continue;
            }
            match descriptor {
                MemberTypeDescriptor::Primitive(primitive_type) => {
                    values.push(MemberValue::Primitive(self.read_primitive(*primitive_type)?));
                }
                _ => match self.read_value()? {
                    ValueRead::Value(value) => values.push(value),
                    ValueRead::Nulls(count) => {
                        values.push(MemberValue::Null);
                        pending_nulls = count - 1;
                    }
                },
            }
        }
        if pending_nulls > 0 {
            return Err(FormatError::LengthOutOfRange(pending_nulls as i64));
        }
        Ok(values)
    }

    /// Read exactly `length` element values, expanding null runs
    fn read_value_list(&mut self, length: usize) -> Result<Vec<MemberValue>, FormatError> {
        let mut values = Vec::with_capacity(capped_capacity(length));
        while values.len() < length {
            match self.read_value()? {
                ValueRead::Value(value) => values.push(value),
                ValueRead::Nulls(count) => {
                    if count > length - values.len() {
                        return Err(FormatError::LengthOutOfRange(count as i64));
                    }
                    for _ in 0..count {
                        values.push(MemberValue::Null);
                    }
                }
            }
        }
        Ok(values)
    }
}

/// Object model for a parsed remoting binary format stream
///
/// Built once, synchronously, from a forward-only byte source; immutable
/// afterward and safe for concurrent read-only use. Parsing never
/// instantiates a serialized type: only primitive values, strings, and the
/// closed record variants are created.
#[derive(Debug)]
pub struct BinaryFormattedObject {
    records: Vec<Record>,
    record_map: RecordMap,
    root_id: Id,
    consumed: usize,
    resolver: OnceCell<TypeResolver>,
    cycle_detected: OnceCell<bool>,
}

impl BinaryFormattedObject {
    /// Parse a stream into a record graph
    ///
    /// The stream must start with a serialization header and terminate with
    /// the end record; bytes past the terminal record are left untouched and
    /// [`BinaryFormattedObject::bytes_consumed`] reports where they begin.
    /// Parsing fails fast: the first malformed record aborts the parse.
    pub fn parse(stream: &[u8]) -> Result<Self, FormatError> {
        let mut reader = RecordReader::new(stream);
        let mut records = Vec::new();
        loop {
            let record = reader.read_record()?;
            let end = matches!(record, Record::End);
            records.push(record);
            if end {
                break;
            }
        }

        let root_id = match records.first() {
            Some(Record::Header(header)) => header.root_id,
            _ => return Err(FormatError::InvalidHeader),
        };

        Ok(Self {
            records,
            record_map: reader.map,
            root_id,
            consumed: reader.stream.position(),
            resolver: OnceCell::new(),
            cycle_detected: OnceCell::new(),
        })
    }

    /// Total count of top-level records, terminal record included
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Get a top-level record by its position in the stream
    pub fn record_at(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Get a record by its identifier. Not all records have identifiers, only
    /// ones that can be referenced by other records.
    pub fn record_by_id(&self, id: Id) -> Result<&Record, ResolveError> {
        self.record_map
            .get(id)
            .ok_or(ResolveError::DanglingReference(id))
    }

    /// The identifier of the logically top-level object
    pub fn root_id(&self) -> Id {
        self.root_id
    }

    /// The record the header declares as the root of the graph
    pub fn root_record(&self) -> Result<&Record, ResolveError> {
        self.record_by_id(self.root_id)
    }

    /// Number of bytes consumed from the input, terminal record included
    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    /// Resolve a recorded type name against the given library to an
    /// allow-listed type descriptor. A null library identifier means the
    /// format's own built-in library.
    ///
    /// The resolver is built on first use from the library records already in
    /// the map, then memoized for the lifetime of this object.
    pub fn resolve_type(&self, name: &str, library_id: Id) -> Result<ResolvedType, ResolveError> {
        self.resolver
            .get_or_init(|| TypeResolver::new(&self.record_map))
            .resolve(name, library_id)
    }

    /// Whether the graph reachable from the root revisits any identifier
    ///
    /// This is a conservative signal: any second visit of an identifier along
    /// the traversal counts, so a diamond (two members sharing one non-cyclic
    /// leaf) is flagged exactly like a true back-edge. A positive result means
    /// "unsafe to reconstruct eagerly", not "certainly cyclic". Computed once
    /// and memoized.
    pub fn has_cycle(&self) -> bool {
        *self.cycle_detected.get_or_init(|| self.detect_cycle())
    }

    fn detect_cycle(&self) -> bool {
        let mut visited: HashSet<Id> = HashSet::new();
        let mut unvisited: Vec<Id> = vec![self.root_id];

        while let Some(current) = unvisited.pop() {
            if !visited.insert(current) {
                return true;
            }
            match self.record_map.get(current) {
                Some(Record::Class(class)) => {
                    pend_referenced_members(&class.member_values, &mut unvisited);
                }
                Some(Record::ObjectArray(array)) => {
                    pend_referenced_members(&array.values, &mut unvisited);
                }
                Some(Record::StringArray(array)) => {
                    pend_referenced_members(&array.values, &mut unvisited);
                }
                // Unresolvable ids surface as dangling-reference errors at
                // reconstruction; the cycle signal stays a plain boolean
                _ => {}
            }
        }
        false
    }
}

/// Push the identifiers of every class, object-array, and reference member
fn pend_referenced_members(members: &[MemberValue], unvisited: &mut Vec<Id>) {
    for member in members {
        match member {
            MemberValue::Class(class) => unvisited.push(class.class_info.object_id),
            MemberValue::ObjectArray(array) => unvisited.push(array.array_info.object_id),
            MemberValue::StringArray(array) => unvisited.push(array.array_info.object_id),
            MemberValue::Reference(id) => unvisited.push(*id),
            _ => {}
        }
    }
}
