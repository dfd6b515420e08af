/*!
 Data structures used to represent remoting binary format records.

 Every record kind the parser understands has a variant in [`Record`]; nothing
 outside this closed set is ever constructed from a stream. Multidimensional
 and jagged arrays are not implemented.
*/

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::format::FormatError;

/// .NET ticks (100ns intervals since 0001-01-01) between year 1 and the Unix epoch
const EPOCH_TICKS: i64 = 621_355_968_000_000_000;
/// Ticks per second
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Identifier for a record that can be the target of a reference
///
/// `0` is the null sentinel meaning "no identifier"; such records never enter
/// the [`RecordMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(i32);

impl Id {
    /// The "no identifier" sentinel
    pub const NULL: Id = Id(0);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// The leading tag byte selecting a record variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    SerializedStreamHeader = 0x00,
    ClassWithId = 0x01,
    SystemClassWithMembersAndTypes = 0x04,
    ClassWithMembersAndTypes = 0x05,
    BinaryObjectString = 0x06,
    MemberPrimitiveTyped = 0x08,
    MemberReference = 0x09,
    ObjectNull = 0x0A,
    MessageEnd = 0x0B,
    BinaryLibrary = 0x0C,
    ObjectNullMultiple256 = 0x0D,
    ObjectNullMultiple = 0x0E,
    ArraySinglePrimitive = 0x0F,
    ArraySingleObject = 0x10,
    ArraySingleString = 0x11,
}

impl RecordType {
    pub(crate) fn from_byte(byte: u8) -> Result<Self, FormatError> {
        match byte {
            0x00 => Ok(Self::SerializedStreamHeader),
            0x01 => Ok(Self::ClassWithId),
            0x04 => Ok(Self::SystemClassWithMembersAndTypes),
            0x05 => Ok(Self::ClassWithMembersAndTypes),
            0x06 => Ok(Self::BinaryObjectString),
            0x08 => Ok(Self::MemberPrimitiveTyped),
            0x09 => Ok(Self::MemberReference),
            0x0A => Ok(Self::ObjectNull),
            0x0B => Ok(Self::MessageEnd),
            0x0C => Ok(Self::BinaryLibrary),
            0x0D => Ok(Self::ObjectNullMultiple256),
            0x0E => Ok(Self::ObjectNullMultiple),
            0x0F => Ok(Self::ArraySinglePrimitive),
            0x10 => Ok(Self::ArraySingleObject),
            0x11 => Ok(Self::ArraySingleString),
            other => Err(FormatError::InvalidRecordType(other)),
        }
    }

    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Tag for the kind of primitive stored in a member or array slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrimitiveType {
    Boolean = 1,
    Byte = 2,
    Char = 3,
    Decimal = 5,
    Double = 6,
    Int16 = 7,
    Int32 = 8,
    Int64 = 9,
    SByte = 10,
    Single = 11,
    TimeSpan = 12,
    DateTime = 13,
    UInt16 = 14,
    UInt32 = 15,
    UInt64 = 16,
    Null = 17,
    String = 18,
}

impl PrimitiveType {
    pub(crate) fn from_byte(byte: u8) -> Result<Self, FormatError> {
        match byte {
            1 => Ok(Self::Boolean),
            2 => Ok(Self::Byte),
            3 => Ok(Self::Char),
            5 => Ok(Self::Decimal),
            6 => Ok(Self::Double),
            7 => Ok(Self::Int16),
            8 => Ok(Self::Int32),
            9 => Ok(Self::Int64),
            10 => Ok(Self::SByte),
            11 => Ok(Self::Single),
            12 => Ok(Self::TimeSpan),
            13 => Ok(Self::DateTime),
            14 => Ok(Self::UInt16),
            15 => Ok(Self::UInt32),
            16 => Ok(Self::UInt64),
            17 => Ok(Self::Null),
            18 => Ok(Self::String),
            other => Err(FormatError::InvalidPrimitiveType(other)),
        }
    }

    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// A decoded primitive value
///
/// Strings are not primitives on the wire; they are always
/// [`BinaryObjectString`] records.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    Byte(u8),
    SByte(i8),
    Char(char),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    /// Decimals travel as length-prefixed decimal strings
    Decimal(String),
    /// Tick count, 100ns intervals
    TimeSpan(i64),
    /// Raw encoded value; the top two bits carry the original kind flag
    DateTime(u64),
}

impl PrimitiveValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            PrimitiveValue::Bool(_) => PrimitiveType::Boolean,
            PrimitiveValue::Byte(_) => PrimitiveType::Byte,
            PrimitiveValue::SByte(_) => PrimitiveType::SByte,
            PrimitiveValue::Char(_) => PrimitiveType::Char,
            PrimitiveValue::Int16(_) => PrimitiveType::Int16,
            PrimitiveValue::UInt16(_) => PrimitiveType::UInt16,
            PrimitiveValue::Int32(_) => PrimitiveType::Int32,
            PrimitiveValue::UInt32(_) => PrimitiveType::UInt32,
            PrimitiveValue::Int64(_) => PrimitiveType::Int64,
            PrimitiveValue::UInt64(_) => PrimitiveType::UInt64,
            PrimitiveValue::Single(_) => PrimitiveType::Single,
            PrimitiveValue::Double(_) => PrimitiveType::Double,
            PrimitiveValue::Decimal(_) => PrimitiveType::Decimal,
            PrimitiveValue::TimeSpan(_) => PrimitiveType::TimeSpan,
            PrimitiveValue::DateTime(_) => PrimitiveType::DateTime,
        }
    }

    /// Convert a `DateTime` value to a calendar timestamp. The encoded kind
    /// flag is masked off and the tick count is interpreted as UTC.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            PrimitiveValue::DateTime(raw) => {
                let ticks = (raw & 0x3FFF_FFFF_FFFF_FFFF) as i64;
                let unix_ticks = ticks.checked_sub(EPOCH_TICKS)?;
                let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
                let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
                DateTime::from_timestamp(secs, nanos)
            }
            _ => None,
        }
    }

    /// Convert a `TimeSpan` value to a duration
    pub fn as_timespan(&self) -> Option<TimeDelta> {
        match self {
            PrimitiveValue::TimeSpan(ticks) => {
                let secs = ticks.div_euclid(TICKS_PER_SECOND);
                let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
                TimeDelta::new(secs, nanos)
            }
            _ => None,
        }
    }
}

/// First record of every stream; carries the identifier of the root object
#[derive(Debug, Clone, PartialEq)]
pub struct SerializationHeader {
    pub root_id: Id,
    pub header_id: Id,
    pub major_version: i32,
    pub minor_version: i32,
}

impl SerializationHeader {
    /// A header for a minimal stream rooted at `root_id`
    pub fn new(root_id: Id) -> Self {
        Self {
            root_id,
            header_id: Id::new(-1),
            major_version: 1,
            minor_version: 0,
        }
    }
}

/// Binds a library identifier to an assembly display name
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryLibrary {
    pub library_id: Id,
    pub library_name: String,
}

impl BinaryLibrary {
    pub fn new(library_id: Id, library_name: impl Into<String>) -> Self {
        Self {
            library_id,
            library_name: library_name.into(),
        }
    }
}

/// Identifier, type name, and member names shared by all class record variants
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub object_id: Id,
    pub name: String,
    pub member_names: Vec<String>,
}

impl ClassInfo {
    pub fn new(object_id: Id, name: impl Into<String>, member_names: Vec<String>) -> Self {
        Self {
            object_id,
            name: name.into(),
            member_names,
        }
    }
}

/// Declared type of one class member
///
/// On the wire this is a fixed small tag per member followed by the extra
/// information some tags require, folded into one variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberTypeDescriptor {
    Primitive(PrimitiveType),
    String,
    Object,
    SystemClass(String),
    Class { name: String, library_id: Id },
    ObjectArray,
    StringArray,
    PrimitiveArray(PrimitiveType),
}

impl MemberTypeDescriptor {
    /// The wire tag for this member type
    pub fn binary_type(&self) -> u8 {
        match self {
            MemberTypeDescriptor::Primitive(_) => 0,
            MemberTypeDescriptor::String => 1,
            MemberTypeDescriptor::Object => 2,
            MemberTypeDescriptor::SystemClass(_) => 3,
            MemberTypeDescriptor::Class { .. } => 4,
            MemberTypeDescriptor::ObjectArray => 5,
            MemberTypeDescriptor::StringArray => 6,
            MemberTypeDescriptor::PrimitiveArray(_) => 7,
        }
    }
}

/// A class instance: type name, member layout, and one value per member
///
/// Covers `ClassWithMembersAndTypes`, its system-library variant, and
/// `ClassWithId` (which reuses the layout of an earlier class record). A null
/// `library_id` means the format's own built-in library.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub class_info: ClassInfo,
    pub member_types: Vec<MemberTypeDescriptor>,
    pub library_id: Id,
    pub member_values: Vec<MemberValue>,
}

impl ClassRecord {
    /// Look up a member value by name
    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        let index = self
            .class_info
            .member_names
            .iter()
            .position(|member| member == name)?;
        self.member_values.get(index)
    }

    pub fn object_id(&self) -> Id {
        self.class_info.object_id
    }

    pub fn name(&self) -> &str {
        &self.class_info.name
    }
}

/// Identifier and advisory length shared by all array record variants
///
/// The declared length is trusted only up to a fixed cap when reserving
/// storage; the element count actually read is bounded by the bytes available.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInfo {
    pub object_id: Id,
    pub length: i32,
}

impl ArrayInfo {
    pub fn new(object_id: Id, length: i32) -> Self {
        Self { object_id, length }
    }
}

/// Packed values of a single-dimension primitive array
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArrayValues {
    Bool(Vec<bool>),
    Byte(Vec<u8>),
    SByte(Vec<i8>),
    Char(Vec<char>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Single(Vec<f32>),
    Double(Vec<f64>),
    Decimal(Vec<String>),
    TimeSpan(Vec<i64>),
    DateTime(Vec<u64>),
}

impl PrimitiveArrayValues {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            PrimitiveArrayValues::Bool(_) => PrimitiveType::Boolean,
            PrimitiveArrayValues::Byte(_) => PrimitiveType::Byte,
            PrimitiveArrayValues::SByte(_) => PrimitiveType::SByte,
            PrimitiveArrayValues::Char(_) => PrimitiveType::Char,
            PrimitiveArrayValues::Int16(_) => PrimitiveType::Int16,
            PrimitiveArrayValues::UInt16(_) => PrimitiveType::UInt16,
            PrimitiveArrayValues::Int32(_) => PrimitiveType::Int32,
            PrimitiveArrayValues::UInt32(_) => PrimitiveType::UInt32,
            PrimitiveArrayValues::Int64(_) => PrimitiveType::Int64,
            PrimitiveArrayValues::UInt64(_) => PrimitiveType::UInt64,
            PrimitiveArrayValues::Single(_) => PrimitiveType::Single,
            PrimitiveArrayValues::Double(_) => PrimitiveType::Double,
            PrimitiveArrayValues::Decimal(_) => PrimitiveType::Decimal,
            PrimitiveArrayValues::TimeSpan(_) => PrimitiveType::TimeSpan,
            PrimitiveArrayValues::DateTime(_) => PrimitiveType::DateTime,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimitiveArrayValues::Bool(values) => values.len(),
            PrimitiveArrayValues::Byte(values) => values.len(),
            PrimitiveArrayValues::SByte(values) => values.len(),
            PrimitiveArrayValues::Char(values) => values.len(),
            PrimitiveArrayValues::Int16(values) => values.len(),
            PrimitiveArrayValues::UInt16(values) => values.len(),
            PrimitiveArrayValues::Int32(values) => values.len(),
            PrimitiveArrayValues::UInt32(values) => values.len(),
            PrimitiveArrayValues::Int64(values) => values.len(),
            PrimitiveArrayValues::UInt64(values) => values.len(),
            PrimitiveArrayValues::Single(values) => values.len(),
            PrimitiveArrayValues::Double(values) => values.len(),
            PrimitiveArrayValues::Decimal(values) => values.len(),
            PrimitiveArrayValues::TimeSpan(values) => values.len(),
            PrimitiveArrayValues::DateTime(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw bytes, if this is a byte array
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PrimitiveArrayValues::Byte(values) => Some(values),
            _ => None,
        }
    }
}

/// A single-dimension array of raw primitives
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySinglePrimitive {
    pub array_info: ArrayInfo,
    pub values: PrimitiveArrayValues,
}

impl ArraySinglePrimitive {
    /// A byte array with the given identifier
    pub fn bytes(object_id: Id, data: Vec<u8>) -> Self {
        Self {
            array_info: ArrayInfo::new(object_id, data.len() as i32),
            values: PrimitiveArrayValues::Byte(data),
        }
    }

    pub fn object_id(&self) -> Id {
        self.array_info.object_id
    }
}

/// A single-dimension array of arbitrary values
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySingleObject {
    pub array_info: ArrayInfo,
    pub values: Vec<MemberValue>,
}

/// A single-dimension array of strings (string records, nulls, or references)
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySingleString {
    pub array_info: ArrayInfo,
    pub values: Vec<MemberValue>,
}

/// A string instance
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryObjectString {
    pub object_id: Id,
    pub value: String,
}

impl BinaryObjectString {
    pub fn new(object_id: Id, value: impl Into<String>) -> Self {
        Self {
            object_id,
            value: value.into(),
        }
    }
}

/// A pointer at another record by identifier; never resolved eagerly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberReference {
    pub id_ref: Id,
}

impl MemberReference {
    pub fn new(id_ref: Id) -> Self {
        Self { id_ref }
    }
}

/// The value stored in one class member or array element slot
#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    /// A raw primitive, present when the member's declared type is primitive
    Primitive(PrimitiveValue),
    /// An explicit null (null runs expand to one of these per slot)
    Null,
    /// A reference to the record with the given identifier
    Reference(Id),
    String(BinaryObjectString),
    Class(Box<ClassRecord>),
    PrimitiveArray(ArraySinglePrimitive),
    ObjectArray(Box<ArraySingleObject>),
    StringArray(Box<ArraySingleString>),
}

/// One record of the stream
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Header(SerializationHeader),
    Library(BinaryLibrary),
    Class(ClassRecord),
    PrimitiveArray(ArraySinglePrimitive),
    ObjectArray(ArraySingleObject),
    StringArray(ArraySingleString),
    String(BinaryObjectString),
    /// A primitive with an inline type tag, used where no member type is declared
    PrimitiveTyped(PrimitiveValue),
    /// A run of one or more nulls
    Null(usize),
    Reference(MemberReference),
    /// Terminal record; parsing stops here
    End,
}

impl Record {
    /// The identifier this record can be referenced by, or the null sentinel
    pub fn id(&self) -> Id {
        match self {
            Record::Library(library) => library.library_id,
            Record::Class(class) => class.class_info.object_id,
            Record::PrimitiveArray(array) => array.array_info.object_id,
            Record::ObjectArray(array) => array.array_info.object_id,
            Record::StringArray(array) => array.array_info.object_id,
            Record::String(string) => string.object_id,
            Record::Header(_)
            | Record::PrimitiveTyped(_)
            | Record::Null(_)
            | Record::Reference(_)
            | Record::End => Id::NULL,
        }
    }
}

/// Mapping from identifier to record, built incrementally during parsing
///
/// Keys are unique; a second definition of the same identifier is corrupt
/// input, not a replacement.
#[derive(Debug, Default)]
pub struct RecordMap {
    map: HashMap<Id, Record>,
}

impl RecordMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: Id, record: Record) -> Result<(), FormatError> {
        if self.map.contains_key(&id) {
            return Err(FormatError::DuplicateId(id));
        }
        self.map.insert(id, record);
        Ok(())
    }

    pub fn get(&self, id: Id) -> Option<&Record> {
        self.map.get(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over the library records present in the map
    pub fn libraries(&self) -> impl Iterator<Item = &BinaryLibrary> {
        self.map.values().filter_map(|record| match record {
            Record::Library(library) => Some(library),
            _ => None,
        })
    }
}
