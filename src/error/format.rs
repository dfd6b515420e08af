/*!
 Errors that can happen when decoding a remoting binary format stream. Parsing
 fails fast: the first error aborts the parse and no partial object is exposed.
*/

use std::{
    array::TryFromSliceError,
    fmt::{Display, Formatter, Result},
    str::Utf8Error,
};

use crate::format::models::Id;

/// Errors that can happen when decoding a remoting binary format stream
///
/// Every variant means the stream is not a valid (or not a supported)
/// serialized payload; the variant carries the low-level cause for diagnostics.
#[derive(Debug)]
pub enum FormatError {
    OutOfBounds(usize, usize),
    SliceError(TryFromSliceError),
    StringParseError(Utf8Error),
    InvalidLengthPrefix,
    InvalidRecordType(u8),
    InvalidBinaryType(u8),
    InvalidPrimitiveType(u8),
    InvalidChar(u8),
    InvalidHeader,
    UnexpectedRecord(u8),
    LengthOutOfRange(i64),
    DuplicateId(Id),
    UnknownMetadataId(Id),
}

impl Display for FormatError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            FormatError::OutOfBounds(idx, len) => {
                write!(fmt, "Index {idx:x} is outside of stream range {len:x}!")
            }
            FormatError::SliceError(why) => {
                write!(fmt, "Unable to slice source stream: {why}")
            }
            FormatError::StringParseError(why) => write!(fmt, "Failed to parse string: {why}"),
            FormatError::InvalidLengthPrefix => {
                write!(fmt, "String length prefix is not valid!")
            }
            FormatError::InvalidRecordType(byte) => {
                write!(fmt, "Byte {byte:#04x} is not a known record type!")
            }
            FormatError::InvalidBinaryType(byte) => {
                write!(fmt, "Byte {byte:#04x} is not a known member binary type!")
            }
            FormatError::InvalidPrimitiveType(byte) => {
                write!(fmt, "Byte {byte:#04x} is not a readable primitive type!")
            }
            FormatError::InvalidChar(byte) => {
                write!(fmt, "Byte {byte:#04x} does not start a valid character!")
            }
            FormatError::InvalidHeader => write!(fmt, "Invalid serialization header!"),
            FormatError::UnexpectedRecord(byte) => {
                write!(fmt, "Record type {byte:#04x} is not allowed here!")
            }
            FormatError::LengthOutOfRange(length) => {
                write!(fmt, "Declared length {length} is out of range!")
            }
            FormatError::DuplicateId(id) => {
                write!(fmt, "Identifier {id} is defined more than once!")
            }
            FormatError::UnknownMetadataId(id) => {
                write!(fmt, "Class metadata identifier {id} was never defined!")
            }
        }
    }
}
