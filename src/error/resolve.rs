/*!
 Errors that can happen when resolving records or type names from an
 already-parsed object graph. Unlike [`FormatError`](crate::error::format::FormatError),
 these are surfaced as values so callers can skip reconstruction while still
 holding the raw record graph.
*/

use std::fmt::{Display, Formatter, Result};

use crate::format::models::Id;

/// Errors that can happen when resolving records or type names from a parsed graph
#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// An identifier was referenced but never defined in the stream
    DanglingReference(Id),
    /// A class record named a library identifier with no matching library record
    UnknownLibrary(Id),
    /// The recorded type name is outside the allow-list for safe resolution
    UnsupportedType(String),
}

impl Display for ResolveError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            ResolveError::DanglingReference(id) => {
                write!(fmt, "Identifier {id} is referenced but never defined!")
            }
            ResolveError::UnknownLibrary(id) => {
                write!(fmt, "Library identifier {id} was never defined!")
            }
            ResolveError::UnsupportedType(name) => {
                write!(fmt, "Type {name} is not supported for safe resolution")
            }
        }
    }
}
