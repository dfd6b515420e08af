/*!
 This module defines the errors that can happen when parsing remoting binary
 format data or resolving records from the parsed graph.
*/

pub mod format;
pub mod resolve;
