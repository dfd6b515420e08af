/*!
 Contains logic and data structures used to parse and emit .NET remoting binary
 format data without instantiating any serialized type.

 ## Overview

 The remoting binary format is a record-oriented binary serialization protocol
 produced by .NET's reflection-based `BinaryFormatter`. A stream is a header
 record, any number of library/class/array/string records, and a terminal
 record. Records that can be referenced carry a signed 32-bit identifier, and
 a `MemberReference` record points back (or forward) at such an identifier, so
 the stream describes an arbitrary object graph, including shared and cyclic
 structure.

 ## Origin

 The format is specified in `[MS-NRBF]` and was historically consumed by
 `BinaryFormatter.Deserialize`, which instantiates whatever types the stream
 names and is deprecated as a remote-code-execution vector. The model in this
 module parses the same bytes into inert records instead.

 ## Features

 - Single forward pass over the stream, no seeking or rewinding
 - Identifier map for O(1) reference resolution over the record graph
 - Conservative cycle detection from the declared root record
 - Allow-listed type-name resolution, never dynamic type loading
 - Minimal writer producing well-formed streams for supported shapes
*/

pub mod io;
pub mod models;
pub mod parser;
pub mod resolver;
pub mod writer;
mod tests;
