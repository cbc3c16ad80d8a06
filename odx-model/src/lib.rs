//! XML boundary of the ODX toolchain.
//!
//! Deserializes ODX document text (and `.pdx` archives of documents) into
//! raw attributed trees. The strongly-typed object model, reference
//! resolution and all codec logic live in the `odx-db` crate.

pub mod parse;
pub mod pdx;
pub mod raw;

pub use parse::{parse_document, ParseError};
pub use pdx::{read_pdx, read_pdx_file, PdxEntry, PdxError};
