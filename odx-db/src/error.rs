//! Error taxonomy.
//!
//! Four enums, one per failure domain: loading/resolution, value
//! conversion, encode/decode, and dispatch. Lower layers never swallow a
//! failure; recovery decisions are made at the dispatch boundary only.

use thiserror::Error;

/// Load-time and resolution-time failures.
///
/// With `LoadOptions::strict` disabled, unresolved references and some
/// malformed descriptors are downgraded to warnings and the offending
/// links are kept in a `Broken` state; using such a link later yields
/// [`CodecError::UnresolvedReference`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("XML parse error: {0}")]
    Parse(#[from] odx_model::ParseError),
    #[error("PDX container error: {0}")]
    Pdx(#[from] odx_model::PdxError),
    #[error("duplicate identifier '{id}' in document fragment '{fragment}'")]
    DuplicateIdentifier { id: String, fragment: String },
    #[error("unresolved reference '{id_ref}' (expected {expected})")]
    UnresolvedReference { id_ref: String, expected: &'static str },
    #[error("short-name reference '{short_name}' cannot be resolved in scope '{scope}'")]
    ScopeViolation { short_name: String, scope: String },
    #[error("malformed diag-coded-type: {0}")]
    MalformedTypeDescriptor(String),
    #[error("missing required element: {0}")]
    MissingElement(String),
    #[error("circular parent reference involving diagnostic layer '{layer}'")]
    InheritanceCycle { layer: String },
}

/// Computation-method (internal <-> physical) conversion failures.
#[derive(Debug, Error)]
pub enum ConvError {
    #[error("physical value {value} is not invertible by this computation method")]
    NotInvertible { value: String },
    #[error("no scale of the computation method applies to value {value}")]
    NoMatchingScale { value: String },
    #[error("value {value} is outside the declared domain of the computation method")]
    OutOfDomain { value: String },
    #[error("computation method expects a {expected} value, got {actual}")]
    TypeMismatch { expected: &'static str, actual: &'static str },
}

/// Encode/decode failures of the parameter-tree codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no value supplied for required parameter '{param}'")]
    MissingRequiredValue { param: String },
    #[error("value for '{param}' is not representable: {reason}")]
    ValueOutOfRange { param: String, reason: String },
    #[error("message too short: needed {needed} bytes, only {available} available")]
    BufferUnderrun { needed: usize, available: usize },
    #[error("{unused} undecoded trailing bytes after the last parameter")]
    BufferOverrun { unused: usize },
    /// Constant parameter did not match the observed bytes. This is how a
    /// non-applicable service definition announces itself during
    /// identification; it is not a hard decode failure by itself.
    #[error("constant parameter '{param}' does not match the coded message")]
    PatternMismatch { param: String },
    #[error("no row of table '{table}' matches key {key}")]
    InvalidTableKey { table: String, key: String },
    #[error("response references its request, but no request bytes were supplied")]
    MissingMatchingRequest,
    #[error("repeated field '{field}' exceeds the configured item limit ({limit})")]
    TooManyItems { field: String, limit: usize },
    #[error("unresolved reference '{id_ref}' used during encode/decode")]
    UnresolvedReference { id_ref: String },
    #[error("short-name reference '{short_name}' not found in layer scope")]
    DanglingShortNameRef { short_name: String },
    #[error(transparent)]
    Conversion(#[from] ConvError),
}

/// Dispatch failures. Ambiguity (several matching services) is expressed
/// in the result set and is never an error.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no service of the layer matches the coded message")]
    NoMatchingService,
    #[error(transparent)]
    Codec(#[from] CodecError),
}
