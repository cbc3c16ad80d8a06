//! Strongly-typed ODX diagnostic database.
//!
//! Takes the raw document trees produced by `odx-model`, resolves every
//! reference into a flat arena graph, flattens variant inheritance into
//! effective layers, and encodes/decodes diagnostic messages against the
//! resulting service definitions.
//!
//! The main entry point is [`Database`]: load documents with
//! [`Database::from_pdx_file`] or [`Database::from_xml`], pick a layer,
//! get its [`EffectiveLayer`] and use [`Database::encode_request`],
//! [`Database::identify`] and [`Database::decode_message`].

pub mod compu;
pub mod database;
pub mod dct;
pub mod dop;
pub mod error;
pub mod handles;
pub mod inheritance;
pub mod layer;
pub mod param;
mod resolve;
pub mod service;
pub mod state;
pub mod table;
pub mod value;

pub use compu::CompuMethod;
pub use database::{CodecScope, Database, LoadOptions};
pub use dct::{DctKind, DiagCodedType, Termination};
pub use dop::{DataObjectProp, Dop, DopKind, Structure, Unit};
pub use error::{CodecError, ConvError, DispatchError, LoadError};
pub use handles::{Handle, Link};
pub use inheritance::EffectiveLayer;
pub use layer::{DiagLayer, LayerKind};
pub use param::{DopRef, ParamKind, ParamValue, Parameter, TableRef};
pub use service::{DecodedMessage, DiagService, MessageDef, MessageRole};
pub use table::{Table, TableRow};
pub use value::{DataType, IntervalType, Limit, OdxValue};
