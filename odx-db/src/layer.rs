//! Diagnostic layers and their raw (pre-inheritance) content.

use crate::dop::{Dop, Unit};
use crate::handles::{Handle, Link};
use crate::service::{DiagService, MessageDef};
use crate::table::Table;

/// DIAG-LAYER variants, ordered by inheritance precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    EcuSharedData,
    Protocol,
    FunctionalGroup,
    BaseVariant,
    EcuVariant,
}

impl LayerKind {
    pub fn odx_name(self) -> &'static str {
        match self {
            Self::EcuSharedData => "ECU-SHARED-DATA",
            Self::Protocol => "PROTOCOL",
            Self::FunctionalGroup => "FUNCTIONAL-GROUP",
            Self::BaseVariant => "BASE-VARIANT",
            Self::EcuVariant => "ECU-VARIANT",
        }
    }

    /// Inheritance precedence; a higher value overrides a lower one when
    /// two ancestors contribute the same short name.
    pub fn inheritance_priority(self) -> u8 {
        match self {
            Self::EcuSharedData => 0,
            Self::Protocol => 1,
            Self::FunctionalGroup => 2,
            Self::BaseVariant => 3,
            Self::EcuVariant => 4,
        }
    }
}

/// PARENT-REF with the short names this layer refuses to inherit.
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub parent: Link<DiagLayer>,
    pub not_inherited_diag_comms: Vec<String>,
    pub not_inherited_dops: Vec<String>,
    pub not_inherited_tables: Vec<String>,
}

/// Communication parameter declared by a COMPARAM-SUBSET.
#[derive(Debug, Clone)]
pub struct Comparam {
    pub id: String,
    pub short_name: String,
    pub physical_default_value: Option<String>,
}

/// COMPARAM-REF on a layer, optionally overriding the default value.
#[derive(Debug, Clone)]
pub struct ComparamRef {
    pub comparam: Link<Comparam>,
    pub value: Option<String>,
}

/// One diagnostic layer as declared, before inheritance flattening.
#[derive(Debug, Clone)]
pub struct DiagLayer {
    pub id: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub kind: LayerKind,
    /// Document fragment this layer was declared in.
    pub fragment: String,
    pub services: Vec<Handle<DiagService>>,
    /// Services pulled in by DIAG-COMM-REF.
    pub service_refs: Vec<Link<DiagService>>,
    pub messages: Vec<Handle<MessageDef>>,
    pub dops: Vec<Handle<Dop>>,
    pub tables: Vec<Handle<Table>>,
    pub units: Vec<Handle<Unit>>,
    pub parent_refs: Vec<ParentRef>,
    pub comparam_refs: Vec<ComparamRef>,
}
