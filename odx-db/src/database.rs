//! The database facade: arenas, effective-layer cache, dispatch entry
//! points.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use odx_model::{parse_document, raw::OdxDocument, read_pdx_file};

use crate::dop::{Dop, Unit};
use crate::error::{CodecError, DispatchError, LoadError};
use crate::handles::{Handle, Link};
use crate::inheritance::{self, EffectiveLayer};
use crate::layer::{Comparam, DiagLayer};
use crate::param::{DopRef, ParamValue, TableRef};
use crate::resolve;
use crate::service::{self, DecodedMessage, DiagService, MessageDef};
use crate::table::{Table, TableRow};

/// Loader configuration, threaded explicitly through the load chain.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// With strict loading, any unresolved reference fails the load. In
    /// lenient mode the link is kept broken and only fails when used.
    pub strict: bool,
    /// Hard repetition guard for end-of-pdu and dynamic-length fields.
    pub max_field_items: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strict: true,
            max_field_items: 10_000,
        }
    }
}

/// Root of the resolved object graph. All objects live in flat arenas
/// here; everything else refers to them by handle.
#[derive(Debug)]
pub struct Database {
    pub(crate) layers: Vec<DiagLayer>,
    pub(crate) services: Vec<DiagService>,
    pub(crate) messages: Vec<MessageDef>,
    pub(crate) dops: Vec<Dop>,
    pub(crate) tables: Vec<Table>,
    pub(crate) table_rows: Vec<TableRow>,
    pub(crate) units: Vec<Unit>,
    pub(crate) comparams: Vec<Comparam>,
    pub(crate) options: LoadOptions,
    effective_cache: RwLock<HashMap<Handle<DiagLayer>, Arc<EffectiveLayer>>>,
}

impl Database {
    pub(crate) fn empty(options: LoadOptions) -> Self {
        Self {
            layers: Vec::new(),
            services: Vec::new(),
            messages: Vec::new(),
            dops: Vec::new(),
            tables: Vec::new(),
            table_rows: Vec::new(),
            units: Vec::new(),
            comparams: Vec::new(),
            options,
            effective_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Build a database from already parsed documents.
    pub fn from_documents(
        documents: &[OdxDocument],
        options: LoadOptions,
    ) -> Result<Self, LoadError> {
        resolve::build(documents, options)
    }

    /// Parse and load one or more ODX document texts.
    pub fn from_xml<S: AsRef<str>>(texts: &[S], options: LoadOptions) -> Result<Self, LoadError> {
        let documents = texts
            .iter()
            .map(|t| parse_document(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_documents(&documents, options)
    }

    /// Load every ODX document contained in a `.pdx` archive.
    pub fn from_pdx_file<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self, LoadError> {
        let entries = read_pdx_file(path.as_ref())?;
        let documents = entries
            .iter()
            .map(|e| parse_document(&e.xml))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_documents(&documents, options)
    }

    pub fn layers(&self) -> impl Iterator<Item = (Handle<DiagLayer>, &DiagLayer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| (Handle::new(i), l))
    }

    pub fn layer_by_name(&self, short_name: &str) -> Option<Handle<DiagLayer>> {
        self.layers
            .iter()
            .position(|l| l.short_name == short_name)
            .map(Handle::new)
    }

    pub fn layer(&self, handle: Handle<DiagLayer>) -> &DiagLayer {
        &self.layers[handle.index()]
    }

    pub fn service(&self, handle: Handle<DiagService>) -> &DiagService {
        &self.services[handle.index()]
    }

    pub fn message(&self, handle: Handle<MessageDef>) -> &MessageDef {
        &self.messages[handle.index()]
    }

    pub fn dop(&self, handle: Handle<Dop>) -> &Dop {
        &self.dops[handle.index()]
    }

    pub fn table(&self, handle: Handle<Table>) -> &Table {
        &self.tables[handle.index()]
    }

    pub fn table_row(&self, handle: Handle<TableRow>) -> &TableRow {
        &self.table_rows[handle.index()]
    }

    pub fn unit(&self, handle: Handle<Unit>) -> &Unit {
        &self.units[handle.index()]
    }

    /// The flattened view of a layer, computed on first use and cached.
    pub fn effective_layer(
        &self,
        handle: Handle<DiagLayer>,
    ) -> Result<Arc<EffectiveLayer>, LoadError> {
        {
            let cache = self
                .effective_cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(effective) = cache.get(&handle) {
                return Ok(Arc::clone(effective));
            }
        }
        let effective = Arc::new(inheritance::compute(self, handle, &mut Vec::new())?);
        self.effective_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, Arc::clone(&effective));
        Ok(effective)
    }

    pub fn scope<'a>(&'a self, layer: &'a EffectiveLayer) -> CodecScope<'a> {
        CodecScope { db: self, layer }
    }

    /// Encode a request for a named service of the given effective layer.
    pub fn encode_request(
        &self,
        layer: &EffectiveLayer,
        service_name: &str,
        values: &ParamValue,
    ) -> Result<Vec<u8>, DispatchError> {
        let service = layer
            .service(service_name)
            .ok_or(DispatchError::NoMatchingService)?;
        let request = self.services[service.index()]
            .request
            .as_ref()
            .ok_or(DispatchError::NoMatchingService)?
            .get()?;
        let bytes = self.messages[request.index()].encode(&self.scope(layer), values, None)?;
        Ok(bytes)
    }

    /// Candidate services matching the coded message.
    pub fn identify(
        &self,
        layer: &EffectiveLayer,
        data: &[u8],
    ) -> Result<Vec<Handle<DiagService>>, DispatchError> {
        service::identify(&self.scope(layer), data)
    }

    /// Decode a coded message against every applicable definition.
    pub fn decode_message(
        &self,
        layer: &EffectiveLayer,
        data: &[u8],
        expected_request: Option<&[u8]>,
    ) -> Result<Vec<DecodedMessage>, DispatchError> {
        service::decode_message(&self.scope(layer), data, expected_request)
    }
}

/// Lookup context for one encode/decode run: the database arenas plus the
/// effective layer that short-name references resolve against.
#[derive(Clone, Copy)]
pub struct CodecScope<'a> {
    pub db: &'a Database,
    pub layer: &'a EffectiveLayer,
}

impl<'a> CodecScope<'a> {
    pub fn dop(&self, r: &DopRef) -> Result<&'a Dop, CodecError> {
        match r {
            DopRef::Id(link) => self.dop_by_link(link),
            DopRef::Name(name) => self
                .layer
                .dop(name)
                .map(|h| &self.db.dops[h.index()])
                .ok_or_else(|| CodecError::DanglingShortNameRef {
                    short_name: name.clone(),
                }),
        }
    }

    pub fn dop_by_link(&self, link: &Link<Dop>) -> Result<&'a Dop, CodecError> {
        Ok(&self.db.dops[link.get()?.index()])
    }

    pub fn table(&self, r: &TableRef) -> Result<&'a Table, CodecError> {
        match r {
            TableRef::Id(link) => Ok(&self.db.tables[link.get()?.index()]),
            TableRef::Name(name) => self
                .layer
                .table(name)
                .map(|h| &self.db.tables[h.index()])
                .ok_or_else(|| CodecError::DanglingShortNameRef {
                    short_name: name.clone(),
                }),
        }
    }

    pub fn table_rows(&self) -> &'a [TableRow] {
        &self.db.table_rows
    }

    pub fn max_field_items(&self) -> usize {
        self.db.options.max_field_items
    }
}
