//! Two-pass loader: raw documents to arenas, then link resolution.
//!
//! Pass 1 builds every arena object from the raw XML model, leaving all
//! references as `Link::Broken` carrying the raw id, and collects the
//! declared identifiers into fragment-scoped tables. Pass 2 swaps every
//! broken link for its typed handle and re-parses the textual values whose
//! data type only became known through resolution (physical defaults,
//! table keys, mux case limits). Forward references are legal, which is
//! why building and resolving cannot be fused.

use std::collections::HashMap;

use odx_model::raw;

use crate::compu::{CompuMethod, InterpolationTable, LinearSegment, TextScale};
use crate::database::{Database, LoadOptions};
use crate::dct::{DctKind, DiagCodedType};
use crate::dop::{
    DataObjectProp, Dop, DopKind, DynamicLengthField, EndOfPduField, Mux, MuxCase, StaticField,
    Structure, Unit,
};
use crate::error::LoadError;
use crate::handles::{Handle, Link};
use crate::layer::{Comparam, ComparamRef, DiagLayer, LayerKind, ParentRef};
use crate::param::{DopRef, ParamKind, Parameter, TableRef};
use crate::service::{DiagService, MessageDef, MessageRole};
use crate::table::{Table, TableRow};
use crate::value::{DataType, IntervalType, Limit, OdxValue};

/// Identifier tables collected during pass 1, one map per target kind.
#[derive(Default)]
struct IdTable {
    dops: HashMap<String, Handle<Dop>>,
    tables: HashMap<String, Handle<Table>>,
    units: HashMap<String, Handle<Unit>>,
    layers: HashMap<String, Handle<DiagLayer>>,
    services: HashMap<String, Handle<DiagService>>,
    messages: HashMap<String, Handle<MessageDef>>,
    comparams: HashMap<String, Handle<Comparam>>,
    /// LENGTH-KEY parameter id to the parameter's short name.
    length_key_params: HashMap<String, String>,
    /// Every id with its declaring fragment, for duplicate detection.
    declared: HashMap<String, String>,
}

impl IdTable {
    /// Register an id. Duplicates within one fragment are fatal; across
    /// fragments the first declaration wins.
    fn declare(&mut self, id: &str, fragment: &str) -> Result<bool, LoadError> {
        match self.declared.get(id) {
            Some(prev) if prev == fragment => Err(LoadError::DuplicateIdentifier {
                id: id.to_string(),
                fragment: fragment.to_string(),
            }),
            Some(prev) => {
                log::warn!("Identifier '{id}' declared in both '{prev}' and '{fragment}'");
                Ok(false)
            }
            None => {
                self.declared.insert(id.to_string(), fragment.to_string());
                Ok(true)
            }
        }
    }
}

struct Builder {
    db: Database,
    ids: IdTable,
}

/// Build a resolved database from parsed documents.
pub(crate) fn build(
    documents: &[raw::OdxDocument],
    options: LoadOptions,
) -> Result<Database, LoadError> {
    let mut builder = Builder {
        db: Database::empty(options),
        ids: IdTable::default(),
    };
    for (index, document) in documents.iter().enumerate() {
        builder.load_document(document, index)?;
    }
    builder.resolve_links()?;
    builder.reparse_typed_values()?;
    log::info!(
        "Loaded {} diagnostic layers, {} services, {} data object properties",
        builder.db.layers.len(),
        builder.db.services.len(),
        builder.db.dops.len()
    );
    Ok(builder.db)
}

fn req<T>(value: Option<T>, what: &str) -> Result<T, LoadError> {
    value.ok_or_else(|| LoadError::MissingElement(what.to_string()))
}

fn link_of<T>(r: &raw::RawRef, what: &str) -> Result<Link<T>, LoadError> {
    Ok(Link::Broken(req(r.id_ref.clone(), what)?))
}

fn dop_ref_of(
    id_ref: Option<&raw::RawRef>,
    snref: Option<&raw::RawSnRef>,
    what: &str,
) -> Result<DopRef, LoadError> {
    if let Some(r) = id_ref {
        return Ok(DopRef::Id(link_of(r, what)?));
    }
    if let Some(s) = snref {
        return Ok(DopRef::Name(req(s.short_name.clone(), what)?));
    }
    Err(LoadError::MissingElement(what.to_string()))
}

fn parse_limit(raw: Option<&raw::RawLimit>, data_type: DataType) -> Result<Limit, LoadError> {
    let Some(raw) = raw else {
        return Ok(Limit::infinite());
    };
    let interval_type = match raw.interval_type.as_deref() {
        None => IntervalType::Closed,
        Some(name) => IntervalType::from_odx_name(name).ok_or_else(|| {
            LoadError::MalformedTypeDescriptor(format!("unknown INTERVAL-TYPE '{name}'"))
        })?,
    };
    if interval_type == IntervalType::Infinite {
        return Ok(Limit::infinite());
    }
    let text = req(raw.value.as_deref(), "limit value")?;
    Ok(Limit {
        value: Some(data_type.value_from_str(text)?),
        interval_type,
    })
}

/// Limit whose data type is only known after resolution; kept textual
/// until the re-parse stage.
fn parse_deferred_limit(raw: Option<&raw::RawLimit>) -> Result<Limit, LoadError> {
    let Some(raw) = raw else {
        return Ok(Limit::infinite());
    };
    let interval_type = match raw.interval_type.as_deref() {
        None => IntervalType::Closed,
        Some(name) => IntervalType::from_odx_name(name).ok_or_else(|| {
            LoadError::MalformedTypeDescriptor(format!("unknown INTERVAL-TYPE '{name}'"))
        })?,
    };
    if interval_type == IntervalType::Infinite {
        return Ok(Limit::infinite());
    }
    Ok(Limit {
        value: Some(OdxValue::String(req(raw.value.clone(), "limit value")?)),
        interval_type,
    })
}

fn parse_f64(text: &str, what: &str) -> Result<f64, LoadError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| LoadError::MalformedTypeDescriptor(format!("'{text}' is not a valid {what}")))
}

// --- Pass 1 ---

impl Builder {
    fn load_document(&mut self, document: &raw::OdxDocument, index: usize) -> Result<(), LoadError> {
        if let Some(subset) = &document.comparam_subset {
            self.load_comparam_subset(subset, index)?;
        }
        if let Some(container) = &document.diag_layer_container {
            let fragment = container
                .short_name
                .clone()
                .unwrap_or_else(|| format!("document_{index}"));
            if let Some(w) = &container.protocols {
                for layer in &w.items {
                    self.load_layer(layer, LayerKind::Protocol, &fragment)?;
                }
            }
            if let Some(w) = &container.functional_groups {
                for layer in &w.items {
                    self.load_layer(layer, LayerKind::FunctionalGroup, &fragment)?;
                }
            }
            if let Some(w) = &container.base_variants {
                for layer in &w.items {
                    self.load_layer(layer, LayerKind::BaseVariant, &fragment)?;
                }
            }
            if let Some(w) = &container.ecu_variants {
                for layer in &w.items {
                    self.load_layer(layer, LayerKind::EcuVariant, &fragment)?;
                }
            }
            if let Some(w) = &container.ecu_shared_datas {
                for layer in &w.items {
                    self.load_layer(layer, LayerKind::EcuSharedData, &fragment)?;
                }
            }
        }
        Ok(())
    }

    fn load_comparam_subset(
        &mut self,
        subset: &raw::RawComparamSubset,
        index: usize,
    ) -> Result<(), LoadError> {
        let fragment = subset
            .short_name
            .clone()
            .unwrap_or_else(|| format!("comparam_subset_{index}"));
        let Some(comparams) = &subset.comparams else {
            return Ok(());
        };
        for raw_comparam in &comparams.items {
            let id = req(raw_comparam.id.clone(), "COMPARAM @ID")?;
            let handle = Handle::new(self.db.comparams.len());
            self.db.comparams.push(Comparam {
                id: id.clone(),
                short_name: req(raw_comparam.short_name.clone(), "COMPARAM SHORT-NAME")?,
                physical_default_value: raw_comparam.physical_default_value.clone(),
            });
            if self.ids.declare(&id, &fragment)? {
                self.ids.comparams.insert(id, handle);
            }
        }
        Ok(())
    }

    fn load_layer(
        &mut self,
        raw_layer: &raw::RawDiagLayer,
        kind: LayerKind,
        fragment: &str,
    ) -> Result<(), LoadError> {
        let id = req(raw_layer.id.clone(), "DIAG-LAYER @ID")?;
        let short_name = req(raw_layer.short_name.clone(), "DIAG-LAYER SHORT-NAME")?;
        log::debug!("Loading {} '{short_name}'", kind.odx_name());

        let mut layer = DiagLayer {
            id: id.clone(),
            short_name,
            long_name: raw_layer.long_name.clone(),
            kind,
            fragment: fragment.to_string(),
            services: Vec::new(),
            service_refs: Vec::new(),
            messages: Vec::new(),
            dops: Vec::new(),
            tables: Vec::new(),
            units: Vec::new(),
            parent_refs: Vec::new(),
            comparam_refs: Vec::new(),
        };

        if let Some(ddd) = &raw_layer.diag_data_dictionary_spec {
            self.load_data_dictionary(ddd, &mut layer, fragment)?;
        }

        self.load_messages(raw_layer, &mut layer, fragment)?;

        if let Some(comms) = &raw_layer.diag_comms {
            for entry in &comms.items {
                match entry {
                    raw::DiagCommEntry::DiagService(raw_service) => {
                        let handle = self.load_service(raw_service, fragment)?;
                        layer.services.push(handle);
                    }
                    raw::DiagCommEntry::DiagCommRef(r) => {
                        layer.service_refs.push(link_of(r, "DIAG-COMM-REF @ID-REF")?);
                    }
                }
            }
        }

        if let Some(parent_refs) = &raw_layer.parent_refs {
            for raw_ref in &parent_refs.items {
                layer.parent_refs.push(ParentRef {
                    parent: Link::Broken(req(raw_ref.id_ref.clone(), "PARENT-REF @ID-REF")?),
                    not_inherited_diag_comms: snref_names(&raw_ref.not_inherited_diag_comms),
                    not_inherited_dops: snref_names(&raw_ref.not_inherited_dops),
                    not_inherited_tables: snref_names(&raw_ref.not_inherited_tables),
                });
            }
        }
        if let Some(comparam_refs) = &raw_layer.comparam_refs {
            for raw_ref in &comparam_refs.items {
                layer.comparam_refs.push(ComparamRef {
                    comparam: Link::Broken(req(raw_ref.id_ref.clone(), "COMPARAM-REF @ID-REF")?),
                    value: raw_ref.simple_value.clone(),
                });
            }
        }

        let handle = Handle::new(self.db.layers.len());
        self.db.layers.push(layer);
        if self.ids.declare(&id, fragment)? {
            self.ids.layers.insert(id, handle);
        }
        Ok(())
    }

    fn load_messages(
        &mut self,
        raw_layer: &raw::RawDiagLayer,
        layer: &mut DiagLayer,
        fragment: &str,
    ) -> Result<(), LoadError> {
        if let Some(w) = &raw_layer.requests {
            for r in &w.items {
                let h = self.load_message(
                    r.id.as_deref(),
                    r.short_name.as_deref(),
                    r.byte_size,
                    r.params.as_ref(),
                    MessageRole::Request,
                    fragment,
                )?;
                layer.messages.push(h);
            }
        }
        let response_groups = [
            (
                raw_layer.pos_responses.as_ref().map(|w| &w.items),
                MessageRole::PosResponse,
            ),
            (
                raw_layer.neg_responses.as_ref().map(|w| &w.items),
                MessageRole::NegResponse,
            ),
            (
                raw_layer.global_neg_responses.as_ref().map(|w| &w.items),
                MessageRole::GlobalNegResponse,
            ),
        ];
        for (group, role) in response_groups {
            if let Some(items) = group {
                for r in items {
                    let h = self.load_message(
                        r.id.as_deref(),
                        r.short_name.as_deref(),
                        r.byte_size,
                        r.params.as_ref(),
                        role,
                        fragment,
                    )?;
                    layer.messages.push(h);
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn load_message(
        &mut self,
        id: Option<&str>,
        short_name: Option<&str>,
        byte_size: Option<u32>,
        params: Option<&raw::ParamsWrapper>,
        role: MessageRole,
        fragment: &str,
    ) -> Result<Handle<MessageDef>, LoadError> {
        let id = req(id, "REQUEST/RESPONSE @ID")?.to_string();
        let message = MessageDef {
            id: id.clone(),
            short_name: req(short_name, "REQUEST/RESPONSE SHORT-NAME")?.to_string(),
            role,
            structure: Structure {
                byte_size: byte_size.map(|b| b as usize),
                params: self.build_params(params)?,
            },
        };
        let handle = Handle::new(self.db.messages.len());
        self.db.messages.push(message);
        if self.ids.declare(&id, fragment)? {
            self.ids.messages.insert(id, handle);
        }
        Ok(handle)
    }

    fn load_service(
        &mut self,
        raw_service: &raw::RawDiagService,
        fragment: &str,
    ) -> Result<Handle<DiagService>, LoadError> {
        let id = req(raw_service.id.clone(), "DIAG-SERVICE @ID")?;
        let service = DiagService {
            id: id.clone(),
            short_name: req(raw_service.short_name.clone(), "DIAG-SERVICE SHORT-NAME")?,
            long_name: raw_service.long_name.clone(),
            semantic: raw_service.semantic.clone(),
            addressing: raw_service.addressing.clone(),
            request: raw_service
                .request_ref
                .as_ref()
                .map(|r| link_of(r, "REQUEST-REF @ID-REF"))
                .transpose()?,
            pos_responses: raw_service
                .pos_response_refs
                .iter()
                .flat_map(|w| &w.items)
                .map(|r| link_of(r, "POS-RESPONSE-REF @ID-REF"))
                .collect::<Result<_, _>>()?,
            neg_responses: raw_service
                .neg_response_refs
                .iter()
                .flat_map(|w| &w.items)
                .map(|r| link_of(r, "NEG-RESPONSE-REF @ID-REF"))
                .collect::<Result<_, _>>()?,
        };
        let handle = Handle::new(self.db.services.len());
        self.db.services.push(service);
        if self.ids.declare(&id, fragment)? {
            self.ids.services.insert(id, handle);
        }
        Ok(handle)
    }

    fn load_data_dictionary(
        &mut self,
        ddd: &raw::RawDataDictionary,
        layer: &mut DiagLayer,
        fragment: &str,
    ) -> Result<(), LoadError> {
        if let Some(spec) = &ddd.unit_spec
            && let Some(units) = &spec.units
        {
            for raw_unit in &units.items {
                let id = req(raw_unit.id.clone(), "UNIT @ID")?;
                let handle = Handle::new(self.db.units.len());
                self.db.units.push(Unit {
                    id: id.clone(),
                    short_name: req(raw_unit.short_name.clone(), "UNIT SHORT-NAME")?,
                    display_name: raw_unit.display_name.clone().unwrap_or_default(),
                    factor_si_to_unit: raw_unit.factor_si_to_unit,
                    offset_si_to_unit: raw_unit.offset_si_to_unit,
                });
                layer.units.push(handle);
                if self.ids.declare(&id, fragment)? {
                    self.ids.units.insert(id, handle);
                }
            }
        }

        if let Some(w) = &ddd.data_object_props {
            for raw_dop in &w.items {
                let id = req(raw_dop.id.clone(), "DATA-OBJECT-PROP @ID")?;
                let kind = DopKind::Normal(self.build_data_object_prop(raw_dop)?);
                let handle = self.push_dop(
                    id,
                    req(raw_dop.short_name.clone(), "DATA-OBJECT-PROP SHORT-NAME")?,
                    raw_dop.long_name.clone(),
                    kind,
                    fragment,
                )?;
                layer.dops.push(handle);
            }
        }
        if let Some(w) = &ddd.structures {
            for raw_structure in &w.items {
                let id = req(raw_structure.id.clone(), "STRUCTURE @ID")?;
                let kind = DopKind::Structure(Structure {
                    byte_size: raw_structure.byte_size.map(|b| b as usize),
                    params: self.build_params(raw_structure.params.as_ref())?,
                });
                let handle = self.push_dop(
                    id,
                    req(raw_structure.short_name.clone(), "STRUCTURE SHORT-NAME")?,
                    None,
                    kind,
                    fragment,
                )?;
                layer.dops.push(handle);
            }
        }
        if let Some(w) = &ddd.static_fields {
            for raw_field in &w.items {
                let id = req(raw_field.id.clone(), "STATIC-FIELD @ID")?;
                let kind = DopKind::StaticField(StaticField {
                    structure: link_of(
                        req(raw_field.basic_structure_ref.as_ref(), "BASIC-STRUCTURE-REF")?,
                        "BASIC-STRUCTURE-REF @ID-REF",
                    )?,
                    fixed_number_of_items: req(
                        raw_field.fixed_number_of_items,
                        "FIXED-NUMBER-OF-ITEMS",
                    )? as usize,
                    item_byte_size: req(raw_field.item_byte_size, "ITEM-BYTE-SIZE")? as usize,
                });
                let handle = self.push_dop(
                    id,
                    req(raw_field.short_name.clone(), "STATIC-FIELD SHORT-NAME")?,
                    None,
                    kind,
                    fragment,
                )?;
                layer.dops.push(handle);
            }
        }
        if let Some(w) = &ddd.dynamic_length_fields {
            for raw_field in &w.items {
                let id = req(raw_field.id.clone(), "DYNAMIC-LENGTH-FIELD @ID")?;
                let determine = req(
                    raw_field.determine_number_of_items.as_ref(),
                    "DETERMINE-NUMBER-OF-ITEMS",
                )?;
                let kind = DopKind::DynamicLength(DynamicLengthField {
                    structure: link_of(
                        req(raw_field.basic_structure_ref.as_ref(), "BASIC-STRUCTURE-REF")?,
                        "BASIC-STRUCTURE-REF @ID-REF",
                    )?,
                    offset: req(raw_field.offset, "OFFSET")? as usize,
                    count_byte_position: req(determine.byte_position, "BYTE-POSITION")? as usize,
                    count_dop: link_of(
                        req(determine.dop_ref.as_ref(), "DATA-OBJECT-PROP-REF")?,
                        "DATA-OBJECT-PROP-REF @ID-REF",
                    )?,
                });
                let handle = self.push_dop(
                    id,
                    req(raw_field.short_name.clone(), "DYNAMIC-LENGTH-FIELD SHORT-NAME")?,
                    None,
                    kind,
                    fragment,
                )?;
                layer.dops.push(handle);
            }
        }
        if let Some(w) = &ddd.end_of_pdu_fields {
            for raw_field in &w.items {
                let id = req(raw_field.id.clone(), "END-OF-PDU-FIELD @ID")?;
                let kind = DopKind::EndOfPdu(EndOfPduField {
                    structure: link_of(
                        req(raw_field.basic_structure_ref.as_ref(), "BASIC-STRUCTURE-REF")?,
                        "BASIC-STRUCTURE-REF @ID-REF",
                    )?,
                    min_number_of_items: raw_field.min_number_of_items.map(|n| n as usize),
                    max_number_of_items: raw_field.max_number_of_items.map(|n| n as usize),
                });
                let handle = self.push_dop(
                    id,
                    req(raw_field.short_name.clone(), "END-OF-PDU-FIELD SHORT-NAME")?,
                    None,
                    kind,
                    fragment,
                )?;
                layer.dops.push(handle);
            }
        }
        if let Some(w) = &ddd.muxs {
            for raw_mux in &w.items {
                let id = req(raw_mux.id.clone(), "MUX @ID")?;
                let switch_key = req(raw_mux.switch_key.as_ref(), "SWITCH-KEY")?;
                let kind = DopKind::Mux(Mux {
                    byte_position: req(raw_mux.byte_position, "MUX BYTE-POSITION")? as usize,
                    switch_key_byte_position: req(switch_key.byte_position, "SWITCH-KEY BYTE-POSITION")?
                        as usize,
                    switch_key_bit_position: switch_key.bit_position.unwrap_or(0) as u8,
                    switch_key_dop: link_of(
                        req(switch_key.dop_ref.as_ref(), "DATA-OBJECT-PROP-REF")?,
                        "DATA-OBJECT-PROP-REF @ID-REF",
                    )?,
                    default_case: raw_mux
                        .default_case
                        .as_ref()
                        .map(build_mux_case)
                        .transpose()?,
                    cases: raw_mux
                        .cases
                        .iter()
                        .flat_map(|w| &w.items)
                        .map(build_mux_case)
                        .collect::<Result<_, _>>()?,
                });
                let handle = self.push_dop(
                    id,
                    req(raw_mux.short_name.clone(), "MUX SHORT-NAME")?,
                    None,
                    kind,
                    fragment,
                )?;
                layer.dops.push(handle);
            }
        }
        if let Some(w) = &ddd.tables {
            for raw_table in &w.items {
                let handle = self.load_table(raw_table, fragment)?;
                layer.tables.push(handle);
            }
        }
        Ok(())
    }

    fn load_table(
        &mut self,
        raw_table: &raw::RawTable,
        fragment: &str,
    ) -> Result<Handle<Table>, LoadError> {
        let id = req(raw_table.id.clone(), "TABLE @ID")?;
        let mut rows = Vec::with_capacity(raw_table.table_rows.len());
        for raw_row in &raw_table.table_rows {
            let row_id = req(raw_row.id.clone(), "TABLE-ROW @ID")?;
            let structure_ref = raw_row
                .structure_ref
                .as_ref()
                .or(raw_row.dop_ref.as_ref());
            let row = TableRow {
                id: row_id.clone(),
                short_name: req(raw_row.short_name.clone(), "TABLE-ROW SHORT-NAME")?,
                long_name: None,
                // typed once the key DOP has been resolved
                key: OdxValue::String(req(raw_row.key.clone(), "TABLE-ROW KEY")?),
                structure: structure_ref
                    .map(|r| link_of(r, "TABLE-ROW STRUCTURE-REF @ID-REF"))
                    .transpose()?,
            };
            let row_handle = Handle::new(self.db.table_rows.len());
            self.db.table_rows.push(row);
            self.ids.declare(&row_id, fragment)?;
            rows.push(row_handle);
        }
        let table = Table {
            id: id.clone(),
            short_name: req(raw_table.short_name.clone(), "TABLE SHORT-NAME")?,
            long_name: raw_table.long_name.clone(),
            semantic: None,
            key_dop: link_of(
                req(raw_table.key_dop_ref.as_ref(), "KEY-DOP-REF")?,
                "KEY-DOP-REF @ID-REF",
            )?,
            rows,
        };
        let handle = Handle::new(self.db.tables.len());
        self.db.tables.push(table);
        if self.ids.declare(&id, fragment)? {
            self.ids.tables.insert(id, handle);
        }
        Ok(handle)
    }

    fn push_dop(
        &mut self,
        id: String,
        short_name: String,
        long_name: Option<String>,
        kind: DopKind,
        fragment: &str,
    ) -> Result<Handle<Dop>, LoadError> {
        let handle = Handle::new(self.db.dops.len());
        self.db.dops.push(Dop {
            id: id.clone(),
            short_name,
            long_name,
            kind,
        });
        if self.ids.declare(&id, fragment)? {
            self.ids.dops.insert(id, handle);
        }
        Ok(handle)
    }

    fn build_data_object_prop(
        &self,
        raw_dop: &raw::RawDataObjectProp,
    ) -> Result<DataObjectProp, LoadError> {
        let dct = DiagCodedType::from_raw(req(
            raw_dop.diag_coded_type.as_ref(),
            "DIAG-CODED-TYPE of DATA-OBJECT-PROP",
        )?)?;
        let physical_type = match raw_dop
            .physical_type
            .as_ref()
            .and_then(|p| p.base_data_type.as_deref())
        {
            Some(name) => DataType::from_odx_name(name).ok_or_else(|| {
                LoadError::MalformedTypeDescriptor(format!("unknown BASE-DATA-TYPE '{name}'"))
            })?,
            None => dct.base_data_type,
        };
        let compu_method =
            build_compu_method(raw_dop.compu_method.as_ref(), dct.base_data_type, physical_type)?;
        let internal_constraint = raw_dop
            .internal_constr
            .as_ref()
            .map(|c| {
                Ok::<_, LoadError>((
                    parse_limit(c.lower_limit.as_ref(), dct.base_data_type)?,
                    parse_limit(c.upper_limit.as_ref(), dct.base_data_type)?,
                ))
            })
            .transpose()?;
        Ok(DataObjectProp {
            diag_coded_type: dct,
            physical_type,
            compu_method,
            unit: raw_dop
                .unit_ref
                .as_ref()
                .map(|r| link_of(r, "UNIT-REF @ID-REF"))
                .transpose()?,
            internal_constraint,
        })
    }

    fn build_params(
        &mut self,
        params: Option<&raw::ParamsWrapper>,
    ) -> Result<Vec<Parameter>, LoadError> {
        let raw_params = params.map(|w| w.items.as_slice()).unwrap_or_default();
        let mut built = Vec::with_capacity(raw_params.len());
        // id/short name of TABLE-KEY parameters in this list, for wiring
        // TABLE-STRUCT parameters up below
        let mut table_keys: Vec<(Option<String>, String, TableRef)> = Vec::new();
        // TABLE-STRUCT index -> raw key reference (id or short name)
        let mut pending_structs: Vec<(usize, String, bool)> = Vec::new();

        for raw_param in raw_params {
            let short_name = req(raw_param.short_name.clone(), "PARAM SHORT-NAME")?;
            let xsi_type = req(raw_param.xsi_type.as_deref(), "PARAM xsi:type")?;

            let kind = match xsi_type {
                "CODED-CONST" => {
                    let dct = DiagCodedType::from_raw(req(
                        raw_param.diag_coded_type.as_ref(),
                        "DIAG-CODED-TYPE of CODED-CONST",
                    )?)?;
                    let coded_value = dct
                        .base_data_type
                        .value_from_str(req(raw_param.coded_value.as_deref(), "CODED-VALUE")?)?;
                    ParamKind::CodedConst {
                        diag_coded_type: dct,
                        coded_value,
                    }
                }
                "NRC-CONST" => {
                    let dct = DiagCodedType::from_raw(req(
                        raw_param.diag_coded_type.as_ref(),
                        "DIAG-CODED-TYPE of NRC-CONST",
                    )?)?;
                    let coded_values = req(raw_param.coded_values.as_ref(), "CODED-VALUES")?
                        .items
                        .iter()
                        .map(|v| dct.base_data_type.value_from_str(v))
                        .collect::<Result<Vec<_>, _>>()?;
                    ParamKind::NrcConst {
                        diag_coded_type: dct,
                        coded_values,
                    }
                }
                "VALUE" => ParamKind::Value {
                    dop: dop_ref_of(
                        raw_param.dop_ref.as_ref(),
                        raw_param.dop_snref.as_ref(),
                        "DOP-REF/DOP-SNREF of VALUE",
                    )?,
                    // typed once the DOP has been resolved
                    physical_default: raw_param
                        .physical_default_value
                        .clone()
                        .map(OdxValue::String),
                },
                "PHYS-CONST" => ParamKind::PhysConst {
                    dop: dop_ref_of(
                        raw_param.dop_ref.as_ref(),
                        raw_param.dop_snref.as_ref(),
                        "DOP-REF/DOP-SNREF of PHYS-CONST",
                    )?,
                    constant: OdxValue::String(req(
                        raw_param.phys_constant_value.clone(),
                        "PHYS-CONSTANT-VALUE",
                    )?),
                },
                "RESERVED" => ParamKind::Reserved {
                    bit_length: req(raw_param.bit_length, "BIT-LENGTH of RESERVED")?,
                },
                "MATCHING-REQUEST-PARAM" => ParamKind::MatchingRequest {
                    request_byte_position: req(raw_param.request_byte_pos, "REQUEST-BYTE-POS")?
                        as usize,
                    byte_length: req(raw_param.byte_length, "BYTE-LENGTH")? as usize,
                },
                "SYSTEM" => ParamKind::System {
                    dop: dop_ref_of(
                        raw_param.dop_ref.as_ref(),
                        raw_param.dop_snref.as_ref(),
                        "DOP-REF/DOP-SNREF of SYSTEM",
                    )?,
                    sysparam: req(raw_param.sysparam.clone(), "@SYSPARAM")?,
                },
                "LENGTH-KEY" => {
                    if let Some(id) = &raw_param.id {
                        self.ids
                            .length_key_params
                            .insert(id.clone(), short_name.clone());
                    }
                    ParamKind::LengthKey {
                        dop: dop_ref_of(
                            raw_param.dop_ref.as_ref(),
                            raw_param.dop_snref.as_ref(),
                            "DOP-REF/DOP-SNREF of LENGTH-KEY",
                        )?,
                    }
                }
                "TABLE-KEY" => {
                    let table = if let Some(r) = &raw_param.table_ref {
                        TableRef::Id(link_of(r, "TABLE-REF @ID-REF")?)
                    } else if let Some(s) = &raw_param.table_snref {
                        TableRef::Name(req(s.short_name.clone(), "TABLE-SNREF @SHORT-NAME")?)
                    } else {
                        return Err(LoadError::MissingElement(
                            "TABLE-REF/TABLE-SNREF of TABLE-KEY".into(),
                        ));
                    };
                    table_keys.push((raw_param.id.clone(), short_name.clone(), table.clone()));
                    ParamKind::TableKey { table }
                }
                "TABLE-STRUCT" => {
                    let (key, by_id) = if let Some(r) = &raw_param.table_key_ref {
                        (req(r.id_ref.clone(), "TABLE-KEY-REF @ID-REF")?, true)
                    } else if let Some(s) = &raw_param.table_key_snref {
                        (
                            req(s.short_name.clone(), "TABLE-KEY-SNREF @SHORT-NAME")?,
                            false,
                        )
                    } else {
                        return Err(LoadError::MissingElement(
                            "TABLE-KEY-REF/TABLE-KEY-SNREF of TABLE-STRUCT".into(),
                        ));
                    };
                    pending_structs.push((built.len(), key, by_id));
                    // wired to its key parameter below
                    ParamKind::TableStruct {
                        table_key: String::new(),
                        table: TableRef::Name(String::new()),
                    }
                }
                "DYNAMIC" => ParamKind::Dynamic,
                other => {
                    return Err(LoadError::MalformedTypeDescriptor(format!(
                        "unknown PARAM variant '{other}'"
                    )));
                }
            };

            built.push(Parameter {
                short_name,
                long_name: raw_param.long_name.clone(),
                semantic: raw_param.semantic.clone(),
                byte_position: raw_param.byte_position.map(|b| b as usize),
                bit_position: raw_param.bit_position.unwrap_or(0) as u8,
                kind,
            });
        }

        // TABLE-STRUCT parameters refer to their key parameter by id or
        // short name; both must live in the same parameter list.
        for (index, key, by_id) in pending_structs {
            let entry = table_keys.iter().find(|(id, name, _)| {
                if by_id {
                    id.as_deref() == Some(key.as_str())
                } else {
                    *name == key
                }
            });
            let Some((_, key_name, table)) = entry else {
                if by_id {
                    return Err(LoadError::UnresolvedReference {
                        id_ref: key,
                        expected: "TABLE-KEY parameter in the same parameter list",
                    });
                }
                return Err(LoadError::ScopeViolation {
                    short_name: key,
                    scope: "parameter list of the enclosing structure".into(),
                });
            };
            built[index].kind = ParamKind::TableStruct {
                table_key: key_name.clone(),
                table: table.clone(),
            };
        }
        Ok(built)
    }
}

fn snref_names<W>(wrapper: &Option<W>) -> Vec<String>
where
    W: NotInheritedList,
{
    wrapper.as_ref().map(W::names).unwrap_or_default()
}

/// Uniform access to the three NOT-INHERITED-* wrapper shapes.
trait NotInheritedList {
    fn names(&self) -> Vec<String>;
}

macro_rules! impl_not_inherited {
    ($($ty:ty),*) => {
        $(impl NotInheritedList for $ty {
            fn names(&self) -> Vec<String> {
                self.items
                    .iter()
                    .filter_map(|e| e.snref.as_ref())
                    .filter_map(|s| s.short_name.clone())
                    .collect()
            }
        })*
    };
}

impl_not_inherited!(
    raw::NotInheritedDiagCommsWrapper,
    raw::NotInheritedDopsWrapper,
    raw::NotInheritedTablesWrapper
);

fn build_mux_case(raw_case: &raw::RawMuxCase) -> Result<MuxCase, LoadError> {
    Ok(MuxCase {
        short_name: req(raw_case.short_name.clone(), "CASE SHORT-NAME")?,
        lower_limit: parse_deferred_limit(raw_case.lower_limit.as_ref())?,
        upper_limit: parse_deferred_limit(raw_case.upper_limit.as_ref())?,
        structure: raw_case
            .structure_ref
            .as_ref()
            .map(|r| link_of(r, "STRUCTURE-REF @ID-REF"))
            .transpose()?,
    })
}

fn build_compu_method(
    raw_method: Option<&raw::RawCompuMethod>,
    internal_type: DataType,
    physical_type: DataType,
) -> Result<CompuMethod, LoadError> {
    let Some(raw_method) = raw_method else {
        return Ok(CompuMethod::Identical);
    };
    let category = raw_method.category.as_deref().unwrap_or("IDENTICAL");
    let scales = raw_method
        .compu_internal_to_phys
        .as_ref()
        .and_then(|d| d.compu_scales.as_ref())
        .map(|w| w.items.as_slice())
        .unwrap_or_default();

    match category {
        "IDENTICAL" => Ok(CompuMethod::Identical),
        "LINEAR" => {
            let scale = scales.first().ok_or_else(|| {
                LoadError::MissingElement("COMPU-SCALE of LINEAR method".into())
            })?;
            Ok(CompuMethod::Linear(build_linear_segment(
                scale,
                internal_type,
                physical_type,
            )?))
        }
        "SCALE-LINEAR" => Ok(CompuMethod::ScaleLinear(
            scales
                .iter()
                .map(|s| build_linear_segment(s, internal_type, physical_type))
                .collect::<Result<_, _>>()?,
        )),
        "TEXTTABLE" => Ok(CompuMethod::TextTable(
            scales
                .iter()
                .map(|s| build_text_scale(s, internal_type))
                .collect::<Result<_, _>>()?,
        )),
        "TAB-INTP" => {
            let mut points = Vec::with_capacity(scales.len());
            for scale in scales {
                let internal = parse_f64(
                    req(
                        scale.lower_limit.as_ref().and_then(|l| l.value.as_deref()),
                        "LOWER-LIMIT of TAB-INTP scale",
                    )?,
                    "TAB-INTP sample point",
                )?;
                let physical = parse_f64(
                    req(
                        scale.compu_const.as_ref().and_then(|c| c.v.as_deref()),
                        "COMPU-CONST of TAB-INTP scale",
                    )?,
                    "TAB-INTP sample point",
                )?;
                points.push((internal, physical));
            }
            Ok(CompuMethod::TabIntp(InterpolationTable::new(points)))
        }
        other => Err(LoadError::MalformedTypeDescriptor(format!(
            "unknown COMPU-METHOD category '{other}'"
        ))),
    }
}

fn build_linear_segment(
    scale: &raw::RawCompuScale,
    internal_type: DataType,
    physical_type: DataType,
) -> Result<LinearSegment, LoadError> {
    let coeffs = req(
        scale.compu_rational_coeffs.as_ref(),
        "COMPU-RATIONAL-COEFFS of linear scale",
    )?;
    let numerators = coeffs
        .compu_numerator
        .as_ref()
        .map(|w| w.items.as_slice())
        .unwrap_or_default();
    let offset = numerators
        .first()
        .map(|v| parse_f64(v, "COMPU-NUMERATOR coefficient"))
        .transpose()?
        .unwrap_or(0.0);
    let factor = numerators
        .get(1)
        .map(|v| parse_f64(v, "COMPU-NUMERATOR coefficient"))
        .transpose()?
        .unwrap_or(0.0);
    let denominator = coeffs
        .compu_denominator
        .as_ref()
        .and_then(|w| w.items.first())
        .map(|v| parse_f64(v, "COMPU-DENOMINATOR coefficient"))
        .transpose()?
        .unwrap_or(1.0);
    let inverse_value = scale
        .compu_inverse_value
        .as_ref()
        .and_then(|v| v.v.as_deref())
        .map(|v| parse_f64(v, "COMPU-INVERSE-VALUE"))
        .transpose()?
        .unwrap_or(0.0);
    Ok(LinearSegment::new(
        offset,
        factor,
        denominator,
        parse_limit(scale.lower_limit.as_ref(), internal_type)?,
        parse_limit(scale.upper_limit.as_ref(), internal_type)?,
        inverse_value,
        internal_type,
        physical_type,
    ))
}

fn build_text_scale(
    scale: &raw::RawCompuScale,
    internal_type: DataType,
) -> Result<TextScale, LoadError> {
    let lower = parse_limit(scale.lower_limit.as_ref(), internal_type)?;
    // a scale without an upper limit maps a single point
    let upper = match scale.upper_limit.as_ref() {
        Some(raw_limit) => parse_limit(Some(raw_limit), internal_type)?,
        None => lower.clone(),
    };
    let text = req(
        scale.compu_const.as_ref().and_then(|c| c.vt.clone()),
        "COMPU-CONST VT of TEXTTABLE scale",
    )?;
    let inverse_value = scale
        .compu_inverse_value
        .as_ref()
        .and_then(|v| v.v.as_deref())
        .map(|v| internal_type.value_from_str(v))
        .transpose()?;
    Ok(TextScale {
        lower,
        upper,
        text,
        inverse_value,
    })
}

// --- Pass 2: link resolution ---

fn resolve_link<T>(
    link: &mut Link<T>,
    map: &HashMap<String, Handle<T>>,
    expected: &'static str,
    strict: bool,
) -> Result<(), LoadError> {
    if let Link::Broken(id_ref) = link {
        match map.get(id_ref.as_str()) {
            Some(handle) => *link = Link::Resolved(*handle),
            None if strict => {
                return Err(LoadError::UnresolvedReference {
                    id_ref: id_ref.clone(),
                    expected,
                });
            }
            None => log::warn!("Unresolved reference '{id_ref}' (expected {expected})"),
        }
    }
    Ok(())
}

fn resolve_dct(dct: &mut DiagCodedType, ids: &IdTable, strict: bool) -> Result<(), LoadError> {
    if let DctKind::ParamLengthInfo { length_key } = &mut dct.kind {
        match ids.length_key_params.get(length_key.as_str()) {
            Some(short_name) => *length_key = short_name.clone(),
            None if strict => {
                return Err(LoadError::UnresolvedReference {
                    id_ref: length_key.clone(),
                    expected: "LENGTH-KEY parameter",
                });
            }
            None => log::warn!("Unresolved LENGTH-KEY-REF '{length_key}'"),
        }
    }
    Ok(())
}

fn resolve_dop_ref(r: &mut DopRef, ids: &IdTable, strict: bool) -> Result<(), LoadError> {
    if let DopRef::Id(link) = r {
        resolve_link(link, &ids.dops, "DOP", strict)?;
    }
    Ok(())
}

fn resolve_table_ref(r: &mut TableRef, ids: &IdTable, strict: bool) -> Result<(), LoadError> {
    if let TableRef::Id(link) = r {
        resolve_link(link, &ids.tables, "TABLE", strict)?;
    }
    Ok(())
}

fn resolve_param(param: &mut Parameter, ids: &IdTable, strict: bool) -> Result<(), LoadError> {
    match &mut param.kind {
        ParamKind::CodedConst {
            diag_coded_type, ..
        }
        | ParamKind::NrcConst {
            diag_coded_type, ..
        } => resolve_dct(diag_coded_type, ids, strict),
        ParamKind::Value { dop, .. }
        | ParamKind::PhysConst { dop, .. }
        | ParamKind::System { dop, .. }
        | ParamKind::LengthKey { dop } => resolve_dop_ref(dop, ids, strict),
        ParamKind::TableKey { table } | ParamKind::TableStruct { table, .. } => {
            resolve_table_ref(table, ids, strict)
        }
        ParamKind::Reserved { .. } | ParamKind::MatchingRequest { .. } | ParamKind::Dynamic => {
            Ok(())
        }
    }
}

impl Builder {
    fn resolve_links(&mut self) -> Result<(), LoadError> {
        let strict = self.db.options.strict;
        let ids = &self.ids;

        for dop in &mut self.db.dops {
            match &mut dop.kind {
                DopKind::Normal(prop) => {
                    resolve_dct(&mut prop.diag_coded_type, ids, strict)?;
                    if let Some(unit) = &mut prop.unit {
                        resolve_link(unit, &ids.units, "UNIT", strict)?;
                    }
                }
                DopKind::Structure(structure) => {
                    for param in &mut structure.params {
                        resolve_param(param, ids, strict)?;
                    }
                }
                DopKind::StaticField(field) => {
                    resolve_link(&mut field.structure, &ids.dops, "STRUCTURE", strict)?;
                }
                DopKind::DynamicLength(field) => {
                    resolve_link(&mut field.structure, &ids.dops, "STRUCTURE", strict)?;
                    resolve_link(&mut field.count_dop, &ids.dops, "DATA-OBJECT-PROP", strict)?;
                }
                DopKind::EndOfPdu(field) => {
                    resolve_link(&mut field.structure, &ids.dops, "STRUCTURE", strict)?;
                }
                DopKind::Mux(mux) => {
                    resolve_link(&mut mux.switch_key_dop, &ids.dops, "DATA-OBJECT-PROP", strict)?;
                    for case in mux.cases.iter_mut().chain(&mut mux.default_case) {
                        if let Some(structure) = &mut case.structure {
                            resolve_link(structure, &ids.dops, "STRUCTURE", strict)?;
                        }
                    }
                }
            }
        }

        for message in &mut self.db.messages {
            for param in &mut message.structure.params {
                resolve_param(param, ids, strict)?;
            }
        }

        for table in &mut self.db.tables {
            resolve_link(&mut table.key_dop, &ids.dops, "DATA-OBJECT-PROP", strict)?;
        }
        for row in &mut self.db.table_rows {
            if let Some(structure) = &mut row.structure {
                resolve_link(structure, &ids.dops, "STRUCTURE", strict)?;
            }
        }

        for service in &mut self.db.services {
            if let Some(request) = &mut service.request {
                resolve_link(request, &ids.messages, "REQUEST", strict)?;
            }
            for response in service
                .pos_responses
                .iter_mut()
                .chain(&mut service.neg_responses)
            {
                resolve_link(response, &ids.messages, "RESPONSE", strict)?;
            }
        }

        for layer in &mut self.db.layers {
            for parent_ref in &mut layer.parent_refs {
                resolve_link(&mut parent_ref.parent, &ids.layers, "DIAG-LAYER", strict)?;
            }
            for comparam_ref in &mut layer.comparam_refs {
                resolve_link(&mut comparam_ref.comparam, &ids.comparams, "COMPARAM", strict)?;
            }
            for service_ref in &mut layer.service_refs {
                resolve_link(service_ref, &ids.services, "DIAG-SERVICE", strict)?;
            }
        }
        Ok(())
    }

    /// Re-parse textual values whose data type only became known through
    /// resolution: physical defaults and constants (typed by their DOP),
    /// table row keys (typed by the key DOP) and mux case limits (typed
    /// by the switch key DOP).
    fn reparse_typed_values(&mut self) -> Result<(), LoadError> {
        let strict = self.db.options.strict;
        let physical_types: Vec<Option<DataType>> = self
            .db
            .dops
            .iter()
            .map(|dop| match &dop.kind {
                DopKind::Normal(prop) => Some(prop.physical_type),
                _ => None,
            })
            .collect();

        let physical_type_of = |r: &DopRef| -> Option<DataType> {
            match r {
                DopRef::Id(Link::Resolved(h)) => physical_types[h.index()],
                _ => None,
            }
        };
        let physical_type_of_link = |l: &Link<Dop>| -> Option<DataType> {
            match l {
                Link::Resolved(h) => physical_types[h.index()],
                Link::Broken(_) => None,
            }
        };

        let Database {
            dops,
            messages,
            tables,
            table_rows,
            ..
        } = &mut self.db;

        let reparse_params = |params: &mut [Parameter]| -> Result<(), LoadError> {
            for param in params {
                match &mut param.kind {
                    ParamKind::Value {
                        dop,
                        physical_default: Some(default),
                    } => {
                        if let Some(dt) = physical_type_of(dop) {
                            reparse_value(default, dt, strict)?;
                        }
                    }
                    ParamKind::PhysConst { dop, constant } => {
                        if let Some(dt) = physical_type_of(dop) {
                            reparse_value(constant, dt, strict)?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        };

        for dop in dops.iter_mut() {
            match &mut dop.kind {
                DopKind::Structure(structure) => reparse_params(&mut structure.params)?,
                DopKind::Mux(mux) => {
                    let Some(dt) = physical_type_of_link(&mux.switch_key_dop) else {
                        continue;
                    };
                    for case in mux.cases.iter_mut().chain(&mut mux.default_case) {
                        reparse_limit(&mut case.lower_limit, dt, strict)?;
                        reparse_limit(&mut case.upper_limit, dt, strict)?;
                    }
                }
                _ => {}
            }
        }
        for message in messages.iter_mut() {
            reparse_params(&mut message.structure.params)?;
        }
        for table in tables.iter() {
            let Some(dt) = physical_type_of_link(&table.key_dop) else {
                continue;
            };
            for &row in &table.rows {
                reparse_value(&mut table_rows[row.index()].key, dt, strict)?;
            }
        }
        Ok(())
    }
}

fn reparse_value(value: &mut OdxValue, data_type: DataType, strict: bool) -> Result<(), LoadError> {
    if matches!(
        data_type,
        DataType::AsciiString | DataType::Utf8String | DataType::Unicode2String
    ) {
        return Ok(());
    }
    if let OdxValue::String(text) = value {
        match data_type.value_from_str(text) {
            Ok(parsed) => *value = parsed,
            Err(err) if strict => return Err(err),
            Err(err) => log::warn!("Keeping textual value '{text}': {err}"),
        }
    }
    Ok(())
}

fn reparse_limit(limit: &mut Limit, data_type: DataType, strict: bool) -> Result<(), LoadError> {
    if let Some(value) = &mut limit.value {
        reparse_value(value, data_type, strict)?;
    }
    Ok(())
}
