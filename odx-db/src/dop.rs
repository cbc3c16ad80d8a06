//! Data object properties and field groups (structures, repeating
//! fields, multiplexers).

use crate::compu::CompuMethod;
use crate::database::CodecScope;
use crate::dct::DiagCodedType;
use crate::error::CodecError;
use crate::handles::Link;
use crate::param::{self, ParamValue, Parameter};
use crate::state::{DecodeState, EncodeState};
use crate::value::{DataType, Limit, OdxValue};

/// Physical display unit attached to a DOP.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: String,
    pub short_name: String,
    pub display_name: String,
    /// Conversion to the SI reference unit, if declared.
    pub factor_si_to_unit: Option<f64>,
    pub offset_si_to_unit: Option<f64>,
}

/// Simple data object property: wire shape + value conversion.
#[derive(Debug, Clone)]
pub struct DataObjectProp {
    pub diag_coded_type: DiagCodedType,
    pub physical_type: DataType,
    pub compu_method: CompuMethod,
    pub unit: Option<Link<Unit>>,
    /// INTERNAL-CONSTR limits, checked against the internal value.
    pub internal_constraint: Option<(Limit, Limit)>,
}

impl DataObjectProp {
    pub fn decode(
        &self,
        state: &mut DecodeState<'_>,
        param: &str,
    ) -> Result<OdxValue, CodecError> {
        let internal = self.diag_coded_type.decode(state)?;
        self.check_constraint(&internal, param);
        Ok(self.compu_method.internal_to_physical(&internal)?)
    }

    pub fn encode(
        &self,
        physical: &OdxValue,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        let internal = self.compu_method.physical_to_internal(physical)?;
        self.check_constraint(&internal, param);
        self.diag_coded_type.encode(&internal, state, param)
    }

    fn check_constraint(&self, internal: &OdxValue, param: &str) {
        if let Some((lower, upper)) = &self.internal_constraint
            && (!lower.complies_to_lower(internal) || !upper.complies_to_upper(internal))
        {
            log::warn!(
                "Internal value {internal} of parameter '{param}' violates its internal constraint"
            );
        }
    }
}

/// Ordered parameter list with an optional fixed byte size.
#[derive(Debug, Clone)]
pub struct Structure {
    pub byte_size: Option<usize>,
    pub params: Vec<Parameter>,
}

impl Structure {
    /// Decode all parameters relative to a fresh origin at the cursor.
    pub fn decode(
        &self,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
    ) -> Result<ParamValue, CodecError> {
        let outer_origin = state.origin_byte;
        state.origin_byte = state.cursor_byte;
        let result = param::decode_param_list(&self.params, scope, state);
        if let Some(byte_size) = self.byte_size {
            state.cursor_byte = state.origin_byte + byte_size;
        }
        state.origin_byte = outer_origin;
        result
    }

    pub fn encode(
        &self,
        value: &ParamValue,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
    ) -> Result<(), CodecError> {
        let outer_origin = state.origin_byte;
        state.origin_byte = state.cursor_byte;
        let result = param::encode_param_list(&self.params, value, scope, state);
        if let Some(byte_size) = self.byte_size {
            let end = state.origin_byte + byte_size;
            if state.coded.len() > end {
                return Err(CodecError::ValueOutOfRange {
                    param: String::new(),
                    reason: format!("structure exceeds its declared byte size of {byte_size}"),
                });
            }
            state.coded.resize(end, 0);
            state.used_mask.resize(end, 0);
            state.cursor_byte = end;
        }
        state.origin_byte = outer_origin;
        result
    }
}

/// STATIC-FIELD: a fixed number of equally sized repetitions.
#[derive(Debug, Clone)]
pub struct StaticField {
    pub structure: Link<Dop>,
    pub fixed_number_of_items: usize,
    pub item_byte_size: usize,
}

/// DYNAMIC-LENGTH-FIELD: an item count read from the message governs the
/// number of repetitions.
#[derive(Debug, Clone)]
pub struct DynamicLengthField {
    pub structure: Link<Dop>,
    /// Byte offset of the first item, relative to the field origin.
    pub offset: usize,
    /// Where and how the item count is coded, relative to the field origin.
    pub count_byte_position: usize,
    pub count_dop: Link<Dop>,
}

/// END-OF-PDU-FIELD: repetitions until the buffer is exhausted.
#[derive(Debug, Clone)]
pub struct EndOfPduField {
    pub structure: Link<Dop>,
    pub min_number_of_items: Option<usize>,
    pub max_number_of_items: Option<usize>,
}

/// One alternative of a multiplexer.
#[derive(Debug, Clone)]
pub struct MuxCase {
    pub short_name: String,
    pub lower_limit: Limit,
    pub upper_limit: Limit,
    pub structure: Option<Link<Dop>>,
}

/// MUX: a switch key decoded at a fixed position selects which case
/// structure applies.
#[derive(Debug, Clone)]
pub struct Mux {
    /// Byte position of the case data, relative to the mux origin.
    pub byte_position: usize,
    pub switch_key_byte_position: usize,
    pub switch_key_bit_position: u8,
    pub switch_key_dop: Link<Dop>,
    pub default_case: Option<MuxCase>,
    pub cases: Vec<MuxCase>,
}

impl Mux {
    fn select_case(&self, key: &OdxValue) -> Option<&MuxCase> {
        self.cases
            .iter()
            .find(|c| c.lower_limit.complies_to_lower(key) && c.upper_limit.complies_to_upper(key))
            .or(self.default_case.as_ref())
    }

    fn case_by_name(&self, name: &str) -> Option<&MuxCase> {
        self.cases
            .iter()
            .chain(self.default_case.as_ref())
            .find(|c| c.short_name == name)
    }
}

/// Everything a DOP-REF/DOP-SNREF may point at.
#[derive(Debug, Clone)]
pub enum DopKind {
    Normal(DataObjectProp),
    Structure(Structure),
    StaticField(StaticField),
    DynamicLength(DynamicLengthField),
    EndOfPdu(EndOfPduField),
    Mux(Mux),
}

#[derive(Debug, Clone)]
pub struct Dop {
    pub id: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub kind: DopKind,
}

impl Dop {
    pub fn decode(
        &self,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
        param: &str,
    ) -> Result<ParamValue, CodecError> {
        match &self.kind {
            DopKind::Normal(dop) => dop.decode(state, param).map(ParamValue::Atomic),
            DopKind::Structure(structure) => structure.decode(scope, state),
            DopKind::StaticField(field) => self.decode_static(field, scope, state, param),
            DopKind::DynamicLength(field) => self.decode_dynamic(field, scope, state, param),
            DopKind::EndOfPdu(field) => self.decode_end_of_pdu(field, scope, state, param),
            DopKind::Mux(mux) => self.decode_mux(mux, scope, state, param),
        }
    }

    pub fn encode(
        &self,
        value: &ParamValue,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        match &self.kind {
            DopKind::Normal(dop) => match value {
                ParamValue::Atomic(v) => dop.encode(v, state, param),
                other => Err(type_error(param, "an atomic value", other)),
            },
            DopKind::Structure(structure) => structure.encode(value, scope, state),
            DopKind::StaticField(field) => self.encode_static(field, value, scope, state, param),
            DopKind::DynamicLength(field) => self.encode_dynamic(field, value, scope, state, param),
            DopKind::EndOfPdu(field) => self.encode_end_of_pdu(field, value, scope, state, param),
            DopKind::Mux(mux) => self.encode_mux(mux, value, scope, state, param),
        }
    }

    fn decode_static(
        &self,
        field: &StaticField,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
        param: &str,
    ) -> Result<ParamValue, CodecError> {
        let item = scope.dop_by_link(&field.structure)?;
        let mut items = Vec::with_capacity(field.fixed_number_of_items);
        for _ in 0..field.fixed_number_of_items {
            let item_start = state.cursor_byte;
            items.push(item.decode(scope, state, param)?);
            if state.cursor_byte > item_start + field.item_byte_size {
                return Err(CodecError::ValueOutOfRange {
                    param: param.into(),
                    reason: format!(
                        "item occupies more than its declared {} bytes",
                        field.item_byte_size
                    ),
                });
            }
            state.cursor_byte = item_start + field.item_byte_size;
            state.cursor_bit = 0;
        }
        Ok(ParamValue::List(items))
    }

    fn encode_static(
        &self,
        field: &StaticField,
        value: &ParamValue,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        let ParamValue::List(items) = value else {
            return Err(type_error(param, "a list of items", value));
        };
        if items.len() != field.fixed_number_of_items {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: format!(
                    "{} items supplied for a field of exactly {}",
                    items.len(),
                    field.fixed_number_of_items
                ),
            });
        }
        let item_dop = scope.dop_by_link(&field.structure)?;
        for item in items {
            let item_start = state.cursor_byte;
            item_dop.encode(item, scope, state, param)?;
            let end = item_start + field.item_byte_size;
            if state.coded.len() > end {
                return Err(CodecError::ValueOutOfRange {
                    param: param.into(),
                    reason: format!(
                        "item occupies more than its declared {} bytes",
                        field.item_byte_size
                    ),
                });
            }
            state.coded.resize(end, 0);
            state.used_mask.resize(end, 0);
            state.cursor_byte = end;
            state.cursor_bit = 0;
        }
        Ok(())
    }

    fn decode_dynamic(
        &self,
        field: &DynamicLengthField,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
        param: &str,
    ) -> Result<ParamValue, CodecError> {
        let outer_origin = state.origin_byte;
        state.origin_byte = state.cursor_byte;

        state.cursor_byte = state.origin_byte + field.count_byte_position;
        let count_dop = scope.dop_by_link(&field.count_dop)?;
        let count_value = count_dop.decode(scope, state, param)?;
        let count = count_value
            .as_atomic()
            .and_then(OdxValue::as_u64)
            .ok_or_else(|| CodecError::ValueOutOfRange {
                param: param.into(),
                reason: "item count is not an unsigned integer".into(),
            })? as usize;
        if count > scope.max_field_items() {
            return Err(CodecError::TooManyItems {
                field: param.into(),
                limit: scope.max_field_items(),
            });
        }

        state.cursor_byte = state.origin_byte + field.offset;
        state.cursor_bit = 0;
        let item_dop = scope.dop_by_link(&field.structure)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(item_dop.decode(scope, state, param)?);
        }
        state.origin_byte = outer_origin;
        Ok(ParamValue::List(items))
    }

    fn encode_dynamic(
        &self,
        field: &DynamicLengthField,
        value: &ParamValue,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        let ParamValue::List(items) = value else {
            return Err(type_error(param, "a list of items", value));
        };
        let outer_origin = state.origin_byte;
        state.origin_byte = state.cursor_byte;

        state.cursor_byte = state.origin_byte + field.count_byte_position;
        let count_dop = scope.dop_by_link(&field.count_dop)?;
        count_dop.encode(
            &ParamValue::Atomic(OdxValue::Integer(items.len() as i64)),
            scope,
            state,
            param,
        )?;

        state.cursor_byte = state.origin_byte + field.offset;
        state.cursor_bit = 0;
        let item_dop = scope.dop_by_link(&field.structure)?;
        for item in items {
            item_dop.encode(item, scope, state, param)?;
        }
        state.origin_byte = outer_origin;
        Ok(())
    }

    fn decode_end_of_pdu(
        &self,
        field: &EndOfPduField,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
        param: &str,
    ) -> Result<ParamValue, CodecError> {
        let item_dop = scope.dop_by_link(&field.structure)?;
        let mut items = Vec::new();
        while state.cursor_byte < state.data.len() {
            if items.len() >= scope.max_field_items() {
                return Err(CodecError::TooManyItems {
                    field: param.into(),
                    limit: scope.max_field_items(),
                });
            }
            if let Some(max) = field.max_number_of_items
                && items.len() >= max
            {
                break;
            }
            items.push(item_dop.decode(scope, state, param)?);
        }
        if let Some(min) = field.min_number_of_items
            && items.len() < min
        {
            return Err(CodecError::BufferUnderrun {
                needed: state.cursor_byte + 1,
                available: state.data.len(),
            });
        }
        Ok(ParamValue::List(items))
    }

    fn encode_end_of_pdu(
        &self,
        field: &EndOfPduField,
        value: &ParamValue,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        let ParamValue::List(items) = value else {
            return Err(type_error(param, "a list of items", value));
        };
        if !state.is_end_of_pdu {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: "end-of-pdu field is not at the end of the PDU".into(),
            });
        }
        if let Some(max) = field.max_number_of_items
            && items.len() > max
        {
            return Err(CodecError::TooManyItems {
                field: param.into(),
                limit: max,
            });
        }
        let item_dop = scope.dop_by_link(&field.structure)?;
        let was_end = state.is_end_of_pdu;
        for (i, item) in items.iter().enumerate() {
            state.is_end_of_pdu = was_end && i + 1 == items.len();
            item_dop.encode(item, scope, state, param)?;
        }
        state.is_end_of_pdu = was_end;
        Ok(())
    }

    fn decode_mux(
        &self,
        mux: &Mux,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
        param: &str,
    ) -> Result<ParamValue, CodecError> {
        let outer_origin = state.origin_byte;
        state.origin_byte = state.cursor_byte;

        state.cursor_byte = state.origin_byte + mux.switch_key_byte_position;
        state.cursor_bit = mux.switch_key_bit_position;
        let key_dop = scope.dop_by_link(&mux.switch_key_dop)?;
        let key = match key_dop.decode(scope, state, param)? {
            ParamValue::Atomic(v) => v,
            other => {
                return Err(type_error(param, "an atomic switch key", &other));
            }
        };
        let key_end = state.cursor_byte;

        let case = mux.select_case(&key).ok_or_else(|| CodecError::InvalidTableKey {
            table: self.short_name.clone(),
            key: key.to_string(),
        })?;

        let value = if let Some(structure) = &case.structure {
            state.cursor_byte = state.origin_byte + mux.byte_position;
            state.cursor_bit = 0;
            scope.dop_by_link(structure)?.decode(scope, state, param)?
        } else {
            ParamValue::Struct(Vec::new())
        };
        state.cursor_byte = state.cursor_byte.max(key_end);
        state.origin_byte = outer_origin;
        Ok(ParamValue::Selected {
            name: case.short_name.clone(),
            value: Box::new(value),
        })
    }

    fn encode_mux(
        &self,
        mux: &Mux,
        value: &ParamValue,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        let ParamValue::Selected { name, value } = value else {
            return Err(type_error(param, "a selected case", value));
        };
        let case = mux
            .case_by_name(name)
            .ok_or_else(|| CodecError::InvalidTableKey {
                table: self.short_name.clone(),
                key: name.clone(),
            })?;
        // The case's lower limit doubles as the switch key on encode.
        let key = case
            .lower_limit
            .value
            .clone()
            .ok_or_else(|| CodecError::MissingRequiredValue {
                param: format!("{param}.{name}"),
            })?;

        let outer_origin = state.origin_byte;
        state.origin_byte = state.cursor_byte;

        state.cursor_byte = state.origin_byte + mux.switch_key_byte_position;
        state.cursor_bit = mux.switch_key_bit_position;
        let key_dop = scope.dop_by_link(&mux.switch_key_dop)?;
        key_dop.encode(&ParamValue::Atomic(key), scope, state, param)?;
        let key_end = state.cursor_byte;

        if let Some(structure) = &case.structure {
            state.cursor_byte = state.origin_byte + mux.byte_position;
            state.cursor_bit = 0;
            scope
                .dop_by_link(structure)?
                .encode(value, scope, state, param)?;
        }
        state.cursor_byte = state.cursor_byte.max(key_end);
        state.origin_byte = outer_origin;
        Ok(())
    }
}

fn type_error(param: &str, expected: &str, got: &ParamValue) -> CodecError {
    CodecError::ValueOutOfRange {
        param: param.into(),
        reason: format!("expected {expected}, got {}", got.kind_name()),
    }
}
