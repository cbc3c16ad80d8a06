//! Positioned request/response parameters and the list-walking codec.

use crate::database::CodecScope;
use crate::dct::DiagCodedType;
use crate::dop::{Dop, DopKind};
use crate::error::CodecError;
use crate::handles::Link;
use crate::state::{DecodeState, EncodeState, LengthKeySlot};
use crate::table::Table;
use crate::value::{DataType, OdxValue};

/// A decoded (or to-be-encoded) value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Atomic(OdxValue),
    /// Parameter name to value, in declaration order.
    Struct(Vec<(String, ParamValue)>),
    /// Items of a repeating field.
    List(Vec<ParamValue>),
    /// A mux case or table row selected by name.
    Selected { name: String, value: Box<ParamValue> },
}

impl ParamValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Atomic(_) => "atomic value",
            Self::Struct(_) => "structure",
            Self::List(_) => "list",
            Self::Selected { .. } => "selection",
        }
    }

    pub fn as_atomic(&self) -> Option<&OdxValue> {
        match self {
            Self::Atomic(v) => Some(v),
            _ => None,
        }
    }

    /// Field lookup on a structure value.
    pub fn field(&self, name: &str) -> Option<&ParamValue> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// How a parameter obtains a DOP.
#[derive(Debug, Clone)]
pub enum DopRef {
    Id(Link<Dop>),
    /// DOP-SNREF, resolved by short name in the effective layer.
    Name(String),
}

#[derive(Debug, Clone)]
pub enum TableRef {
    Id(Link<Table>),
    Name(String),
}

/// The closed set of parameter variants.
#[derive(Debug, Clone)]
pub enum ParamKind {
    /// Fixed coded value; decode-side mismatch identifies a
    /// non-applicable service definition.
    CodedConst {
        diag_coded_type: DiagCodedType,
        coded_value: OdxValue,
    },
    /// A set of permitted constant values (negative response codes).
    NrcConst {
        diag_coded_type: DiagCodedType,
        coded_values: Vec<OdxValue>,
    },
    /// Free value coded through a DOP.
    Value {
        dop: DopRef,
        physical_default: Option<OdxValue>,
    },
    /// Constant expressed in physical representation.
    PhysConst { dop: DopRef, constant: OdxValue },
    /// Filler bits, encoded as zero and skipped on decode.
    Reserved { bit_length: u32 },
    /// Bytes copied verbatim from the triggering request.
    MatchingRequest {
        request_byte_position: usize,
        byte_length: usize,
    },
    /// Value supplied by the runtime environment (SYSPARAM).
    System { dop: DopRef, sysparam: String },
    /// Carries the bit length of a PARAM-LENGTH-INFO coded payload.
    LengthKey { dop: DopRef },
    /// Selects a table row; the decoded physical value is the row name.
    TableKey { table: TableRef },
    /// Payload governed by the row selected by a TABLE-KEY parameter.
    TableStruct {
        /// Short name of the key parameter.
        table_key: String,
        table: TableRef,
    },
    /// DYNAMIC parameters have no statically known layout.
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub short_name: String,
    pub long_name: Option<String>,
    pub semantic: Option<String>,
    /// Byte offset relative to the enclosing structure's origin; absent
    /// means "directly after the previous parameter".
    pub byte_position: Option<usize>,
    /// Bit offset from the LSB of the byte at the byte position.
    pub bit_position: u8,
    pub kind: ParamKind,
}

impl Parameter {
    /// Is this parameter usable as a service-identification pattern?
    pub fn is_pattern(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::CodedConst { .. } | ParamKind::NrcConst { .. }
        )
    }

    pub fn decode(
        &self,
        scope: &CodecScope<'_>,
        state: &mut DecodeState<'_>,
    ) -> Result<ParamValue, CodecError> {
        match &self.kind {
            ParamKind::CodedConst {
                diag_coded_type,
                coded_value,
            } => {
                let observed = diag_coded_type.decode(state)?;
                if observed != *coded_value {
                    return Err(CodecError::PatternMismatch {
                        param: self.short_name.clone(),
                    });
                }
                Ok(ParamValue::Atomic(observed))
            }
            ParamKind::NrcConst {
                diag_coded_type,
                coded_values,
            } => {
                let observed = diag_coded_type.decode(state)?;
                if !coded_values.contains(&observed) {
                    return Err(CodecError::PatternMismatch {
                        param: self.short_name.clone(),
                    });
                }
                Ok(ParamValue::Atomic(observed))
            }
            ParamKind::Value { dop, .. } | ParamKind::System { dop, .. } => {
                scope.dop(dop)?.decode(scope, state, &self.short_name)
            }
            ParamKind::PhysConst { dop, constant } => {
                let dop = scope.dop(dop)?;
                let constant = typed_constant(constant, dop);
                let value = dop.decode(scope, state, &self.short_name)?;
                if value.as_atomic() != Some(&constant) {
                    return Err(CodecError::PatternMismatch {
                        param: self.short_name.clone(),
                    });
                }
                Ok(value)
            }
            ParamKind::Reserved { bit_length } => {
                state.extract_atomic(*bit_length, DataType::UInt32, true)?;
                Ok(ParamValue::Atomic(OdxValue::Integer(0)))
            }
            ParamKind::MatchingRequest {
                request_byte_position,
                byte_length,
            } => {
                let request = state
                    .triggering_request
                    .ok_or(CodecError::MissingMatchingRequest)?;
                let end = request_byte_position + byte_length;
                if request.len() < end {
                    return Err(CodecError::ValueOutOfRange {
                        param: self.short_name.clone(),
                        reason: format!("triggering request is shorter than {end} bytes"),
                    });
                }
                let bytes = request[*request_byte_position..end].to_vec();
                // The parameter still occupies its bytes in this message.
                state.extract_atomic(8 * *byte_length as u32, DataType::ByteField, true)?;
                Ok(ParamValue::Atomic(OdxValue::Bytes(bytes)))
            }
            ParamKind::LengthKey { dop } => {
                let value = scope.dop(dop)?.decode(scope, state, &self.short_name)?;
                let bits = value
                    .as_atomic()
                    .and_then(OdxValue::as_u64)
                    .ok_or_else(|| CodecError::ValueOutOfRange {
                        param: self.short_name.clone(),
                        reason: "length key is not an unsigned integer".into(),
                    })?;
                state
                    .length_keys
                    .insert(self.short_name.clone(), bits as u32);
                Ok(value)
            }
            ParamKind::TableKey { table } => {
                let table = scope.table(table)?;
                let key_dop = scope.dop_by_link(&table.key_dop)?;
                let key = key_dop
                    .decode(scope, state, &self.short_name)?
                    .as_atomic()
                    .cloned()
                    .ok_or_else(|| CodecError::ValueOutOfRange {
                        param: self.short_name.clone(),
                        reason: "table key is not an atomic value".into(),
                    })?;
                let row = table.row_by_key(scope.table_rows(), &key)?;
                state
                    .table_keys
                    .insert(self.short_name.clone(), row.short_name.clone());
                Ok(ParamValue::Atomic(OdxValue::String(row.short_name.clone())))
            }
            ParamKind::TableStruct { table_key, table } => {
                let row_name = state.table_keys.get(table_key).cloned().ok_or_else(|| {
                    CodecError::MissingRequiredValue {
                        param: table_key.clone(),
                    }
                })?;
                let table = scope.table(table)?;
                let row = table.row_by_name(scope.table_rows(), &row_name)?;
                let value = match &row.structure {
                    Some(link) => scope
                        .dop_by_link(link)?
                        .decode(scope, state, &self.short_name)?,
                    None => ParamValue::Struct(Vec::new()),
                };
                Ok(ParamValue::Selected {
                    name: row_name,
                    value: Box::new(value),
                })
            }
            ParamKind::Dynamic => Err(CodecError::ValueOutOfRange {
                param: self.short_name.clone(),
                reason: "DYNAMIC parameters are not supported".into(),
            }),
        }
    }

    pub fn encode(
        &self,
        value: Option<&ParamValue>,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
    ) -> Result<(), CodecError> {
        let name = &self.short_name;
        match &self.kind {
            ParamKind::CodedConst {
                diag_coded_type,
                coded_value,
            } => {
                // An explicit value must agree with the constant; the
                // constant is never silently overridden.
                if let Some(v) = value
                    && v.as_atomic() != Some(coded_value)
                {
                    return Err(CodecError::ValueOutOfRange {
                        param: name.clone(),
                        reason: "value conflicts with the declared constant".into(),
                    });
                }
                diag_coded_type.encode(coded_value, state, name)
            }
            ParamKind::NrcConst {
                diag_coded_type,
                coded_values,
            } => {
                let chosen = match value {
                    Some(v) => v.as_atomic().filter(|a| coded_values.contains(*a)).ok_or_else(
                        || CodecError::ValueOutOfRange {
                            param: name.clone(),
                            reason: "value is not one of the permitted constants".into(),
                        },
                    )?,
                    None => coded_values.first().ok_or_else(|| {
                        CodecError::MissingRequiredValue { param: name.clone() }
                    })?,
                };
                diag_coded_type.encode(chosen, state, name)
            }
            ParamKind::Value {
                dop,
                physical_default,
            } => {
                let dop = scope.dop(dop)?;
                let default;
                let v = match (value, physical_default) {
                    (Some(v), _) => v,
                    (None, Some(d)) => {
                        default = ParamValue::Atomic(typed_constant(d, dop));
                        &default
                    }
                    (None, None) => {
                        return Err(CodecError::MissingRequiredValue { param: name.clone() });
                    }
                };
                dop.encode(v, scope, state, name)
            }
            ParamKind::PhysConst { dop, constant } => {
                let dop = scope.dop(dop)?;
                let constant = typed_constant(constant, dop);
                if let Some(v) = value
                    && v.as_atomic() != Some(&constant)
                {
                    return Err(CodecError::ValueOutOfRange {
                        param: name.clone(),
                        reason: "value conflicts with the declared physical constant".into(),
                    });
                }
                dop.encode(&ParamValue::Atomic(constant), scope, state, name)
            }
            ParamKind::Reserved { bit_length } => state.emplace_atomic(
                &OdxValue::Integer(0),
                *bit_length,
                DataType::UInt32,
                true,
                name,
            ),
            ParamKind::MatchingRequest {
                request_byte_position,
                byte_length,
            } => {
                let request = state
                    .triggering_request
                    .take()
                    .ok_or(CodecError::MissingMatchingRequest)?;
                let end = request_byte_position + byte_length;
                if request.len() < end {
                    state.triggering_request = Some(request);
                    return Err(CodecError::ValueOutOfRange {
                        param: name.clone(),
                        reason: format!("triggering request is shorter than {end} bytes"),
                    });
                }
                let bytes = request[*request_byte_position..end].to_vec();
                state.triggering_request = Some(request);
                state.emplace_bytes(&bytes, name)
            }
            ParamKind::System { dop, .. } => {
                let v = value.ok_or_else(|| CodecError::MissingRequiredValue {
                    param: name.clone(),
                })?;
                scope.dop(dop)?.encode(v, scope, state, name)
            }
            ParamKind::LengthKey { dop } => self.encode_length_key(dop, value, scope, state),
            ParamKind::TableKey { table } => {
                let row_name = match value {
                    Some(ParamValue::Atomic(OdxValue::String(n))) => n.clone(),
                    Some(other) => {
                        return Err(CodecError::ValueOutOfRange {
                            param: name.clone(),
                            reason: format!("table row name expected, got {}", other.kind_name()),
                        });
                    }
                    // Without an explicit value the row selected by the
                    // associated TABLE-STRUCT parameter is used.
                    None => state.table_keys.get(name).cloned().ok_or_else(|| {
                        CodecError::MissingRequiredValue { param: name.clone() }
                    })?,
                };
                let table = scope.table(table)?;
                let row = table.row_by_name(scope.table_rows(), &row_name)?;
                state.table_keys.insert(name.clone(), row_name);
                let key_dop = scope.dop_by_link(&table.key_dop)?;
                key_dop.encode(&ParamValue::Atomic(row.key.clone()), scope, state, name)
            }
            ParamKind::TableStruct { table_key, table } => {
                let Some(ParamValue::Selected { name: row_name, value }) = value else {
                    return Err(CodecError::MissingRequiredValue { param: name.clone() });
                };
                let table = scope.table(table)?;
                let row = table.row_by_name(scope.table_rows(), row_name)?;
                state.table_keys.insert(table_key.clone(), row_name.clone());
                match &row.structure {
                    Some(link) => scope.dop_by_link(link)?.encode(value, scope, state, name),
                    None => Ok(()),
                }
            }
            ParamKind::Dynamic => Err(CodecError::ValueOutOfRange {
                param: name.clone(),
                reason: "DYNAMIC parameters are not supported".into(),
            }),
        }
    }

    /// A length key with an explicitly requested value is coded at once;
    /// otherwise a zeroed slot is recorded and patched once the described
    /// payload has established the length.
    fn encode_length_key(
        &self,
        dop: &DopRef,
        value: Option<&ParamValue>,
        scope: &CodecScope<'_>,
        state: &mut EncodeState,
    ) -> Result<(), CodecError> {
        let name = &self.short_name;
        let dop = scope.dop(dop)?;
        if let Some(v) = value {
            let bits = v.as_atomic().and_then(OdxValue::as_u64).ok_or_else(|| {
                CodecError::ValueOutOfRange {
                    param: name.clone(),
                    reason: "length key is not an unsigned integer".into(),
                }
            })?;
            state.length_keys.insert(name.clone(), bits as u32);
            return dop.encode(v, scope, state, name);
        }

        let DopKind::Normal(prop) = &dop.kind else {
            return Err(CodecError::ValueOutOfRange {
                param: name.clone(),
                reason: "length key DOP is not a simple data object property".into(),
            });
        };
        let bit_length = prop.diag_coded_type.static_bit_length().ok_or_else(|| {
            CodecError::ValueOutOfRange {
                param: name.clone(),
                reason: "length key DOP has no fixed bit length".into(),
            }
        })?;
        let slot = LengthKeySlot {
            byte_pos: state.cursor_byte,
            bit_pos: state.cursor_bit,
            bit_length,
            is_highlow: prop.diag_coded_type.is_highlow_byte_order,
        };
        state.emplace_atomic(&OdxValue::Integer(0), bit_length, DataType::UInt32, true, name)?;
        state.length_key_slots.insert(name.clone(), slot);
        Ok(())
    }
}

/// Constants reached through a DOP-SNREF stay textual at load time; the
/// physical type only becomes known here, once the short name has been
/// resolved against the effective layer.
fn typed_constant(constant: &OdxValue, dop: &Dop) -> OdxValue {
    if let (OdxValue::String(text), DopKind::Normal(prop)) = (constant, &dop.kind)
        && !matches!(
            prop.physical_type,
            DataType::AsciiString | DataType::Utf8String | DataType::Unicode2String
        )
        && let Ok(parsed) = prop.physical_type.value_from_str(text)
    {
        return parsed;
    }
    constant.clone()
}

/// Decode an ordered parameter list against the current origin.
///
/// The cursor ends at the furthest byte any parameter consumed, so
/// out-of-order explicit byte positions cannot truncate the walk.
pub(crate) fn decode_param_list(
    params: &[Parameter],
    scope: &CodecScope<'_>,
    state: &mut DecodeState<'_>,
) -> Result<ParamValue, CodecError> {
    let mut fields = Vec::with_capacity(params.len());
    let mut end = state.cursor_byte;
    for param in params {
        if let Some(bp) = param.byte_position {
            state.cursor_byte = state.origin_byte + bp;
        }
        state.cursor_bit = param.bit_position;
        let value = param.decode(scope, state)?;
        end = end.max(state.cursor_byte);
        fields.push((param.short_name.clone(), value));
    }
    state.cursor_byte = end;
    state.cursor_bit = 0;
    Ok(ParamValue::Struct(fields))
}

/// Encode an ordered parameter list from a structure value.
pub(crate) fn encode_param_list(
    params: &[Parameter],
    value: &ParamValue,
    scope: &CodecScope<'_>,
    state: &mut EncodeState,
) -> Result<(), CodecError> {
    let ParamValue::Struct(fields) = value else {
        return Err(CodecError::ValueOutOfRange {
            param: String::new(),
            reason: format!("structure value expected, got {}", value.kind_name()),
        });
    };
    for (name, _) in fields {
        if !params.iter().any(|p| p.short_name == *name) {
            return Err(CodecError::ValueOutOfRange {
                param: name.clone(),
                reason: "no parameter of this name exists".into(),
            });
        }
    }

    // Register table rows chosen through TABLE-STRUCT values up front, so
    // a TABLE-KEY parameter preceding its struct finds its row.
    for param in params {
        if let ParamKind::TableStruct { table_key, .. } = &param.kind
            && let Some(ParamValue::Selected { name, .. }) = value.field(&param.short_name)
        {
            state.table_keys.insert(table_key.clone(), name.clone());
        }
    }

    let was_end = state.is_end_of_pdu;
    let mut end = state.cursor_byte;
    for (i, param) in params.iter().enumerate() {
        state.is_end_of_pdu = was_end && i + 1 == params.len();
        if let Some(bp) = param.byte_position {
            state.cursor_byte = state.origin_byte + bp;
        }
        state.cursor_bit = param.bit_position;
        param.encode(value.field(&param.short_name), scope, state)?;
        end = end.max(state.cursor_byte);
    }
    state.is_end_of_pdu = was_end;
    state.cursor_byte = end;
    state.cursor_bit = 0;
    Ok(())
}

/// Back-patch every pending length-key slot from the lengths established
/// while encoding. Called once per top-level message.
pub(crate) fn patch_length_keys(state: &mut EncodeState) -> Result<(), CodecError> {
    let slots = std::mem::take(&mut state.length_key_slots);
    for (name, slot) in slots {
        let bits = *state
            .length_keys
            .get(&name)
            .ok_or_else(|| CodecError::MissingRequiredValue { param: name.clone() })?;
        state.patch_atomic(&slot, u64::from(bits), &name)?;
    }
    Ok(())
}
