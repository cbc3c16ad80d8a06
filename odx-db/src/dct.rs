//! DIAG-CODED-TYPE: the leaf codec mapping internal values to wire bits.

use odx_model::raw::RawDiagCodedType;

use crate::error::{CodecError, LoadError};
use crate::state::{self, DecodeState, EncodeState};
use crate::value::{DataType, OdxValue};

/// Terminator of a MIN-MAX-LENGTH-TYPE value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Zero,
    HexFf,
    EndOfPdu,
}

impl Termination {
    pub fn from_odx_name(name: &str) -> Option<Self> {
        match name {
            "ZERO" => Some(Self::Zero),
            "HEX-FF" => Some(Self::HexFf),
            "END-OF-PDU" => Some(Self::EndOfPdu),
            _ => None,
        }
    }

    /// The terminator byte sequence on the wire. Two bytes for UTF-16
    /// strings, one byte otherwise; END-OF-PDU has none.
    fn sequence(self, data_type: DataType) -> &'static [u8] {
        match (self, data_type) {
            (Self::Zero, DataType::Unicode2String) => &[0x00, 0x00],
            (Self::Zero, _) => &[0x00],
            (Self::HexFf, DataType::Unicode2String) => &[0xff, 0xff],
            (Self::HexFf, _) => &[0xff],
            (Self::EndOfPdu, _) => &[],
        }
    }
}

/// The length discipline of a diag-coded type.
#[derive(Debug, Clone, PartialEq)]
pub enum DctKind {
    /// Fixed bit length; an optional BIT-MASK restricts which of those
    /// bits carry the value.
    StandardLength { bit_length: u32, bit_mask: Option<u64> },
    /// A `bit_length`-bit unsigned byte count, immediately followed by
    /// that many payload bytes.
    LeadingLengthInfo { bit_length: u32 },
    /// Variable length between `min_length` and `max_length` bytes,
    /// delimited by a terminator sequence, the maximum length or the end
    /// of the PDU.
    MinMaxLength {
        min_length: usize,
        max_length: Option<usize>,
        termination: Termination,
    },
    /// Bit length supplied at runtime by a LENGTH-KEY parameter,
    /// identified here by that parameter's short name.
    ParamLengthInfo { length_key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagCodedType {
    pub base_data_type: DataType,
    pub is_highlow_byte_order: bool,
    pub kind: DctKind,
}

impl DiagCodedType {
    pub fn standard(base_data_type: DataType, bit_length: u32) -> Self {
        Self {
            base_data_type,
            is_highlow_byte_order: true,
            kind: DctKind::StandardLength {
                bit_length,
                bit_mask: None,
            },
        }
    }

    /// Build from the raw XML element. The LENGTH-KEY-REF is left as the
    /// raw id here; the resolver swaps it for the key parameter's short
    /// name afterwards.
    pub fn from_raw(raw: &RawDiagCodedType) -> Result<Self, LoadError> {
        let base_name = raw
            .base_data_type
            .as_deref()
            .ok_or_else(|| LoadError::MissingElement("BASE-DATA-TYPE attribute".into()))?;
        let base_data_type = DataType::from_odx_name(base_name).ok_or_else(|| {
            LoadError::MalformedTypeDescriptor(format!("unknown BASE-DATA-TYPE '{base_name}'"))
        })?;
        let is_highlow_byte_order = raw.is_highlow_byte_order.as_deref() != Some("false");
        let xsi_type = raw
            .xsi_type
            .as_deref()
            .ok_or_else(|| LoadError::MissingElement("xsi:type of DIAG-CODED-TYPE".into()))?;

        let kind = match xsi_type {
            "STANDARD-LENGTH-TYPE" => {
                let bit_length = raw.bit_length.ok_or_else(|| {
                    LoadError::MissingElement("BIT-LENGTH of STANDARD-LENGTH-TYPE".into())
                })?;
                let bit_mask = raw
                    .bit_mask
                    .as_deref()
                    .map(|hex| {
                        u64::from_str_radix(hex.trim(), 16).map_err(|_| {
                            LoadError::MalformedTypeDescriptor(format!(
                                "'{hex}' is not a valid BIT-MASK"
                            ))
                        })
                    })
                    .transpose()?;
                DctKind::StandardLength {
                    bit_length,
                    bit_mask,
                }
            }
            "LEADING-LENGTH-INFO-TYPE" => {
                let bit_length = raw.bit_length.ok_or_else(|| {
                    LoadError::MissingElement("BIT-LENGTH of LEADING-LENGTH-INFO-TYPE".into())
                })?;
                if bit_length == 0 {
                    return Err(LoadError::MalformedTypeDescriptor(
                        "LEADING-LENGTH-INFO-TYPE with zero-bit length specifier".into(),
                    ));
                }
                DctKind::LeadingLengthInfo { bit_length }
            }
            "MIN-MAX-LENGTH-TYPE" => {
                let min_length = raw.min_length.ok_or_else(|| {
                    LoadError::MissingElement("MIN-LENGTH of MIN-MAX-LENGTH-TYPE".into())
                })? as usize;
                let termination_str = raw.termination.as_deref().ok_or_else(|| {
                    LoadError::MissingElement("TERMINATION of MIN-MAX-LENGTH-TYPE".into())
                })?;
                let termination = Termination::from_odx_name(termination_str).ok_or_else(|| {
                    LoadError::MalformedTypeDescriptor(format!(
                        "unknown TERMINATION '{termination_str}'"
                    ))
                })?;
                let max_length = raw.max_length.map(|m| m as usize);
                if let Some(max) = max_length
                    && max < min_length
                {
                    return Err(LoadError::MalformedTypeDescriptor(format!(
                        "MAX-LENGTH {max} below MIN-LENGTH {min_length}"
                    )));
                }
                if base_data_type.is_numeric() {
                    return Err(LoadError::MalformedTypeDescriptor(format!(
                        "MIN-MAX-LENGTH-TYPE cannot carry {}",
                        base_data_type.odx_name()
                    )));
                }
                DctKind::MinMaxLength {
                    min_length,
                    max_length,
                    termination,
                }
            }
            "PARAM-LENGTH-INFO-TYPE" => {
                let length_key = raw
                    .length_key_ref
                    .as_ref()
                    .and_then(|r| r.id_ref.clone())
                    .ok_or_else(|| {
                        LoadError::MissingElement("LENGTH-KEY-REF of PARAM-LENGTH-INFO-TYPE".into())
                    })?;
                DctKind::ParamLengthInfo { length_key }
            }
            other => {
                return Err(LoadError::MalformedTypeDescriptor(format!(
                    "unknown DIAG-CODED-TYPE variant '{other}'"
                )));
            }
        };

        Ok(Self {
            base_data_type,
            is_highlow_byte_order,
            kind,
        })
    }

    /// Bit length if it can be determined without looking at a message.
    pub fn static_bit_length(&self) -> Option<u32> {
        match &self.kind {
            DctKind::StandardLength { bit_length, .. } => Some(*bit_length),
            _ => None,
        }
    }

    pub fn decode(&self, state: &mut DecodeState<'_>) -> Result<OdxValue, CodecError> {
        match &self.kind {
            DctKind::StandardLength {
                bit_length,
                bit_mask,
            } => {
                let value = state.extract_atomic(
                    *bit_length,
                    self.base_data_type,
                    self.is_highlow_byte_order,
                )?;
                Ok(apply_bit_mask(value, *bit_mask))
            }
            DctKind::LeadingLengthInfo { bit_length } => {
                let length =
                    state.extract_atomic(*bit_length, DataType::UInt32, self.is_highlow_byte_order)?;
                let byte_length = length.as_u64().unwrap_or(0);
                // The declared length is untrusted input; reject it
                // against the remaining buffer before it becomes a bit
                // count.
                if byte_length > state.remaining() as u64 {
                    return Err(CodecError::BufferUnderrun {
                        needed: state
                            .cursor_byte
                            .saturating_add(usize::try_from(byte_length).unwrap_or(usize::MAX)),
                        available: state.data.len(),
                    });
                }
                state.extract_atomic(
                    8 * byte_length as u32,
                    self.base_data_type,
                    self.is_highlow_byte_order,
                )
            }
            DctKind::MinMaxLength {
                min_length,
                max_length,
                termination,
            } => self.decode_min_max(state, *min_length, *max_length, *termination),
            DctKind::ParamLengthInfo { length_key } => {
                let bit_length = *state.length_keys.get(length_key).ok_or_else(|| {
                    CodecError::MissingRequiredValue {
                        param: length_key.clone(),
                    }
                })?;
                state.extract_atomic(bit_length, self.base_data_type, self.is_highlow_byte_order)
            }
        }
    }

    fn decode_min_max(
        &self,
        state: &mut DecodeState<'_>,
        min_length: usize,
        max_length: Option<usize>,
        termination: Termination,
    ) -> Result<OdxValue, CodecError> {
        let start = state.cursor_byte;
        if start + min_length > state.data.len() {
            return Err(CodecError::BufferUnderrun {
                needed: start + min_length,
                available: state.data.len(),
            });
        }

        let mut limit = state.data.len();
        if let Some(max) = max_length {
            limit = limit.min(start + max);
        }

        let terminator = termination.sequence(self.base_data_type);
        let byte_length = if terminator.is_empty() {
            // END-OF-PDU: runs to the max length or the end of the buffer.
            limit - start
        } else {
            // The terminator must be aligned to its own width relative to
            // the start of the value (a stray odd-positioned 0x0000 inside
            // a UTF-16 string is payload, not a terminator).
            let mut pos = start + min_length;
            loop {
                match find_subslice(&state.data[..limit], terminator, pos) {
                    None => break limit - start,
                    Some(found) if (found - start) % terminator.len() == 0 => break found - start,
                    Some(found) => pos = found + 1,
                }
            }
        };

        let value = state.extract_atomic(
            8 * byte_length as u32,
            self.base_data_type,
            self.is_highlow_byte_order,
        )?;

        // Skip the terminator unless the value already ended at the end of
        // the PDU or at its maximum length.
        if state.cursor_byte != state.data.len() && Some(byte_length) != max_length {
            state.cursor_byte += terminator.len();
        }
        Ok(value)
    }

    pub fn encode(
        &self,
        value: &OdxValue,
        state: &mut EncodeState,
        param: &str,
    ) -> Result<(), CodecError> {
        match &self.kind {
            DctKind::StandardLength {
                bit_length,
                bit_mask,
            } => {
                let masked = apply_bit_mask(value.clone(), *bit_mask);
                state.emplace_atomic(
                    &masked,
                    *bit_length,
                    self.base_data_type,
                    self.is_highlow_byte_order,
                    param,
                )
            }
            DctKind::LeadingLengthInfo { bit_length } => {
                let bytes = state::value_to_bytes(
                    value,
                    self.base_data_type,
                    self.is_highlow_byte_order,
                    param,
                )?;
                state.emplace_atomic(
                    &OdxValue::Integer(bytes.len() as i64),
                    *bit_length,
                    DataType::UInt32,
                    self.is_highlow_byte_order,
                    param,
                )?;
                state.emplace_bytes(&bytes, param)
            }
            DctKind::MinMaxLength {
                min_length,
                max_length,
                termination,
            } => self.encode_min_max(value, state, *min_length, *max_length, *termination, param),
            DctKind::ParamLengthInfo { length_key } => {
                let bit_length = match state.length_keys.get(length_key) {
                    Some(bits) => *bits,
                    None => {
                        // No explicit value was given for the length key;
                        // derive it from the payload and let the key
                        // parameter pick it up when its slot is patched.
                        let bits = implicit_bit_length(value, self.base_data_type, param)?;
                        state.length_keys.insert(length_key.clone(), bits);
                        bits
                    }
                };
                state.emplace_atomic(
                    value,
                    bit_length,
                    self.base_data_type,
                    self.is_highlow_byte_order,
                    param,
                )
            }
        }
    }

    fn encode_min_max(
        &self,
        value: &OdxValue,
        state: &mut EncodeState,
        min_length: usize,
        max_length: Option<usize>,
        termination: Termination,
        param: &str,
    ) -> Result<(), CodecError> {
        let bytes = state::value_to_bytes(
            value,
            self.base_data_type,
            self.is_highlow_byte_order,
            param,
        )?;
        if bytes.len() < min_length {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: format!(
                    "{} bytes below the minimum length of {min_length}",
                    bytes.len()
                ),
            });
        }
        if let Some(max) = max_length
            && bytes.len() > max
        {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: format!("{} bytes above the maximum length of {max}", bytes.len()),
            });
        }
        if termination == Termination::EndOfPdu && !state.is_end_of_pdu {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: "END-OF-PDU terminated value is not at the end of the PDU".into(),
            });
        }
        state.emplace_bytes(&bytes, param)?;

        // The terminator is dropped when the value ends with the PDU or
        // fills the maximum length.
        if !state.is_end_of_pdu && Some(bytes.len()) != max_length {
            state.emplace_bytes(termination.sequence(self.base_data_type), param)?;
        }
        Ok(())
    }
}

/// Bit length a PARAM-LENGTH-INFO payload implies when the length key has
/// no explicitly requested value.
fn implicit_bit_length(
    value: &OdxValue,
    data_type: DataType,
    param: &str,
) -> Result<u32, CodecError> {
    let bits = match (value, data_type) {
        (OdxValue::Bytes(b), _) => 8 * b.len() as u32,
        (OdxValue::String(s), DataType::Unicode2String) => {
            16 * s.encode_utf16().count() as u32
        }
        (OdxValue::String(s), _) => 8 * s.len() as u32,
        (OdxValue::Integer(v), _) => {
            let significant = if *v >= 0 {
                64 - v.leading_zeros()
            } else {
                65 - v.leading_ones()
            };
            significant.div_ceil(8) * 8
        }
        (OdxValue::Float(_), DataType::Float32) => 32,
        (OdxValue::Float(_), DataType::Float64) => 64,
        (OdxValue::Float(_), _) => {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: "float value for a non-float coded type".into(),
            });
        }
    };
    Ok(bits.max(8))
}

fn apply_bit_mask(value: OdxValue, bit_mask: Option<u64>) -> OdxValue {
    let Some(mask) = bit_mask else {
        return value;
    };
    match value {
        OdxValue::Integer(v) => OdxValue::Integer(((v as u64) & mask) as i64),
        OdxValue::Bytes(bytes) => {
            let mut masked = bytes;
            let n = masked.len();
            for (i, b) in masked.iter_mut().enumerate() {
                let shift = 8 * (n - 1 - i);
                if shift < 64 {
                    *b &= ((mask >> shift) & 0xff) as u8;
                }
            }
            OdxValue::Bytes(masked)
        }
        other => other,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
