//! Mutable cursor state threaded through encoding and decoding.
//!
//! Positions are split into an origin (the byte to which relative
//! positions refer, e.g. the start of the enclosing structure) and a
//! cursor (the next byte/bit to be produced or consumed). Bit positions
//! count from the least significant bit of the byte at the cursor.

use std::collections::HashMap;

use crate::error::CodecError;
use crate::value::{DataType, OdxValue};

/// Max number of bytes an atomic value may occupy (64 value bits plus a
/// 7-bit intra-byte shift).
const MAX_ATOMIC_BYTES: usize = 9;

fn bit_window(bit_length: u32, bit_position: u8) -> usize {
    (bit_length as usize + bit_position as usize).div_ceil(8)
}

/// Decoding cursor over a coded message.
#[derive(Debug)]
pub struct DecodeState<'a> {
    pub data: &'a [u8],
    pub origin_byte: usize,
    pub cursor_byte: usize,
    pub cursor_bit: u8,
    /// Bit lengths read from LENGTH-KEY parameters so far.
    pub length_keys: HashMap<String, u32>,
    /// Table rows selected by TABLE-KEY parameters so far, keyed by the
    /// key parameter's short name; the value is the row's short name.
    pub table_keys: HashMap<String, String>,
    /// The request these bytes respond to, for MATCHING-REQUEST-PARAM.
    pub triggering_request: Option<&'a [u8]>,
}

impl<'a> DecodeState<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            origin_byte: 0,
            cursor_byte: 0,
            cursor_bit: 0,
            length_keys: HashMap::new(),
            table_keys: HashMap::new(),
            triggering_request: None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor_byte)
    }

    /// Extract one atomic value of `bit_length` bits at the cursor.
    ///
    /// The value window is read big-endian; for numeric types with
    /// low-high byte order the window bytes are reversed first. The
    /// cursor advances to the first byte after the window and the bit
    /// position resets to zero.
    pub fn extract_atomic(
        &mut self,
        bit_length: u32,
        data_type: DataType,
        is_highlow: bool,
    ) -> Result<OdxValue, CodecError> {
        if bit_length == 0 {
            return Ok(empty_value(data_type));
        }

        let byte_length = bit_window(bit_length, self.cursor_bit);
        if self.cursor_byte + byte_length > self.data.len() {
            return Err(CodecError::BufferUnderrun {
                needed: self.cursor_byte + byte_length,
                available: self.data.len(),
            });
        }
        let mut window: Vec<u8> =
            self.data[self.cursor_byte..self.cursor_byte + byte_length].to_vec();
        if !is_highlow && data_type.is_numeric() {
            window.reverse();
        }

        let value = if data_type.is_numeric() || byte_length <= MAX_ATOMIC_BYTES {
            let mut acc: u128 = 0;
            for b in &window {
                acc = (acc << 8) | u128::from(*b);
            }
            let raw = (acc >> self.cursor_bit) & mask(bit_length);
            raw_to_value(raw, bit_length, data_type, is_highlow)?
        } else {
            // Long byte fields and strings must be byte aligned.
            if self.cursor_bit != 0 || bit_length % 8 != 0 {
                return Err(CodecError::ValueOutOfRange {
                    param: String::new(),
                    reason: "unaligned byte field or string".into(),
                });
            }
            bytes_to_value(window, data_type, is_highlow)
        };

        self.cursor_byte += byte_length;
        self.cursor_bit = 0;
        Ok(value)
    }
}

/// Encoding buffer plus bookkeeping.
#[derive(Debug, Default)]
pub struct EncodeState {
    pub coded: Vec<u8>,
    /// Bits of `coded` already claimed by some parameter; overlapping
    /// writes are OR-merged and flagged.
    pub used_mask: Vec<u8>,
    pub origin_byte: usize,
    pub cursor_byte: usize,
    pub cursor_bit: u8,
    /// True while the object being encoded sits at the very end of the
    /// PDU (controls min-max termination sequences and end-of-pdu
    /// repetition).
    pub is_end_of_pdu: bool,
    /// The request this response belongs to, for MATCHING-REQUEST-PARAM.
    pub triggering_request: Option<Vec<u8>>,
    /// Bit lengths for LENGTH-KEY parameters, established by the
    /// PARAM-LENGTH-INFO payloads they describe.
    pub length_keys: HashMap<String, u32>,
    /// Positions of length-key placeholders still awaiting their value.
    pub length_key_slots: HashMap<String, LengthKeySlot>,
    /// Table rows selected by TABLE-KEY/TABLE-STRUCT parameters, keyed by
    /// the key parameter's short name; the value is the row's short name.
    pub table_keys: HashMap<String, String>,
}

/// Where and how a LENGTH-KEY parameter was written, so its value can be
/// patched in once the described payload has been encoded.
#[derive(Debug, Clone)]
pub struct LengthKeySlot {
    pub byte_pos: usize,
    pub bit_pos: u8,
    pub bit_length: u32,
    pub is_highlow: bool,
}

impl EncodeState {
    pub fn new() -> Self {
        Self {
            is_end_of_pdu: true,
            ..Self::default()
        }
    }

    fn ensure_len(&mut self, len: usize) {
        if self.coded.len() < len {
            self.coded.resize(len, 0);
            self.used_mask.resize(len, 0);
        }
    }

    /// Append raw bytes at the cursor (byte aligned).
    pub fn emplace_bytes(&mut self, bytes: &[u8], param: &str) -> Result<(), CodecError> {
        if self.cursor_bit != 0 {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: "byte sequence must start on a byte boundary".into(),
            });
        }
        self.ensure_len(self.cursor_byte + bytes.len());
        for (i, b) in bytes.iter().enumerate() {
            let pos = self.cursor_byte + i;
            if self.used_mask[pos] & 0xff != 0 && *b != 0 {
                log::warn!("Overlapping parameters while encoding '{}'", param);
            }
            self.coded[pos] |= b;
            self.used_mask[pos] = 0xff;
        }
        self.cursor_byte += bytes.len();
        Ok(())
    }

    /// Pack one atomic value of `bit_length` bits at the cursor.
    ///
    /// Fails with `ValueOutOfRange` if the value does not fit the
    /// declared width; values are never silently truncated.
    pub fn emplace_atomic(
        &mut self,
        value: &OdxValue,
        bit_length: u32,
        data_type: DataType,
        is_highlow: bool,
        param: &str,
    ) -> Result<(), CodecError> {
        if bit_length == 0 {
            return Ok(());
        }

        if !data_type.is_numeric() {
            let bytes = value_to_bytes(value, data_type, is_highlow, param)?;
            let needed = (bit_length as usize).div_ceil(8);
            if bytes.len() > needed {
                return Err(CodecError::ValueOutOfRange {
                    param: param.into(),
                    reason: format!(
                        "{} bytes do not fit the declared {} bits",
                        bytes.len(),
                        bit_length
                    ),
                });
            }
            let mut padded = bytes;
            padded.resize(needed, 0);
            return self.emplace_bytes(&padded, param);
        }

        let raw = value_to_raw(value, bit_length, data_type, param)?;

        let byte_length = bit_window(bit_length, self.cursor_bit);
        let acc: u128 = raw << self.cursor_bit;
        let acc_mask: u128 = mask(bit_length) << self.cursor_bit;

        let mut window = vec![0u8; byte_length];
        let mut mask_window = vec![0u8; byte_length];
        for i in 0..byte_length {
            let shift = 8 * (byte_length - 1 - i);
            window[i] = ((acc >> shift) & 0xff) as u8;
            mask_window[i] = ((acc_mask >> shift) & 0xff) as u8;
        }
        if !is_highlow {
            window.reverse();
            mask_window.reverse();
        }

        self.ensure_len(self.cursor_byte + byte_length);
        for i in 0..byte_length {
            let pos = self.cursor_byte + i;
            if self.used_mask[pos] & mask_window[i] != 0 {
                log::warn!("Overlapping parameters while encoding '{}'", param);
            }
            self.coded[pos] |= window[i];
            self.used_mask[pos] |= mask_window[i];
        }

        self.cursor_byte += byte_length;
        self.cursor_bit = 0;
        Ok(())
    }

    /// Overwrite a previously written placeholder (used for LENGTH-KEY
    /// back-patching). The slot must have been written as zeros.
    pub fn patch_atomic(
        &mut self,
        slot: &LengthKeySlot,
        value: u64,
        param: &str,
    ) -> Result<(), CodecError> {
        if u128::from(value) > mask(slot.bit_length) {
            return Err(CodecError::ValueOutOfRange {
                param: param.into(),
                reason: format!("{} does not fit in {} bits", value, slot.bit_length),
            });
        }
        let byte_length = bit_window(slot.bit_length, slot.bit_pos);
        let acc: u128 = u128::from(value) << slot.bit_pos;
        for i in 0..byte_length {
            let shift = 8 * (byte_length - 1 - i);
            let pos = if slot.is_highlow {
                slot.byte_pos + i
            } else {
                slot.byte_pos + byte_length - 1 - i
            };
            self.coded[pos] |= ((acc >> shift) & 0xff) as u8;
        }
        Ok(())
    }
}

fn mask(bit_length: u32) -> u128 {
    if bit_length >= 128 {
        u128::MAX
    } else {
        (1u128 << bit_length) - 1
    }
}

fn empty_value(data_type: DataType) -> OdxValue {
    match data_type {
        DataType::Int32 | DataType::UInt32 => OdxValue::Integer(0),
        DataType::Float32 | DataType::Float64 => OdxValue::Float(0.0),
        DataType::ByteField => OdxValue::Bytes(Vec::new()),
        _ => OdxValue::String(String::new()),
    }
}

fn raw_to_value(
    raw: u128,
    bit_length: u32,
    data_type: DataType,
    is_highlow: bool,
) -> Result<OdxValue, CodecError> {
    match data_type {
        DataType::UInt32 => Ok(OdxValue::Integer(raw as i64)),
        DataType::Int32 => {
            // two's complement
            let sign_bit = 1u128 << (bit_length - 1);
            if raw < sign_bit {
                Ok(OdxValue::Integer(raw as i64))
            } else {
                Ok(OdxValue::Integer(raw as i64 - (1i64 << bit_length)))
            }
        }
        DataType::Float32 => {
            if bit_length != 32 {
                return Err(CodecError::ValueOutOfRange {
                    param: String::new(),
                    reason: "FLOAT32 values must be 32 bits wide".into(),
                });
            }
            Ok(OdxValue::Float(f64::from(f32::from_bits(raw as u32))))
        }
        DataType::Float64 => {
            if bit_length != 64 {
                return Err(CodecError::ValueOutOfRange {
                    param: String::new(),
                    reason: "FLOAT64 values must be 64 bits wide".into(),
                });
            }
            Ok(OdxValue::Float(f64::from_bits(raw as u64)))
        }
        _ => {
            let byte_len = (bit_length as usize).div_ceil(8);
            let mut bytes = vec![0u8; byte_len];
            for i in 0..byte_len {
                bytes[i] = ((raw >> (8 * (byte_len - 1 - i))) & 0xff) as u8;
            }
            Ok(bytes_to_value(bytes, data_type, is_highlow))
        }
    }
}

fn bytes_to_value(bytes: Vec<u8>, data_type: DataType, is_highlow: bool) -> OdxValue {
    match data_type {
        DataType::ByteField => OdxValue::Bytes(bytes),
        DataType::Unicode2String => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| {
                    if is_highlow {
                        u16::from_be_bytes([c[0], c[1]])
                    } else {
                        u16::from_le_bytes([c[0], c[1]])
                    }
                })
                .collect();
            OdxValue::String(String::from_utf16_lossy(&units))
        }
        // ASCII and UTF-8 strings: decode leniently, invalid sequences
        // become replacement characters.
        _ => OdxValue::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Byte rendition of a string or byte-field value per its base data type.
pub(crate) fn value_to_bytes(
    value: &OdxValue,
    data_type: DataType,
    is_highlow: bool,
    param: &str,
) -> Result<Vec<u8>, CodecError> {
    match (value, data_type) {
        (OdxValue::Bytes(b), DataType::ByteField) => Ok(b.clone()),
        (OdxValue::String(s), DataType::Unicode2String) => Ok(s
            .encode_utf16()
            .flat_map(|u| if is_highlow { u.to_be_bytes() } else { u.to_le_bytes() })
            .collect()),
        (OdxValue::String(s), DataType::AsciiString | DataType::Utf8String) => {
            Ok(s.as_bytes().to_vec())
        }
        _ => Err(CodecError::ValueOutOfRange {
            param: param.into(),
            reason: format!(
                "{} value cannot be coded as {}",
                value.type_name(),
                data_type.odx_name()
            ),
        }),
    }
}

fn value_to_raw(
    value: &OdxValue,
    bit_length: u32,
    data_type: DataType,
    param: &str,
) -> Result<u128, CodecError> {
    let out_of_range = |reason: String| CodecError::ValueOutOfRange {
        param: param.into(),
        reason,
    };

    match (value, data_type) {
        (OdxValue::Integer(v), DataType::UInt32) => {
            if *v < 0 || u128::from(*v as u64) > mask(bit_length) {
                return Err(out_of_range(format!("{v} does not fit in {bit_length} unsigned bits")));
            }
            Ok(*v as u128)
        }
        (OdxValue::Integer(v), DataType::Int32) => {
            let min = -(1i64 << (bit_length - 1));
            let max = (1i64 << (bit_length - 1)) - 1;
            if *v < min || *v > max {
                return Err(out_of_range(format!("{v} does not fit in {bit_length} signed bits")));
            }
            Ok(u128::from(*v as u64) & mask(bit_length))
        }
        (OdxValue::Float(v), DataType::Float32) => {
            if bit_length != 32 {
                return Err(out_of_range("FLOAT32 values must be 32 bits wide".into()));
            }
            Ok(u128::from((*v as f32).to_bits()))
        }
        (OdxValue::Float(v), DataType::Float64) => {
            if bit_length != 64 {
                return Err(out_of_range("FLOAT64 values must be 64 bits wide".into()));
            }
            Ok(u128::from(v.to_bits()))
        }
        _ => Err(out_of_range(format!(
            "{} value cannot be coded as {}",
            value.type_name(),
            data_type.odx_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extract_byte_aligned_uint() {
        let data = [0x12, 0x34];
        let mut state = DecodeState::new(&data);
        let v = state.extract_atomic(16, DataType::UInt32, true).unwrap();
        assert_eq!(v, OdxValue::Integer(0x1234));
        assert_eq!(state.cursor_byte, 2);
    }

    #[test]
    fn extract_with_bit_position() {
        // bits 4..7 of the first byte
        let data = [0b0101_0000];
        let mut state = DecodeState::new(&data);
        state.cursor_bit = 4;
        let v = state.extract_atomic(4, DataType::UInt32, true).unwrap();
        assert_eq!(v, OdxValue::Integer(0b0101));
        assert_eq!(state.cursor_bit, 0);
    }

    #[test]
    fn extract_low_high_byte_order() {
        let data = [0x34, 0x12];
        let mut state = DecodeState::new(&data);
        let v = state.extract_atomic(16, DataType::UInt32, false).unwrap();
        assert_eq!(v, OdxValue::Integer(0x1234));
    }

    #[test]
    fn extract_signed_two_complement() {
        let data = [0xff];
        let mut state = DecodeState::new(&data);
        let v = state.extract_atomic(8, DataType::Int32, true).unwrap();
        assert_eq!(v, OdxValue::Integer(-1));
    }

    #[test]
    fn extract_underrun_is_reported() {
        let data = [0x01];
        let mut state = DecodeState::new(&data);
        let err = state.extract_atomic(16, DataType::UInt32, true).unwrap_err();
        assert!(matches!(err, CodecError::BufferUnderrun { needed: 2, available: 1 }));
    }

    #[test]
    fn emplace_round_trips_extract() {
        let mut enc = EncodeState::new();
        enc.emplace_atomic(&OdxValue::Integer(0xbeef), 16, DataType::UInt32, true, "p")
            .unwrap();
        assert_eq!(enc.coded, vec![0xbe, 0xef]);

        let mut dec = DecodeState::new(&enc.coded);
        assert_eq!(
            dec.extract_atomic(16, DataType::UInt32, true).unwrap(),
            OdxValue::Integer(0xbeef)
        );
    }

    #[test]
    fn emplace_rejects_oversized_value() {
        let mut enc = EncodeState::new();
        let err = enc
            .emplace_atomic(&OdxValue::Integer(256), 8, DataType::UInt32, true, "p")
            .unwrap_err();
        assert!(matches!(err, CodecError::ValueOutOfRange { .. }));
    }

    #[test]
    fn emplace_merges_sub_byte_fields() {
        let mut enc = EncodeState::new();
        enc.cursor_bit = 4;
        enc.emplace_atomic(&OdxValue::Integer(0b0101), 4, DataType::UInt32, true, "hi")
            .unwrap();
        enc.cursor_byte = 0;
        enc.cursor_bit = 0;
        enc.emplace_atomic(&OdxValue::Integer(0b0011), 4, DataType::UInt32, true, "lo")
            .unwrap();
        assert_eq!(enc.coded, vec![0b0101_0011]);
    }

    #[test]
    fn patch_length_key_slot() {
        let mut enc = EncodeState::new();
        enc.emplace_atomic(&OdxValue::Integer(0), 8, DataType::UInt32, true, "len")
            .unwrap();
        enc.emplace_bytes(&[0xaa, 0xbb], "payload").unwrap();
        let slot = LengthKeySlot {
            byte_pos: 0,
            bit_pos: 0,
            bit_length: 8,
            is_highlow: true,
        };
        enc.patch_atomic(&slot, 16, "len").unwrap();
        assert_eq!(enc.coded, vec![16, 0xaa, 0xbb]);
    }

    #[test]
    fn bytefield_round_trip() {
        let mut enc = EncodeState::new();
        enc.emplace_atomic(
            &OdxValue::Bytes(vec![1, 2, 3]),
            24,
            DataType::ByteField,
            true,
            "p",
        )
        .unwrap();
        let mut dec = DecodeState::new(&enc.coded);
        assert_eq!(
            dec.extract_atomic(24, DataType::ByteField, true).unwrap(),
            OdxValue::Bytes(vec![1, 2, 3])
        );
    }
}
