//! Atomic ODX values, base data types and interval limits.

use std::cmp::Ordering;
use std::fmt;

use crate::error::LoadError;

/// The BASE-DATA-TYPE of a diag-coded or physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int32,
    UInt32,
    Float32,
    Float64,
    ByteField,
    AsciiString,
    Utf8String,
    Unicode2String,
}

impl DataType {
    pub fn from_odx_name(name: &str) -> Option<Self> {
        match name {
            "A_INT32" => Some(Self::Int32),
            "A_UINT32" => Some(Self::UInt32),
            "A_FLOAT32" => Some(Self::Float32),
            "A_FLOAT64" => Some(Self::Float64),
            "A_BYTEFIELD" => Some(Self::ByteField),
            "A_ASCIISTRING" => Some(Self::AsciiString),
            "A_UTF8STRING" => Some(Self::Utf8String),
            "A_UNICODE2STRING" => Some(Self::Unicode2String),
            _ => None,
        }
    }

    pub fn odx_name(self) -> &'static str {
        match self {
            Self::Int32 => "A_INT32",
            Self::UInt32 => "A_UINT32",
            Self::Float32 => "A_FLOAT32",
            Self::Float64 => "A_FLOAT64",
            Self::ByteField => "A_BYTEFIELD",
            Self::AsciiString => "A_ASCIISTRING",
            Self::Utf8String => "A_UTF8STRING",
            Self::Unicode2String => "A_UNICODE2STRING",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::Float64
        )
    }

    /// Parse a textual ODX value (CODED-VALUE, KEY, limits, ...) according
    /// to this data type. Byte fields are written as contiguous hex digits.
    pub fn value_from_str(self, text: &str) -> Result<OdxValue, LoadError> {
        let text = text.trim();
        match self {
            Self::Int32 | Self::UInt32 => text
                .parse::<i64>()
                .map(OdxValue::Integer)
                .map_err(|_| malformed(self, text)),
            Self::Float32 | Self::Float64 => text
                .parse::<f64>()
                .map(OdxValue::Float)
                .map_err(|_| malformed(self, text)),
            Self::ByteField => {
                if text.len() % 2 != 0 {
                    return Err(malformed(self, text));
                }
                let mut bytes = Vec::with_capacity(text.len() / 2);
                for i in (0..text.len()).step_by(2) {
                    let b = u8::from_str_radix(&text[i..i + 2], 16)
                        .map_err(|_| malformed(self, text))?;
                    bytes.push(b);
                }
                Ok(OdxValue::Bytes(bytes))
            }
            Self::AsciiString | Self::Utf8String | Self::Unicode2String => {
                Ok(OdxValue::String(text.to_string()))
            }
        }
    }
}

fn malformed(data_type: DataType, text: &str) -> LoadError {
    LoadError::MalformedTypeDescriptor(format!(
        "'{text}' is not a valid {} value",
        data_type.odx_name()
    ))
}

/// An atomic value as it crosses the codec boundary, either in internal
/// (wire) or physical (application) representation.
#[derive(Debug, Clone, PartialEq)]
pub enum OdxValue {
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl OdxValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Numeric view; strings and byte fields have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Ordering used by interval limits and mux case selection. Values of
    /// different kinds do not compare.
    pub fn partial_cmp_value(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }
}

impl fmt::Display for OdxValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Bytes(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// INTERVAL-TYPE of a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalType {
    #[default]
    Closed,
    Open,
    Infinite,
}

impl IntervalType {
    pub fn from_odx_name(name: &str) -> Option<Self> {
        match name {
            "CLOSED" => Some(Self::Closed),
            "OPEN" => Some(Self::Open),
            "INFINITE" => Some(Self::Infinite),
            _ => None,
        }
    }
}

/// One bound of an internal or physical interval.
///
/// A limit without a value behaves as INFINITE; a limit with a value but
/// no declared interval type behaves as CLOSED.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Limit {
    pub value: Option<OdxValue>,
    pub interval_type: IntervalType,
}

impl Limit {
    pub fn infinite() -> Self {
        Self {
            value: None,
            interval_type: IntervalType::Infinite,
        }
    }

    pub fn closed(value: OdxValue) -> Self {
        Self {
            value: Some(value),
            interval_type: IntervalType::Closed,
        }
    }

    /// Is `value` admissible with this limit as the lower bound?
    pub fn complies_to_lower(&self, value: &OdxValue) -> bool {
        let Some(bound) = &self.value else {
            return true;
        };
        if self.interval_type == IntervalType::Infinite {
            return true;
        }
        match bound.partial_cmp_value(value) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => self.interval_type == IntervalType::Closed,
            _ => false,
        }
    }

    /// Is `value` admissible with this limit as the upper bound?
    pub fn complies_to_upper(&self, value: &OdxValue) -> bool {
        let Some(bound) = &self.value else {
            return true;
        };
        if self.interval_type == IntervalType::Infinite {
            return true;
        }
        match bound.partial_cmp_value(value) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => self.interval_type == IntervalType::Closed,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_bytefield_value() {
        let v = DataType::ByteField.value_from_str("A1b203").unwrap();
        assert_eq!(v, OdxValue::Bytes(vec![0xa1, 0xb2, 0x03]));
        assert!(DataType::ByteField.value_from_str("abc").is_err());
    }

    #[test]
    fn parse_numeric_values() {
        assert_eq!(
            DataType::UInt32.value_from_str("16").unwrap(),
            OdxValue::Integer(16)
        );
        assert_eq!(
            DataType::Float64.value_from_str("2.5").unwrap(),
            OdxValue::Float(2.5)
        );
        assert!(DataType::Int32.value_from_str("2.5").is_err());
    }

    #[test]
    fn closed_limit_includes_boundary() {
        let lim = Limit::closed(OdxValue::Integer(100));
        assert!(lim.complies_to_upper(&OdxValue::Integer(100)));
        assert!(!lim.complies_to_upper(&OdxValue::Integer(101)));
        assert!(lim.complies_to_lower(&OdxValue::Integer(100)));
        assert!(!lim.complies_to_lower(&OdxValue::Integer(99)));
    }

    #[test]
    fn open_limit_excludes_boundary() {
        let lim = Limit {
            value: Some(OdxValue::Integer(100)),
            interval_type: IntervalType::Open,
        };
        assert!(!lim.complies_to_upper(&OdxValue::Integer(100)));
        assert!(lim.complies_to_upper(&OdxValue::Integer(99)));
    }

    #[test]
    fn missing_value_means_infinite() {
        let lim = Limit::default();
        assert!(lim.complies_to_upper(&OdxValue::Float(1e300)));
        assert!(lim.complies_to_lower(&OdxValue::Float(-1e300)));
    }

    #[test]
    fn mixed_numeric_comparison() {
        let a = OdxValue::Integer(2);
        let b = OdxValue::Float(2.5);
        assert_eq!(a.partial_cmp_value(&b), Some(Ordering::Less));
        assert_eq!(
            OdxValue::String("x".into()).partial_cmp_value(&a),
            None
        );
    }
}
