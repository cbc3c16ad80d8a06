//! Computation methods: internal (coded) <-> physical value conversion.
//!
//! The forward direction (internal to physical) is total over the declared
//! domain of the method; the reverse direction is partial and reports
//! `NotInvertible`/`OutOfDomain` instead of guessing.

use crate::error::ConvError;
use crate::value::{DataType, Limit, OdxValue};

/// One linear segment: `physical = (offset + factor * internal) / denominator`.
///
/// LINEAR methods have exactly one segment, SCALE-LINEAR methods a
/// non-overlapping sequence of them. The physical limits are derived from
/// the internal limits at construction time; a negative factor swaps them.
#[derive(Debug, Clone)]
pub struct LinearSegment {
    pub offset: f64,
    pub factor: f64,
    pub denominator: f64,
    pub internal_lower: Limit,
    pub internal_upper: Limit,
    /// Value returned by the reverse conversion when factor == 0.
    pub inverse_value: f64,
    pub internal_type: DataType,
    pub physical_type: DataType,
    physical_lower: Limit,
    physical_upper: Limit,
}

impl LinearSegment {
    pub fn new(
        offset: f64,
        factor: f64,
        denominator: f64,
        internal_lower: Limit,
        internal_upper: Limit,
        inverse_value: f64,
        internal_type: DataType,
        physical_type: DataType,
    ) -> Self {
        let mut segment = Self {
            offset,
            factor,
            denominator,
            internal_lower,
            internal_upper,
            inverse_value,
            internal_type,
            physical_type,
            physical_lower: Limit::infinite(),
            physical_upper: Limit::infinite(),
        };
        segment.compute_physical_limits();
        segment
    }

    fn convert_limit(&self, internal: &Limit) -> Limit {
        let Some(value) = internal.value.as_ref().and_then(OdxValue::as_f64) else {
            return Limit::infinite();
        };
        let physical = (self.offset + self.factor * value) / self.denominator;
        Limit {
            value: Some(self.physical_value(physical)),
            interval_type: internal.interval_type,
        }
    }

    fn compute_physical_limits(&mut self) {
        if self.factor >= 0.0 {
            self.physical_lower = self.convert_limit(&self.internal_lower);
            self.physical_upper = self.convert_limit(&self.internal_upper);
        } else {
            // A negative scaling factor swaps the bounds.
            self.physical_lower = self.convert_limit(&self.internal_upper);
            self.physical_upper = self.convert_limit(&self.internal_lower);
        }
    }

    fn physical_value(&self, raw: f64) -> OdxValue {
        match self.physical_type {
            DataType::Int32 | DataType::UInt32 => OdxValue::Integer(raw.round() as i64),
            _ => OdxValue::Float(raw),
        }
    }

    fn internal_value(&self, raw: f64) -> OdxValue {
        match self.internal_type {
            DataType::Int32 | DataType::UInt32 => OdxValue::Integer(raw.round() as i64),
            _ => OdxValue::Float(raw),
        }
    }

    pub fn internal_applies(&self, value: &OdxValue) -> bool {
        value.as_f64().is_some()
            && self.internal_lower.complies_to_lower(value)
            && self.internal_upper.complies_to_upper(value)
    }

    pub fn physical_applies(&self, value: &OdxValue) -> bool {
        value.as_f64().is_some()
            && self.physical_lower.complies_to_lower(value)
            && self.physical_upper.complies_to_upper(value)
    }

    pub fn internal_to_physical(&self, internal: &OdxValue) -> Result<OdxValue, ConvError> {
        let value = internal.as_f64().ok_or(ConvError::TypeMismatch {
            expected: "numeric",
            actual: internal.type_name(),
        })?;
        Ok(self.physical_value((self.offset + self.factor * value) / self.denominator))
    }

    pub fn physical_to_internal(&self, physical: &OdxValue) -> Result<OdxValue, ConvError> {
        let value = physical.as_f64().ok_or(ConvError::TypeMismatch {
            expected: "numeric",
            actual: physical.type_name(),
        })?;

        // A factor of zero maps every internal value of the segment to the
        // same physical value; COMPU-INVERSE-VALUE designates the result.
        if self.factor.abs() < 1e-10 {
            return Ok(self.internal_value(self.inverse_value));
        }

        let internal = self.internal_value((value * self.denominator - self.offset) / self.factor);
        if !self.internal_applies(&internal) {
            return Err(ConvError::OutOfDomain {
                value: physical.to_string(),
            });
        }
        Ok(internal)
    }
}

/// One TEXTTABLE scale: an internal value or interval mapped to a label.
#[derive(Debug, Clone)]
pub struct TextScale {
    pub lower: Limit,
    pub upper: Limit,
    pub text: String,
    /// Internal value used for the reverse lookup when the scale covers an
    /// interval (COMPU-INVERSE-VALUE).
    pub inverse_value: Option<OdxValue>,
}

impl TextScale {
    fn applies(&self, internal: &OdxValue) -> bool {
        self.lower.complies_to_lower(internal) && self.upper.complies_to_upper(internal)
    }

    fn reverse_value(&self) -> Option<OdxValue> {
        self.inverse_value
            .clone()
            .or_else(|| self.lower.value.clone())
    }
}

/// Interpolation table for TAB-INTP methods: (internal, physical) sample
/// points sorted by internal value.
#[derive(Debug, Clone)]
pub struct InterpolationTable {
    points: Vec<(f64, f64)>,
}

impl InterpolationTable {
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    fn interpolate(&self, x: f64) -> Option<f64> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        if x < first.0 || x > last.0 {
            return None;
        }
        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if x <= x1 {
                if (x1 - x0).abs() < f64::EPSILON {
                    return Some(y0);
                }
                return Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0));
            }
        }
        Some(last.1)
    }

    fn reverse_interpolate(&self, y: f64) -> Option<f64> {
        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            let (lo, hi) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
            if y >= lo && y <= hi {
                if (y1 - y0).abs() < f64::EPSILON {
                    return Some(x0);
                }
                return Some(x0 + (x1 - x0) * (y - y0) / (y1 - y0));
            }
        }
        None
    }
}

/// The value-conversion strategy attached to a data object property.
#[derive(Debug, Clone)]
pub enum CompuMethod {
    /// Physical equals internal.
    Identical,
    Linear(LinearSegment),
    ScaleLinear(Vec<LinearSegment>),
    TextTable(Vec<TextScale>),
    TabIntp(InterpolationTable),
}

impl CompuMethod {
    pub fn category_name(&self) -> &'static str {
        match self {
            Self::Identical => "IDENTICAL",
            Self::Linear(_) => "LINEAR",
            Self::ScaleLinear(_) => "SCALE-LINEAR",
            Self::TextTable(_) => "TEXTTABLE",
            Self::TabIntp(_) => "TAB-INTP",
        }
    }

    pub fn internal_to_physical(&self, internal: &OdxValue) -> Result<OdxValue, ConvError> {
        match self {
            Self::Identical => Ok(internal.clone()),
            Self::Linear(segment) => segment.internal_to_physical(internal),
            Self::ScaleLinear(segments) => {
                let segment = segments
                    .iter()
                    .find(|s| s.internal_applies(internal))
                    .ok_or_else(|| ConvError::NoMatchingScale {
                        value: internal.to_string(),
                    })?;
                segment.internal_to_physical(internal)
            }
            Self::TextTable(scales) => {
                let scale = scales.iter().find(|s| s.applies(internal)).ok_or_else(|| {
                    ConvError::NoMatchingScale {
                        value: internal.to_string(),
                    }
                })?;
                Ok(OdxValue::String(scale.text.clone()))
            }
            Self::TabIntp(table) => {
                let x = internal.as_f64().ok_or(ConvError::TypeMismatch {
                    expected: "numeric",
                    actual: internal.type_name(),
                })?;
                let y = table.interpolate(x).ok_or_else(|| ConvError::OutOfDomain {
                    value: internal.to_string(),
                })?;
                Ok(OdxValue::Float(y))
            }
        }
    }

    pub fn physical_to_internal(&self, physical: &OdxValue) -> Result<OdxValue, ConvError> {
        match self {
            Self::Identical => Ok(physical.clone()),
            Self::Linear(segment) => {
                if !segment.physical_applies(physical) {
                    return Err(ConvError::OutOfDomain {
                        value: physical.to_string(),
                    });
                }
                segment.physical_to_internal(physical)
            }
            Self::ScaleLinear(segments) => {
                let segment = segments
                    .iter()
                    .find(|s| s.physical_applies(physical))
                    .ok_or_else(|| ConvError::NotInvertible {
                        value: physical.to_string(),
                    })?;
                segment.physical_to_internal(physical)
            }
            Self::TextTable(scales) => {
                let OdxValue::String(text) = physical else {
                    return Err(ConvError::TypeMismatch {
                        expected: "string",
                        actual: physical.type_name(),
                    });
                };
                scales
                    .iter()
                    .find(|s| s.text == *text)
                    .and_then(TextScale::reverse_value)
                    .ok_or_else(|| ConvError::NotInvertible {
                        value: physical.to_string(),
                    })
            }
            Self::TabIntp(table) => {
                let y = physical.as_f64().ok_or(ConvError::TypeMismatch {
                    expected: "numeric",
                    actual: physical.type_name(),
                })?;
                let x = table
                    .reverse_interpolate(y)
                    .ok_or_else(|| ConvError::NotInvertible {
                        value: physical.to_string(),
                    })?;
                Ok(OdxValue::Float(x))
            }
        }
    }
}
