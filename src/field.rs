//! Field descriptors: the wire type, array length, linear scaling and optional
//! transform hooks of one named value inside a struct.
//!
//! Numeric encode: `stored = value * scale + offset`, truncated toward zero for
//! integer wire types, then the encode hook, then truncated and range-checked
//! again before packing. Array elements follow the same steps one by one.
//! Decode inverts it: `value = (stored - offset) / scale`, the decode hook, and
//! rounding to the field's precision.
//!
//! Decoded numbers keep their wire type when no conversion applies: integer
//! fields without scaling or hooks come back exact, and unscaled `float` fields
//! come back as [`Value::Float`]. Everything else decodes to [`Value::Double`],
//! so compare round-tripped numbers with [`Value::as_f64`] rather than by variant.

use crate::codec::{CodecError, ConfigError, Reader};
use crate::value::Value;
use byteorder::{ByteOrder, WriteBytesExt};
use std::fmt;
use std::str::FromStr;

/// Wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Float,
    Double,
    /// UTF-8 bytes followed by a single `0x00`.
    Str,
    /// `u16` length prefix followed by raw bytes.
    Bytes,
}

impl FieldType {
    /// Encoded size of one element, `None` for variable-length types.
    pub const fn size(self) -> Option<usize> {
        match self {
            FieldType::U8 | FieldType::I8 => Some(1),
            FieldType::U16 | FieldType::I16 => Some(2),
            FieldType::U32 | FieldType::I32 | FieldType::Float => Some(4),
            FieldType::U64 | FieldType::I64 | FieldType::Double => Some(8),
            FieldType::Str | FieldType::Bytes => None,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, FieldType::Float | FieldType::Double)
    }

    pub const fn is_integer(self) -> bool {
        !self.is_float() && !self.is_variable()
    }

    pub const fn is_variable(self) -> bool {
        matches!(self, FieldType::Str | FieldType::Bytes)
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::U8 => "u8",
            FieldType::I8 => "i8",
            FieldType::U16 => "u16",
            FieldType::I16 => "i16",
            FieldType::U32 => "u32",
            FieldType::I32 => "i32",
            FieldType::U64 => "u64",
            FieldType::I64 => "i64",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Str => "string",
            FieldType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "u8" | "uint8" => FieldType::U8,
            "i8" | "int8" => FieldType::I8,
            "u16" | "uint16" => FieldType::U16,
            "i16" | "int16" => FieldType::I16,
            "u32" | "uint32" => FieldType::U32,
            "i32" | "int32" => FieldType::I32,
            "u64" | "uint64" => FieldType::U64,
            "i64" | "int64" => FieldType::I64,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "string" | "str" => FieldType::Str,
            "bytes" => FieldType::Bytes,
            other => return Err(format!("Unknown field type: {}", other)),
        })
    }
}

/// Hook applied to a physical value before encoding or after decoding.
pub type Transform = fn(f64) -> f64;

/// One named value of a struct.
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldType,
    name: String,
    unit: String,
    length: usize,
    scale: f64,
    offset: f64,
    precision: Option<u32>,
    encode_hook: Option<Transform>,
    decode_hook: Option<Transform>,
}

impl Field {
    /// A scalar field with scale 1, offset 0 and 3-digit rounding.
    pub fn new(kind: FieldType, name: impl Into<String>) -> Self {
        Field {
            kind,
            name: name.into(),
            unit: String::new(),
            length: 1,
            scale: 1.0,
            offset: 0.0,
            precision: Some(3),
            encode_hook: None,
            decode_hook: None,
        }
    }

    /// Display-only unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Element count; values above 1 make a numeric field a fixed-length array.
    /// Ignored by string and blob fields.
    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Decimal digits kept on non-exact decoded values.
    pub fn precision(mut self, digits: u32) -> Self {
        self.precision = Some(digits);
        self
    }

    /// Disable rounding of decoded values.
    pub fn exact(mut self) -> Self {
        self.precision = None;
        self
    }

    pub fn on_encode(mut self, hook: Transform) -> Self {
        self.encode_hook = Some(hook);
        self
    }

    pub fn on_decode(mut self, hook: Transform) -> Self {
        self.decode_hook = Some(hook);
        self
    }

    pub fn kind(&self) -> FieldType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_str(&self) -> &str {
        &self.unit
    }

    pub fn len(&self) -> usize {
        if self.kind.is_variable() {
            1
        } else {
            self.length
        }
    }

    pub fn is_array(&self) -> bool {
        !self.kind.is_variable() && self.length > 1
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    pub fn offset_value(&self) -> f64 {
        self.offset
    }

    pub fn precision_digits(&self) -> Option<u32> {
        self.precision
    }

    fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    /// Encoded size in bytes, `None` for strings and blobs.
    pub fn wire_size(&self) -> Option<usize> {
        self.kind.size().map(|s| s * self.len())
    }

    pub(crate) fn validate(&self, structure: &str) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyFieldName {
                structure: structure.to_string(),
            });
        }
        if self.scale == 0.0 || !self.scale.is_finite() {
            return Err(ConfigError::InvalidScale {
                field: self.name.clone(),
                scale: self.scale,
            });
        }
        if !self.offset.is_finite() {
            return Err(ConfigError::InvalidOffset {
                field: self.name.clone(),
                offset: self.offset,
            });
        }
        if self.length == 0 && !self.kind.is_variable() {
            return Err(ConfigError::ZeroLength {
                field: self.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn encode<B: ByteOrder>(
        &self,
        w: &mut Vec<u8>,
        v: &Value,
        structure: &str,
    ) -> Result<(), CodecError> {
        match self.kind {
            FieldType::Str => {
                let s = v
                    .as_str()
                    .ok_or_else(|| self.shape_error(structure, "string", v))?;
                if s.as_bytes().contains(&0) {
                    return Err(CodecError::InteriorNul {
                        field: self.name.clone(),
                        structure: structure.to_string(),
                    });
                }
                w.extend_from_slice(s.as_bytes());
                w.push(0);
            }
            FieldType::Bytes => {
                let b = v
                    .as_bytes()
                    .ok_or_else(|| self.shape_error(structure, "bytes", v))?;
                let len = u16::try_from(b.len()).map_err(|_| CodecError::BlobTooLong {
                    field: self.name.clone(),
                    structure: structure.to_string(),
                    len: b.len(),
                })?;
                w.write_u16::<B>(len)?;
                w.extend_from_slice(b);
            }
            _ if self.is_array() => {
                let items = v
                    .as_list()
                    .ok_or_else(|| self.shape_error(structure, "list", v))?;
                if items.len() != self.length {
                    return Err(CodecError::ArrayLength {
                        field: self.name.clone(),
                        structure: structure.to_string(),
                        expected: self.length,
                        actual: items.len(),
                    });
                }
                for item in items {
                    self.encode_number::<B>(w, item, structure)?;
                }
            }
            _ => self.encode_number::<B>(w, v, structure)?,
        }
        Ok(())
    }

    fn encode_number<B: ByteOrder>(
        &self,
        w: &mut Vec<u8>,
        v: &Value,
        structure: &str,
    ) -> Result<(), CodecError> {
        if self.kind.is_integer() && self.is_identity() && self.encode_hook.is_none() {
            if let Some(n) = v.as_i128() {
                return self.write_int::<B>(w, n, structure);
            }
        }
        let x = v
            .as_f64()
            .ok_or_else(|| self.shape_error(structure, "number", v))?;
        let mut stored = x * self.scale + self.offset;
        if self.kind.is_integer() {
            stored = stored.trunc();
        }
        if let Some(hook) = self.encode_hook {
            stored = hook(stored);
        }
        match self.kind {
            FieldType::Float => w.write_f32::<B>(stored as f32)?,
            FieldType::Double => w.write_f64::<B>(stored)?,
            _ => {
                let truncated = stored.trunc();
                if !truncated.is_finite() {
                    return Err(self.out_of_range(structure, stored));
                }
                self.write_int::<B>(w, truncated as i128, structure)?;
            }
        }
        Ok(())
    }

    fn write_int<B: ByteOrder>(&self, w: &mut Vec<u8>, n: i128, structure: &str) -> Result<(), CodecError> {
        let range = || self.out_of_range(structure, n as f64);
        match self.kind {
            FieldType::U8 => w.write_u8(u8::try_from(n).map_err(|_| range())?)?,
            FieldType::I8 => w.write_i8(i8::try_from(n).map_err(|_| range())?)?,
            FieldType::U16 => w.write_u16::<B>(u16::try_from(n).map_err(|_| range())?)?,
            FieldType::I16 => w.write_i16::<B>(i16::try_from(n).map_err(|_| range())?)?,
            FieldType::U32 => w.write_u32::<B>(u32::try_from(n).map_err(|_| range())?)?,
            FieldType::I32 => w.write_i32::<B>(i32::try_from(n).map_err(|_| range())?)?,
            FieldType::U64 => w.write_u64::<B>(u64::try_from(n).map_err(|_| range())?)?,
            FieldType::I64 => w.write_i64::<B>(i64::try_from(n).map_err(|_| range())?)?,
            FieldType::Float => w.write_f32::<B>(n as f32)?,
            FieldType::Double => w.write_f64::<B>(n as f64)?,
            FieldType::Str | FieldType::Bytes => {
                return Err(CodecError::Shape {
                    field: self.name.clone(),
                    structure: structure.to_string(),
                    expected: self.kind.name(),
                    found: "number",
                })
            }
        }
        Ok(())
    }

    pub(crate) fn decode<B: ByteOrder>(
        &self,
        r: &mut Reader<'_>,
        structure: &str,
    ) -> Result<Value, CodecError> {
        match self.kind {
            FieldType::Str => {
                let end = r.find(0).ok_or_else(|| CodecError::UnterminatedString {
                    structure: structure.to_string(),
                    field: self.name.clone(),
                })?;
                let raw = self.take(r, end + 1, structure)?;
                let s = std::str::from_utf8(&raw[..end]).map_err(|_| CodecError::InvalidUtf8 {
                    structure: structure.to_string(),
                    field: self.name.clone(),
                })?;
                Ok(Value::Str(s.to_string()))
            }
            FieldType::Bytes => {
                let prefix = self.take(r, 2, structure)?;
                let len = B::read_u16(prefix) as usize;
                let data = self.take(r, len, structure)?;
                Ok(Value::Bytes(data.to_vec()))
            }
            _ if self.is_array() => (0..self.length)
                .map(|_| self.decode_number::<B>(r, structure))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => self.decode_number::<B>(r, structure),
        }
    }

    fn decode_number<B: ByteOrder>(&self, r: &mut Reader<'_>, structure: &str) -> Result<Value, CodecError> {
        let size = self.kind.size().unwrap_or(0);
        let raw = self.take(r, size, structure)?;
        let stored = match self.kind {
            FieldType::U8 => Value::U8(raw[0]),
            FieldType::I8 => Value::I8(raw[0] as i8),
            FieldType::U16 => Value::U16(B::read_u16(raw)),
            FieldType::I16 => Value::I16(B::read_i16(raw)),
            FieldType::U32 => Value::U32(B::read_u32(raw)),
            FieldType::I32 => Value::I32(B::read_i32(raw)),
            FieldType::U64 => Value::U64(B::read_u64(raw)),
            FieldType::I64 => Value::I64(B::read_i64(raw)),
            FieldType::Float => Value::Float(B::read_f32(raw)),
            FieldType::Double => Value::Double(B::read_f64(raw)),
            FieldType::Str | FieldType::Bytes => Value::Bytes(raw.to_vec()),
        };
        if self.is_identity() && self.decode_hook.is_none() {
            match stored {
                Value::Float(x) => return Ok(Value::Float(self.round(f64::from(x)) as f32)),
                _ if self.kind.is_integer() => return Ok(stored),
                _ => {}
            }
        }
        let x = stored
            .as_f64()
            .ok_or_else(|| self.shape_error(structure, "number", &stored))?;
        let mut physical = (x - self.offset) / self.scale;
        if let Some(hook) = self.decode_hook {
            physical = hook(physical);
        }
        Ok(Value::Double(self.round(physical)))
    }

    fn round(&self, x: f64) -> f64 {
        let Some(digits) = self.precision else {
            return x;
        };
        let m = 10f64.powi(digits as i32);
        let rounded = (x * m).round() / m;
        if rounded.is_finite() {
            rounded
        } else {
            x
        }
    }

    fn take<'a>(&self, r: &mut Reader<'a>, n: usize, structure: &str) -> Result<&'a [u8], CodecError> {
        let available = r.remaining();
        r.take(n).ok_or_else(|| CodecError::Truncated {
            structure: structure.to_string(),
            field: self.name.clone(),
            needed: n,
            available,
        })
    }

    fn shape_error(&self, structure: &str, expected: &'static str, found: &Value) -> CodecError {
        CodecError::Shape {
            field: self.name.clone(),
            structure: structure.to_string(),
            expected,
            found: found.shape(),
        }
    }

    fn out_of_range(&self, structure: &str, value: f64) -> CodecError {
        CodecError::OutOfRange {
            field: self.name.clone(),
            structure: structure.to_string(),
            value,
            kind: self.kind,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.unit)
        }
    }
}
