//! Struct codec: an ordered list of fields forming one binary record.
//!
//! Instances are laid out field after field in declaration order with no padding.
//! Three independent CRC envelopes can be configured:
//!
//! ```text
//! instance:  fields || instance_crc                       (each instance)
//! message:   ((instance || instance || ...) || auth_crc) || integrity_crc
//! ```
//!
//! Decoding strips the integrity CRC, then the authentication CRC, then parses
//! instances until the buffer is exhausted.

use crate::codec::{self, ChecksumLayer, CodecError, ConfigError, Endianness, Reader};
use crate::crc::Crc;
use crate::field::Field;
use crate::value::{Fields, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Struct {
    code: Option<u16>,
    name: String,
    endianness: Option<Endianness>,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
    instance_crc: Option<Crc>,
    auth_crc: Option<Crc>,
    integrity_crc: Option<Crc>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Struct {
            code: None,
            name: name.into(),
            endianness: None,
            fields: Vec::new(),
            by_name: HashMap::new(),
            instance_crc: None,
            auth_crc: None,
            integrity_crc: None,
        }
    }

    /// Numeric code used to tag this struct's segments inside a frame.
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Default byte order; little-endian when unset.
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    /// CRC appended to every encoded instance.
    pub fn with_instance_crc(mut self, crc: Crc) -> Self {
        self.instance_crc = Some(crc);
        self
    }

    /// CRC wrapping the concatenated instances.
    pub fn with_auth_crc(mut self, crc: Crc) -> Self {
        self.auth_crc = Some(crc);
        self
    }

    /// Outermost CRC, applied after the authentication CRC.
    pub fn with_integrity_crc(mut self, crc: Crc) -> Self {
        self.integrity_crc = Some(crc);
        self
    }

    /// Append a field (builder form of [`Struct::add`]).
    pub fn field(mut self, field: Field) -> Result<Self, ConfigError> {
        self.add(field)?;
        Ok(self)
    }

    pub fn add(&mut self, field: Field) -> Result<(), ConfigError> {
        field.validate(&self.name)?;
        if self.by_name.contains_key(field.name()) {
            return Err(ConfigError::DuplicateField {
                field: field.name().to_string(),
                structure: self.name.clone(),
            });
        }
        self.by_name.insert(field.name().to_string(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness.unwrap_or_default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn instance_crc(&self) -> Option<&Crc> {
        self.instance_crc.as_ref()
    }

    pub fn auth_crc(&self) -> Option<&Crc> {
        self.auth_crc.as_ref()
    }

    pub fn integrity_crc(&self) -> Option<&Crc> {
        self.integrity_crc.as_ref()
    }

    /// Size of one encoded instance (instance CRC included) when every field is fixed-width.
    pub fn fixed_size(&self) -> Option<usize> {
        let fields: Option<usize> = self.fields.iter().map(Field::wire_size).sum();
        fields.map(|n| n + self.instance_crc.as_ref().map_or(0, Crc::checksum_len))
    }

    /// Encode a single instance, with message envelopes.
    pub fn encode(&self, values: &Fields) -> Result<Vec<u8>, CodecError> {
        self.encode_with(&[values], self.endianness())
    }

    /// Encode several instances back to back, with message envelopes.
    pub fn encode_many(&self, instances: &[Fields]) -> Result<Vec<u8>, CodecError> {
        let refs: Vec<&Fields> = instances.iter().collect();
        self.encode_with(&refs, self.endianness())
    }

    /// Encode a `Value::Struct` or a `Value::List` of structs.
    pub fn encode_value(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let instances = self.instances_of(value)?;
        self.encode_with(&instances, self.endianness())
    }

    pub fn encode_with(&self, instances: &[&Fields], endianness: Endianness) -> Result<Vec<u8>, CodecError> {
        let payload = self.encode_payload(instances, endianness)?;
        let message = codec::seal(self.auth_crc.as_ref(), payload);
        Ok(codec::seal(self.integrity_crc.as_ref(), message))
    }

    /// Decode one instance as `Value::Struct`, several as `Value::List`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let mut instances = self.decode_with(bytes, self.endianness())?;
        if instances.len() == 1 {
            if let Some(one) = instances.pop() {
                return Ok(Value::Struct(one));
            }
        }
        Ok(Value::List(instances.into_iter().map(Value::Struct).collect()))
    }

    /// Decode every instance, in wire order.
    pub fn decode_all(&self, bytes: &[u8]) -> Result<Vec<Fields>, CodecError> {
        self.decode_with(bytes, self.endianness())
    }

    pub fn decode_with(&self, bytes: &[u8], endianness: Endianness) -> Result<Vec<Fields>, CodecError> {
        let message = codec::open(
            self.integrity_crc.as_ref(),
            bytes,
            ChecksumLayer::Integrity,
            &self.name,
        )?;
        let payload = codec::open(
            self.auth_crc.as_ref(),
            message,
            ChecksumLayer::Authentication,
            &self.name,
        )?;
        self.decode_payload(payload, endianness)
    }

    pub(crate) fn instances_of<'v>(&self, value: &'v Value) -> Result<Vec<&'v Fields>, CodecError> {
        value.instances().ok_or_else(|| CodecError::Shape {
            field: "*".to_string(),
            structure: self.name.clone(),
            expected: "struct or list of structs",
            found: value.shape(),
        })
    }

    /// Instances with their instance CRC, without message envelopes.
    pub(crate) fn encode_payload(
        &self,
        instances: &[&Fields],
        endianness: Endianness,
    ) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        for values in instances {
            match endianness {
                Endianness::Little => self.encode_instance::<LittleEndian>(&mut out, values)?,
                Endianness::Big => self.encode_instance::<BigEndian>(&mut out, values)?,
            }
        }
        Ok(out)
    }

    pub(crate) fn decode_payload(&self, payload: &[u8], endianness: Endianness) -> Result<Vec<Fields>, CodecError> {
        let mut r = Reader::new(payload);
        let mut out = Vec::new();
        while !r.is_empty() {
            let before = r.position();
            let values = match endianness {
                Endianness::Little => self.decode_instance::<LittleEndian>(&mut r)?,
                Endianness::Big => self.decode_instance::<BigEndian>(&mut r)?,
            };
            if r.position() == before {
                return Err(CodecError::TrailingBytes {
                    structure: self.name.clone(),
                    remaining: r.remaining(),
                });
            }
            out.push(values);
        }
        Ok(out)
    }

    fn encode_instance<B: ByteOrder>(&self, w: &mut Vec<u8>, values: &Fields) -> Result<(), CodecError> {
        let start = w.len();
        for field in &self.fields {
            let v = values.get(field.name()).ok_or_else(|| CodecError::MissingField {
                field: field.name().to_string(),
                structure: self.name.clone(),
            })?;
            field.encode::<B>(w, v, &self.name)?;
        }
        if let Some(crc) = &self.instance_crc {
            let sum = crc.checksum(&w[start..]);
            w.extend_from_slice(&crc.checksum_bytes(sum));
        }
        Ok(())
    }

    fn decode_instance<B: ByteOrder>(&self, r: &mut Reader<'_>) -> Result<Fields, CodecError> {
        let start = r.position();
        let mut values = Fields::with_capacity(self.fields.len());
        for field in &self.fields {
            let v = field.decode::<B>(r, &self.name)?;
            values.insert(field.name().to_string(), v);
        }
        if let Some(crc) = &self.instance_crc {
            let available = r.remaining();
            r.take(crc.checksum_len()).ok_or_else(|| CodecError::Truncated {
                structure: self.name.clone(),
                field: "instance crc".to_string(),
                needed: crc.checksum_len(),
                available,
            })?;
            codec::open(Some(crc), r.since(start), ChecksumLayer::Instance, &self.name)?;
        }
        Ok(values)
    }
}

impl<'a> IntoIterator for &'a Struct {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}:{}", code, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
