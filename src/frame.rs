//! Frame handling: multiplex several struct types into one byte stream.
//!
//! Each struct present in the input contributes one tagged segment:
//!
//! ```text
//! | length: u16 | code: u16 | payload: length bytes |  ... repeated ...  [auth crc] [integrity crc]
//! ```
//!
//! Header integers use the frame's byte order. The payload holds every instance
//! of that struct back to back (each with the struct's instance CRC, if any).
//! Decoding reads segments until the buffer is exhausted; repeated codes are
//! accumulated in wire order.

use crate::codec::{self, ChecksumLayer, CodecError, ConfigError, Endianness, Reader};
use crate::crc::{Crc, CRC_32};
use crate::structure::Struct;
use crate::value::{Fields, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use std::collections::{BTreeMap, HashMap};

/// Struct name → one instance (`Value::Struct`) or several (`Value::List`).
///
/// Keys are ordered, so [`Frame::encode`] writes one segment per struct in
/// ascending name order regardless of insertion order.
pub type FrameValues = BTreeMap<String, Value>;

/// Size of a segment header (length + code).
pub const SEGMENT_HEADER_LEN: usize = 4;

/// Code → struct name table. Registration is exclusive (`&mut self`) and
/// rejects codes that are already taken.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    by_code: HashMap<u16, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: u16, name: &str) -> Result<(), ConfigError> {
        if let Some(existing) = self.by_code.get(&code) {
            return Err(ConfigError::DuplicateCode {
                code,
                existing: existing.clone(),
                name: name.to_string(),
            });
        }
        tracing::debug!(code, name, "registered struct code");
        self.by_code.insert(code, name.to_string());
        Ok(())
    }

    /// Register a struct's code. Structs without a code are skipped.
    pub fn register_struct(&mut self, s: &Struct) -> Result<(), ConfigError> {
        match s.code() {
            Some(code) => self.register(code, s.name()),
            None => Ok(()),
        }
    }

    pub fn name_of(&self, code: u16) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    pub fn contains(&self, code: u16) -> bool {
        self.by_code.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    structs: Vec<Struct>,
    registry: Registry,
    by_code: HashMap<u16, usize>,
    by_name: HashMap<String, usize>,
    endianness: Endianness,
    auth_crc: Option<Crc>,
    integrity_crc: Option<Crc>,
}

/// Builder for [`Frame`]. Defaults: little-endian, CRC-32 integrity, no authentication.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    structs: Vec<Struct>,
    endianness: Endianness,
    auth_crc: Option<Crc>,
    integrity_crc: Option<Crc>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        FrameBuilder {
            structs: Vec::new(),
            endianness: Endianness::Little,
            auth_crc: None,
            integrity_crc: Some(CRC_32.clone()),
        }
    }
}

impl FrameBuilder {
    pub fn add(mut self, s: Struct) -> Self {
        self.structs.push(s);
        self
    }

    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn auth_crc(mut self, crc: Crc) -> Self {
        self.auth_crc = Some(crc);
        self
    }

    /// Replace the integrity CRC; `None` disables it.
    pub fn integrity_crc(mut self, crc: Option<Crc>) -> Self {
        self.integrity_crc = crc;
        self
    }

    pub fn build(self) -> Result<Frame, ConfigError> {
        let mut own = Registry::new();
        let mut by_code = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, s) in self.structs.iter().enumerate() {
            let code = s.code().ok_or_else(|| ConfigError::MissingCode(s.name().to_string()))?;
            if by_name.insert(s.name().to_string(), i).is_some() {
                return Err(ConfigError::DuplicateStruct(s.name().to_string()));
            }
            own.register(code, s.name())?;
            by_code.insert(code, i);
        }
        tracing::debug!(
            structs = self.structs.len(),
            endianness = ?self.endianness,
            auth = self.auth_crc.is_some(),
            integrity = self.integrity_crc.is_some(),
            "built frame"
        );
        Ok(Frame {
            structs: self.structs,
            registry: own,
            by_code,
            by_name,
            endianness: self.endianness,
            auth_crc: self.auth_crc,
            integrity_crc: self.integrity_crc,
        })
    }
}

impl Frame {
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    /// Frame over `structs` with the default settings.
    pub fn new(structs: impl IntoIterator<Item = Struct>) -> Result<Self, ConfigError> {
        structs
            .into_iter()
            .fold(Frame::builder(), FrameBuilder::add)
            .build()
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn auth_crc(&self) -> Option<&Crc> {
        self.auth_crc.as_ref()
    }

    pub fn integrity_crc(&self) -> Option<&Crc> {
        self.integrity_crc.as_ref()
    }

    pub fn structs(&self) -> impl Iterator<Item = &Struct> {
        self.structs.iter()
    }

    pub fn get_struct(&self, name: &str) -> Option<&Struct> {
        self.by_name.get(name).map(|&i| &self.structs[i])
    }

    pub fn struct_by_code(&self, code: u16) -> Option<&Struct> {
        self.by_code.get(&code).map(|&i| &self.structs[i])
    }

    /// Encodes one segment per entry of `values`, in ascending struct-name order.
    /// Segment order is not significant to [`Frame::decode`], which merges
    /// repeated codes and returns the same map.
    pub fn encode(&self, values: &FrameValues) -> Result<Vec<u8>, CodecError> {
        let body = match self.endianness {
            Endianness::Little => self.encode_segments::<LittleEndian>(values)?,
            Endianness::Big => self.encode_segments::<BigEndian>(values)?,
        };
        let message = codec::seal(self.auth_crc.as_ref(), body);
        Ok(codec::seal(self.integrity_crc.as_ref(), message))
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<FrameValues, CodecError> {
        let message = codec::open(self.integrity_crc.as_ref(), bytes, ChecksumLayer::Integrity, "frame")?;
        let body = codec::open(self.auth_crc.as_ref(), message, ChecksumLayer::Authentication, "frame")?;
        let collected = match self.endianness {
            Endianness::Little => self.decode_segments::<LittleEndian>(body)?,
            Endianness::Big => self.decode_segments::<BigEndian>(body)?,
        };
        Ok(collected
            .into_iter()
            .map(|(name, mut instances)| {
                let value = if instances.len() == 1 {
                    Value::Struct(instances.remove(0))
                } else {
                    Value::List(instances.into_iter().map(Value::Struct).collect())
                };
                (name, value)
            })
            .collect())
    }

    fn encode_segments<B: ByteOrder>(&self, values: &FrameValues) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        for (name, value) in values {
            let s = self
                .get_struct(name)
                .ok_or_else(|| CodecError::UnknownStruct(name.clone()))?;
            let code = s.code().ok_or_else(|| ConfigError::MissingCode(name.clone()))?;
            let instances = s.instances_of(value)?;
            let payload = s.encode_payload(&instances, self.endianness)?;
            let len = u16::try_from(payload.len()).map_err(|_| CodecError::SegmentTooLong {
                structure: name.clone(),
                len: payload.len(),
            })?;
            out.write_u16::<B>(len)?;
            out.write_u16::<B>(code)?;
            out.extend_from_slice(&payload);
        }
        Ok(out)
    }

    fn decode_segments<B: ByteOrder>(&self, body: &[u8]) -> Result<BTreeMap<String, Vec<Fields>>, CodecError> {
        let mut r = Reader::new(body);
        let mut out: BTreeMap<String, Vec<Fields>> = BTreeMap::new();
        while !r.is_empty() {
            let offset = r.position();
            let available = r.remaining();
            let header = r
                .take(SEGMENT_HEADER_LEN)
                .ok_or(CodecError::TruncatedHeader { offset, available })?;
            let len = B::read_u16(&header[0..2]) as usize;
            let code = B::read_u16(&header[2..4]);
            let s = self
                .struct_by_code(code)
                .ok_or(CodecError::UnknownStructCode(code))?;
            let available = r.remaining();
            let payload = r.take(len).ok_or_else(|| CodecError::SegmentOverrun {
                structure: s.name().to_string(),
                declared: len,
                available,
            })?;
            let instances = s.decode_payload(payload, self.endianness)?;
            tracing::trace!(code, name = s.name(), len, instances = instances.len(), "decoded segment");
            out.entry(s.name().to_string()).or_default().extend(instances);
        }
        Ok(out)
    }
}
