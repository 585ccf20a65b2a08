//! Wire plumbing shared by the struct and frame codecs: byte order, the error
//! taxonomy, CRC envelope helpers and a bounds-checked reader.

use crate::crc::{Crc, CrcError};
use crate::field::FieldType;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "big" => Ok(Endianness::Big),
            "little" => Ok(Endianness::Little),
            other => Err(format!("unknown endianness {:?} (expected big or little)", other)),
        }
    }
}

/// Invalid protocol definitions, reported while CRCs, structs and frames are built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("code {code} has been used on struct {existing} and cannot be assigned to struct {name}")]
    DuplicateCode {
        code: u16,
        existing: String,
        name: String,
    },
    #[error("struct {0} is registered twice")]
    DuplicateStruct(String),
    #[error("field {field} is declared twice in struct {structure}")]
    DuplicateField { field: String, structure: String },
    #[error("struct {structure}: field name must not be empty")]
    EmptyFieldName { structure: String },
    #[error("field {field}: scale must be finite and non-zero, got {scale}")]
    InvalidScale { field: String, scale: f64 },
    #[error("field {field}: offset must be finite, got {offset}")]
    InvalidOffset { field: String, offset: f64 },
    #[error("field {field}: array length must be at least 1")]
    ZeroLength { field: String },
    #[error("unsupported CRC width {0} (expected 8, 16 or 32)")]
    UnsupportedCrcWidth(u8),
    #[error("CRC parameter {param} = {value:#x} does not fit in {width} bits")]
    CrcParamOverflow {
        param: &'static str,
        value: u32,
        width: u8,
    },
    #[error("struct {0} has no code and cannot be multiplexed in a frame")]
    MissingCode(String),
}

/// Which CRC envelope rejected a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumLayer {
    /// Per-instance CRC of a struct.
    Instance,
    /// Message-level authentication CRC.
    Authentication,
    /// Message-level integrity CRC (outermost).
    Integrity,
}

impl fmt::Display for ChecksumLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChecksumLayer::Instance => "instance",
            ChecksumLayer::Authentication => "authentication",
            ChecksumLayer::Integrity => "integrity",
        })
    }
}

/// Coarse classification of [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Encoding,
    Checksum,
    Framing,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("field {field} not found in struct {structure}")]
    MissingField { field: String, structure: String },
    #[error("field {field} of struct {structure}: expected {expected}, got {found}")]
    Shape {
        field: String,
        structure: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field {field} of struct {structure}: expected {expected} elements, got {actual}")]
    ArrayLength {
        field: String,
        structure: String,
        expected: usize,
        actual: usize,
    },
    #[error("field {field} of struct {structure}: {value} is out of range for {kind}")]
    OutOfRange {
        field: String,
        structure: String,
        value: f64,
        kind: FieldType,
    },
    #[error("field {field} of struct {structure}: string contains a NUL byte")]
    InteriorNul { field: String, structure: String },
    #[error("field {field} of struct {structure}: {len} bytes exceed the 65535 byte blob limit")]
    BlobTooLong {
        field: String,
        structure: String,
        len: usize,
    },
    #[error("struct {structure}: segment payload of {len} bytes exceeds 65535")]
    SegmentTooLong { structure: String, len: usize },
    #[error("unknown struct {0}")]
    UnknownStruct(String),
    #[error("{layer} CRC of {owner} is not correct: {source}")]
    Checksum {
        layer: ChecksumLayer,
        owner: String,
        #[source]
        source: CrcError,
    },
    #[error("struct with code {0} not found")]
    UnknownStructCode(u16),
    #[error("struct {structure}, field {field}: need {needed} bytes, {available} available")]
    Truncated {
        structure: String,
        field: String,
        needed: usize,
        available: usize,
    },
    #[error("segment header at offset {offset}: need 4 bytes, {available} available")]
    TruncatedHeader { offset: usize, available: usize },
    #[error("segment of struct {structure} declares {declared} bytes, {available} available")]
    SegmentOverrun {
        structure: String,
        declared: usize,
        available: usize,
    },
    #[error("struct {structure}, field {field}: string is not NUL terminated")]
    UnterminatedString { structure: String, field: String },
    #[error("struct {structure}, field {field}: string is not valid UTF-8")]
    InvalidUtf8 { structure: String, field: String },
    #[error("struct {structure}: {remaining} trailing bytes do not form an instance")]
    TrailingBytes { structure: String, remaining: usize },
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Config(_) => ErrorKind::Configuration,
            CodecError::Io(_)
            | CodecError::MissingField { .. }
            | CodecError::Shape { .. }
            | CodecError::ArrayLength { .. }
            | CodecError::OutOfRange { .. }
            | CodecError::InteriorNul { .. }
            | CodecError::BlobTooLong { .. }
            | CodecError::SegmentTooLong { .. }
            | CodecError::UnknownStruct(_) => ErrorKind::Encoding,
            CodecError::Checksum { .. } => ErrorKind::Checksum,
            CodecError::UnknownStructCode(_)
            | CodecError::Truncated { .. }
            | CodecError::TruncatedHeader { .. }
            | CodecError::SegmentOverrun { .. }
            | CodecError::UnterminatedString { .. }
            | CodecError::InvalidUtf8 { .. }
            | CodecError::TrailingBytes { .. } => ErrorKind::Framing,
        }
    }

    /// The envelope that failed, for checksum errors.
    pub fn checksum_layer(&self) -> Option<ChecksumLayer> {
        match self {
            CodecError::Checksum { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

/// Wrap `data` with `crc` when the envelope is configured.
pub(crate) fn seal(crc: Option<&Crc>, mut data: Vec<u8>) -> Vec<u8> {
    if let Some(crc) = crc {
        crc.seal(&mut data);
    }
    data
}

/// Verify and strip the envelope `crc` when configured.
pub(crate) fn open<'a>(
    crc: Option<&Crc>,
    data: &'a [u8],
    layer: ChecksumLayer,
    owner: &str,
) -> Result<&'a [u8], CodecError> {
    let Some(crc) = crc else {
        return Ok(data);
    };
    crc.decode(data).map_err(|source| {
        tracing::debug!(%layer, owner, error = %source, "checksum rejected buffer");
        CodecError::Checksum {
            layer,
            owner: owner.to_string(),
            source,
        }
    })
}

/// Forward-only cursor over an input buffer that never reads past its end.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.remaining() {
            return None;
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(out)
    }

    /// Offset of the next `byte` relative to the current position.
    pub(crate) fn find(&self, byte: u8) -> Option<usize> {
        self.buf[self.pos..].iter().position(|&b| b == byte)
    }

    /// Bytes consumed since `start`.
    pub(crate) fn since(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }
}
