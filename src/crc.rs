//! Table-driven CRC engine for 8, 16 and 32 bit algorithms.
//!
//! An algorithm is described by [`CrcParams`] (width, polynomial, initial value,
//! input/output reflection, output XOR). [`Crc`] precomputes the 256-entry lookup
//! table once and is immutable afterwards, so one instance can be shared by any
//! number of encoders and decoders.
//!
//! Envelopes produced by [`Crc::encode`] are `message || checksum`, the checksum
//! written most-significant byte first (`width / 8` bytes) unless the algorithm
//! sets [`CrcParams::swap`].

use crate::codec::ConfigError;
use std::fmt;

/// Parameters of a CRC algorithm, in the usual catalogue notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcParams {
    /// Register width in bits: 8, 16 or 32.
    pub width: u8,
    pub poly: u32,
    pub init: u32,
    /// Reverse the bit order of every input byte.
    pub refin: bool,
    /// Reverse the bit order of the final register.
    pub refout: bool,
    pub xorout: u32,
    /// Append/read the checksum least-significant byte first (Modbus RTU order).
    /// Does not change the value returned by [`Crc::checksum`].
    pub swap: bool,
}

impl CrcParams {
    pub const fn new(width: u8, poly: u32, init: u32, refin: bool, refout: bool, xorout: u32) -> Self {
        CrcParams {
            width,
            poly,
            init,
            refin,
            refout,
            xorout,
            swap: false,
        }
    }

    pub const fn with_swap(mut self, swap: bool) -> Self {
        self.swap = swap;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.width, 8 | 16 | 32) {
            return Err(ConfigError::UnsupportedCrcWidth(self.width));
        }
        let mask = width_mask(self.width);
        for (param, value) in [("poly", self.poly), ("init", self.init), ("xorout", self.xorout)] {
            if value & !mask != 0 {
                return Err(ConfigError::CrcParamOverflow {
                    param,
                    value,
                    width: self.width,
                });
            }
        }
        Ok(())
    }
}

/// Why a CRC envelope could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrcError {
    #[error("{len} bytes is too short to carry a {width}-bit checksum")]
    TooShort { width: u8, len: usize },
    #[error("checksum mismatch: received {received:#x}, computed {computed:#x}")]
    Mismatch { received: u32, computed: u32 },
}

/// A CRC algorithm with its precomputed lookup table.
#[derive(Clone)]
pub struct Crc {
    params: CrcParams,
    table: [u32; 256],
}

/// CRC-32 (ISO-HDLC): check value `0xCBF43926`.
pub static CRC_32: Crc = Crc::from_params(CrcParams::new(32, 0x04C1_1DB7, 0xFFFF_FFFF, true, true, 0xFFFF_FFFF));
/// CRC-16/KERMIT: check value `0x2189`.
pub static CRC_16_KERMIT: Crc = Crc::from_params(CrcParams::new(16, 0x1021, 0x0000, true, true, 0x0000));
/// CRC-16/MODBUS: check value `0x4B37`.
pub static CRC_16_MODBUS: Crc = Crc::from_params(CrcParams::new(16, 0x8005, 0xFFFF, true, true, 0x0000));
/// CRC-8 (SMBus polynomial 0x07): check value `0xF4`.
pub static CRC_8: Crc = Crc::from_params(CrcParams::new(8, 0x07, 0x00, false, false, 0x00));

/// Build an algorithm from runtime parameters.
pub fn register_crc(params: CrcParams) -> Result<Crc, ConfigError> {
    Crc::new(params)
}

/// Look up one of the predefined algorithms by its schema name.
pub fn predefined(name: &str) -> Option<&'static Crc> {
    match name {
        "crc32" => Some(&CRC_32),
        "crc16_kermit" => Some(&CRC_16_KERMIT),
        "crc16_modbus" => Some(&CRC_16_MODBUS),
        "crc8" => Some(&CRC_8),
        _ => None,
    }
}

const fn width_mask(width: u8) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Reverse the low `width` bits of `value`.
const fn reflect(value: u32, width: u8) -> u32 {
    value.reverse_bits() >> (32 - width as u32)
}

const fn build_table(width: u8, poly: u32) -> [u32; 256] {
    let mask = width_mask(width);
    let topbit = 1u32 << (width - 1);
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut remainder = (i as u32) << (width - 8);
        let mut bit = 0;
        while bit < 8 {
            remainder = if remainder & topbit != 0 {
                (remainder << 1) ^ poly
            } else {
                remainder << 1
            };
            bit += 1;
        }
        table[i] = remainder & mask;
        i += 1;
    }
    table
}

impl Crc {
    /// Const constructor for static algorithms. Panics during const evaluation
    /// on an unsupported width; use [`Crc::new`] for runtime parameters.
    pub const fn from_params(params: CrcParams) -> Self {
        assert!(
            params.width == 8 || params.width == 16 || params.width == 32,
            "CRC width must be 8, 16 or 32"
        );
        let mask = width_mask(params.width);
        let params = CrcParams {
            poly: params.poly & mask,
            init: params.init & mask,
            xorout: params.xorout & mask,
            ..params
        };
        Crc {
            params,
            table: build_table(params.width, params.poly),
        }
    }

    pub fn new(params: CrcParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self::from_params(params))
    }

    pub fn params(&self) -> &CrcParams {
        &self.params
    }

    pub fn width(&self) -> u8 {
        self.params.width
    }

    /// Number of checksum bytes appended by [`Crc::encode`].
    pub fn checksum_len(&self) -> usize {
        self.params.width as usize / 8
    }

    /// Compute the checksum of `data`.
    pub fn checksum(&self, data: &[u8]) -> u32 {
        let p = &self.params;
        let mask = width_mask(p.width);
        let shift = p.width as u32 - 8;
        let mut remainder = p.init;
        for &byte in data {
            let byte = if p.refin { byte.reverse_bits() } else { byte };
            let index = (byte ^ (remainder >> shift) as u8) as usize;
            remainder = (self.table[index] ^ (remainder << 8)) & mask;
        }
        if p.refout {
            remainder = reflect(remainder, p.width);
        }
        (remainder ^ p.xorout) & mask
    }

    /// Serialize a checksum in envelope byte order.
    pub fn checksum_bytes(&self, crc: u32) -> Vec<u8> {
        let n = self.checksum_len();
        let mut out = crc.to_be_bytes()[4 - n..].to_vec();
        if self.params.swap {
            out.reverse();
        }
        out
    }

    fn read_checksum(&self, bytes: &[u8]) -> u32 {
        let fold = |acc: u32, b: &u8| (acc << 8) | *b as u32;
        if self.params.swap {
            bytes.iter().rev().fold(0, fold)
        } else {
            bytes.iter().fold(0, fold)
        }
    }

    /// Append the checksum of `buf` to `buf` in place.
    pub fn seal(&self, buf: &mut Vec<u8>) {
        let crc = self.checksum(buf);
        buf.extend_from_slice(&self.checksum_bytes(crc));
    }

    /// Return `message || checksum`.
    pub fn encode(&self, message: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(message.len() + self.checksum_len());
        out.extend_from_slice(message);
        self.seal(&mut out);
        out
    }

    /// Split off and verify the trailing checksum, returning the message.
    pub fn decode<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8], CrcError> {
        let n = self.checksum_len();
        if frame.len() < n {
            return Err(CrcError::TooShort {
                width: self.params.width,
                len: frame.len(),
            });
        }
        let (message, tail) = frame.split_at(frame.len() - n);
        let received = self.read_checksum(tail);
        let computed = self.checksum(message);
        if received != computed {
            return Err(CrcError::Mismatch { received, computed });
        }
        Ok(message)
    }

    pub fn verify(&self, frame: &[u8]) -> bool {
        self.decode(frame).is_ok()
    }
}

impl fmt::Debug for Crc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc").field("params", &self.params).finish_non_exhaustive()
    }
}

impl PartialEq for Crc {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl Eq for Crc {}

impl fmt::Display for Crc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        write!(
            f,
            "CRC-{} poly={:#x} init={:#x} refin={} refout={} xorout={:#x}",
            p.width, p.poly, p.init, p.refin, p.refout, p.xorout
        )
    }
}
