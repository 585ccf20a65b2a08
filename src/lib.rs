//! # binframe: CRC-protected binary structs and multiplexed frames
//!
//! Three layers, each usable on its own:
//!
//! - **CRC**: table-driven 8/16/32-bit CRC algorithms with arbitrary parameters,
//!   plus the common predefined ones (CRC-32, KERMIT, MODBUS, CRC-8).
//! - **Struct**: an ordered list of typed fields with unit conversion
//!   (`raw = value * scale + offset`), optional transform hooks and up to three
//!   CRC envelopes (per instance, authentication, integrity).
//! - **Frame**: several struct types multiplexed into one message as
//!   `length | code | payload` segments, wrapped in its own CRC envelopes.
//!
//! ## Field types
//!
//! - Integers: `u8`, `u16`, `u32`, `u64`, `i8`, `i16`, `i32`, `i64`
//! - Floating point: `float`, `double`
//! - `string` (NUL-terminated UTF-8) and `bytes` (`u16` length prefix)
//! - `T[n]`: fixed-length numeric arrays
//!
//! ## Example schema
//!
//! ```text
//! crc auth16 { width: 16; poly: 0x1021; init: 0xFFFF; }
//!
//! struct modem = 1 {
//!   instance = crc8;
//!   uid: u8[12];
//!   sig_power: float "dBm";
//!   latitude: i32 "deg" scale(100000) precision(5);
//! }
//!
//! frame telemetry {
//!   structs: modem;
//!   auth = auth16;
//! }
//! ```
//!
//! ## Usage
//!
//! Build structs and frames in code with [`Struct`], [`Field`] and [`Frame::builder`],
//! or load them with [`Schema::parse`]. See `tests/integration.rs` for full examples.

pub mod ast;
pub mod codec;
pub mod crc;
pub mod dump;
pub mod field;
pub mod frame;
pub mod parser;
pub mod schema;
pub mod structure;
pub mod value;

pub use codec::{ChecksumLayer, CodecError, ConfigError, Endianness, ErrorKind};
pub use crc::{predefined, register_crc, Crc, CrcError, CrcParams, CRC_16_KERMIT, CRC_16_MODBUS, CRC_32, CRC_8};
pub use field::{Field, FieldType};
pub use frame::{Frame, FrameBuilder, FrameValues, Registry};
pub use parser::parse;
pub use schema::{Schema, SchemaError};
pub use structure::Struct;
pub use value::{Fields, Value};
