//! Resolve a parsed schema into ready-to-use CRCs, structs and frames.
//!
//! Struct codes are registered in a single [`Registry`] while the schema is
//! resolved, so a code can only be claimed once per schema no matter how many
//! frames reuse the struct.

use crate::ast::{CrcSection, FieldDef, FrameSection, Literal, OptionSetting, Protocol, StructSection};
use crate::codec::{ConfigError, Endianness};
use crate::crc::{self, Crc, CrcParams};
use crate::field::Field;
use crate::frame::{Frame, Registry};
use crate::parser;
use crate::structure::Struct;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{0}")]
    Parse(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{owner}: unknown CRC {name}")]
    UnknownCrc { owner: String, name: String },
    #[error("frame {frame}: unknown struct {name}")]
    UnknownStruct { frame: String, name: String },
    #[error("{owner}: unknown option {option}")]
    UnknownOption { owner: String, option: String },
    #[error("{owner}: invalid value {value} for {option}")]
    InvalidValue {
        owner: String,
        option: String,
        value: String,
    },
    #[error("{owner}: missing required {option}")]
    MissingValue { owner: String, option: &'static str },
    #[error("duplicate {kind} {name}")]
    Duplicate { kind: &'static str, name: String },
}

/// A resolved schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    crcs: HashMap<String, Crc>,
    structs: Vec<Struct>,
    struct_index: HashMap<String, usize>,
    frames: Vec<(String, Frame)>,
    frame_index: HashMap<String, usize>,
    registry: Registry,
}

impl Schema {
    /// Parse and resolve schema source.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let protocol = parser::parse(source).map_err(SchemaError::Parse)?;
        Self::resolve(&protocol)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }

    pub fn resolve(protocol: &Protocol) -> Result<Self, SchemaError> {
        let mut schema = Schema::default();
        for section in &protocol.crcs {
            schema.define_crc(section)?;
        }
        for section in &protocol.structs {
            schema.define_struct(section)?;
        }
        for section in &protocol.frames {
            schema.define_frame(section)?;
        }
        tracing::debug!(
            crcs = schema.crcs.len(),
            structs = schema.structs.len(),
            frames = schema.frames.len(),
            "resolved schema"
        );
        Ok(schema)
    }

    /// Custom CRC by name, falling back to the predefined algorithms.
    pub fn crc(&self, name: &str) -> Option<&Crc> {
        self.crcs.get(name).or_else(|| crc::predefined(name))
    }

    pub fn get_struct(&self, name: &str) -> Option<&Struct> {
        self.struct_index.get(name).map(|&i| &self.structs[i])
    }

    pub fn frame(&self, name: &str) -> Option<&Frame> {
        self.frame_index.get(name).map(|&i| &self.frames[i].1)
    }

    /// Structs in declaration order.
    pub fn structs(&self) -> impl Iterator<Item = &Struct> {
        self.structs.iter()
    }

    /// Frame names in declaration order.
    pub fn frame_names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|(name, _)| name.as_str())
    }

    /// Every struct code declared in the schema.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn define_crc(&mut self, section: &CrcSection) -> Result<(), SchemaError> {
        let owner = format!("crc {}", section.name);
        if self.crc(&section.name).is_some() {
            return Err(SchemaError::Duplicate {
                kind: "crc",
                name: section.name.clone(),
            });
        }
        let mut width = None;
        let mut poly = None;
        let mut params = CrcParams::new(0, 0, 0, false, false, 0);
        for (key, value) in &section.params {
            match key.as_str() {
                "width" => width = Some(int_param::<u8>(&owner, key, value)?),
                "poly" => poly = Some(int_param::<u32>(&owner, key, value)?),
                "init" => params.init = int_param(&owner, key, value)?,
                "xorout" => params.xorout = int_param(&owner, key, value)?,
                "refin" => params.refin = bool_param(&owner, key, value)?,
                "refout" => params.refout = bool_param(&owner, key, value)?,
                "swap" => params.swap = bool_param(&owner, key, value)?,
                other => {
                    return Err(SchemaError::UnknownOption {
                        owner,
                        option: other.to_string(),
                    })
                }
            }
        }
        params.width = width.ok_or_else(|| SchemaError::MissingValue {
            owner: owner.clone(),
            option: "width",
        })?;
        params.poly = poly.ok_or(SchemaError::MissingValue { owner, option: "poly" })?;
        let crc = crc::register_crc(params)?;
        tracing::debug!(name = %section.name, algorithm = %crc, "defined crc");
        self.crcs.insert(section.name.clone(), crc);
        Ok(())
    }

    fn define_struct(&mut self, section: &StructSection) -> Result<(), SchemaError> {
        let owner = format!("struct {}", section.name);
        if self.struct_index.contains_key(&section.name) {
            return Err(SchemaError::Duplicate {
                kind: "struct",
                name: section.name.clone(),
            });
        }
        let mut s = Struct::new(section.name.clone());
        if let Some(code) = &section.code {
            s = s.with_code(int_param(&owner, "code", code)?);
        }
        for opt in &section.options {
            match opt.key.as_str() {
                "endian" => s = s.with_endianness(self.endianness(&owner, opt)?),
                "instance" => {
                    if let Some(crc) = self.crc_option(&owner, opt)? {
                        s = s.with_instance_crc(crc);
                    }
                }
                "auth" => {
                    if let Some(crc) = self.crc_option(&owner, opt)? {
                        s = s.with_auth_crc(crc);
                    }
                }
                "integrity" => {
                    if let Some(crc) = self.crc_option(&owner, opt)? {
                        s = s.with_integrity_crc(crc);
                    }
                }
                other => {
                    return Err(SchemaError::UnknownOption {
                        owner,
                        option: other.to_string(),
                    })
                }
            }
        }
        for def in &section.fields {
            s.add(build_field(&owner, def)?)?;
        }
        self.registry.register_struct(&s)?;
        tracing::debug!(structure = %s, fields = s.fields().len(), "defined struct");
        self.struct_index.insert(section.name.clone(), self.structs.len());
        self.structs.push(s);
        Ok(())
    }

    fn define_frame(&mut self, section: &FrameSection) -> Result<(), SchemaError> {
        let owner = format!("frame {}", section.name);
        if self.frame_index.contains_key(&section.name) {
            return Err(SchemaError::Duplicate {
                kind: "frame",
                name: section.name.clone(),
            });
        }
        let mut builder = Frame::builder();
        for opt in &section.options {
            match opt.key.as_str() {
                "endian" => builder = builder.endianness(self.endianness(&owner, opt)?),
                "auth" => {
                    if let Some(crc) = self.crc_option(&owner, opt)? {
                        builder = builder.auth_crc(crc);
                    }
                }
                "integrity" => builder = builder.integrity_crc(self.crc_option(&owner, opt)?),
                other => {
                    return Err(SchemaError::UnknownOption {
                        owner,
                        option: other.to_string(),
                    })
                }
            }
        }
        for name in &section.structs {
            let s = self.get_struct(name).ok_or_else(|| SchemaError::UnknownStruct {
                frame: section.name.clone(),
                name: name.clone(),
            })?;
            builder = builder.add(s.clone());
        }
        let frame = builder.build()?;
        self.frame_index.insert(section.name.clone(), self.frames.len());
        self.frames.push((section.name.clone(), frame));
        Ok(())
    }

    fn endianness(&self, owner: &str, opt: &OptionSetting) -> Result<Endianness, SchemaError> {
        opt.value.parse().map_err(|_| invalid(owner, &opt.key, &opt.value))
    }

    /// `none` disables the layer.
    fn crc_option(&self, owner: &str, opt: &OptionSetting) -> Result<Option<Crc>, SchemaError> {
        if opt.value == "none" {
            return Ok(None);
        }
        self.crc(&opt.value)
            .cloned()
            .map(Some)
            .ok_or_else(|| SchemaError::UnknownCrc {
                owner: owner.to_string(),
                name: opt.value.clone(),
            })
    }
}

fn build_field(owner: &str, def: &FieldDef) -> Result<Field, SchemaError> {
    let mut field = Field::new(def.type_spec, def.name.clone());
    if let Some(len) = &def.length {
        field = field.length(int_param(owner, &def.name, len)?);
    }
    if let Some(unit) = &def.unit {
        field = field.unit(unit.clone());
    }
    for (key, value) in &def.modifiers {
        let number = value.as_f64().ok_or_else(|| invalid(owner, key, &value.to_string()))?;
        field = match key.as_str() {
            "scale" => field.scale(number),
            "offset" => field.offset(number),
            "precision" => field.precision(int_param(owner, key, value)?),
            other => {
                return Err(SchemaError::UnknownOption {
                    owner: format!("{} field {}", owner, def.name),
                    option: other.to_string(),
                })
            }
        };
    }
    Ok(field)
}

fn int_param<T: TryFrom<u64>>(owner: &str, option: &str, value: &Literal) -> Result<T, SchemaError> {
    value
        .as_u64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| invalid(owner, option, &value.to_string()))
}

fn bool_param(owner: &str, option: &str, value: &Literal) -> Result<bool, SchemaError> {
    value.as_bool().ok_or_else(|| invalid(owner, option, &value.to_string()))
}

fn invalid(owner: &str, option: &str, value: &str) -> SchemaError {
    SchemaError::InvalidValue {
        owner: owner.to_string(),
        option: option.to_string(),
        value: value.to_string(),
    }
}
