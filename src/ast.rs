//! Abstract Syntax Tree for the schema language.

use crate::field::FieldType;

/// Root schema definition: CRC algorithms, structs and frames in source order.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    pub crcs: Vec<CrcSection>,
    pub structs: Vec<StructSection>,
    pub frames: Vec<FrameSection>,
}

#[derive(Debug, Clone)]
pub struct CrcSection {
    pub name: String,
    pub params: Vec<(String, Literal)>,
}

#[derive(Debug, Clone)]
pub struct StructSection {
    pub name: String,
    pub code: Option<Literal>,
    pub options: Vec<OptionSetting>,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub type_spec: FieldType,
    pub length: Option<Literal>,
    pub unit: Option<String>,
    pub modifiers: Vec<(String, Literal)>,
}

#[derive(Debug, Clone)]
pub struct FrameSection {
    pub name: String,
    pub structs: Vec<String>,
    pub options: Vec<OptionSetting>,
}

/// `key = value;` inside a struct or frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSetting {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Hex(u64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Literal::Int(i) => (*i).try_into().ok(),
            Literal::Hex(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Hex(h) => Some(*h as f64),
            Literal::Float(f) => Some(*f),
            Literal::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            Literal::Int(0) => Some(false),
            Literal::Int(1) => Some(true),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Hex(h) => write!(f, "{:#x}", h),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}
