//! Parse schema source into AST using PEST.

use crate::ast::*;
use crate::field::FieldType;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse schema source into AST.
pub fn parse(source: &str) -> Result<Protocol, String> {
    let pairs = SchemaParser::parse(Rule::protocol, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_protocol(pair)
}

fn build_protocol(pair: pest::iterators::Pair<Rule>) -> Result<Protocol, String> {
    let mut crcs = Vec::new();
    let mut structs = Vec::new();
    let mut frames = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::crc_section => crcs.push(build_crc(inner)?),
            Rule::struct_section => structs.push(build_struct(inner)?),
            Rule::frame_section => frames.push(build_frame(inner)?),
            _ => {}
        }
    }

    Ok(Protocol { crcs, structs, frames })
}

fn build_crc(pair: pest::iterators::Pair<Rule>) -> Result<CrcSection, String> {
    let mut name = String::new();
    let mut params = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::crc_param => {
                let mut it = inner.into_inner();
                let key = it.next().ok_or("crc param: name")?.as_str().to_string();
                let value = it.next().ok_or("crc param: value")?;
                params.push((key, parse_literal(value.as_str())?));
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("crc section: missing name".to_string());
    }
    Ok(CrcSection { name, params })
}

fn build_struct(pair: pest::iterators::Pair<Rule>) -> Result<StructSection, String> {
    let mut name = String::new();
    let mut code = None;
    let mut options = Vec::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::struct_code => {
                let n = inner.into_inner().next().ok_or("struct code: value")?;
                code = Some(parse_literal(n.as_str())?);
            }
            Rule::option => options.push(build_option(inner)?),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("struct section: missing name".to_string());
    }
    Ok(StructSection { name, code, options, fields })
}

fn build_field(pair: pest::iterators::Pair<Rule>) -> Result<FieldDef, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("field: name")?.as_str().to_string();
    let type_pair = it.next().ok_or("field: type")?;
    let type_spec: FieldType = type_pair
        .as_str()
        .parse()
        .map_err(|e| format!("field {}: {}", name, e))?;
    let mut length = None;
    let mut unit = None;
    let mut modifiers = Vec::new();
    for part in it {
        match part.as_rule() {
            Rule::array_len => {
                let n = part.into_inner().next().ok_or("field: array length")?;
                length = Some(parse_literal(n.as_str())?);
            }
            Rule::unit => {
                let s = part.into_inner().next().ok_or("field: unit")?;
                unit = Some(unescape(string_body(s)?));
            }
            Rule::modifier => {
                let mut m = part.into_inner();
                let key = m.next().ok_or("modifier: name")?.as_str().to_string();
                let value = m.next().ok_or("modifier: value")?;
                modifiers.push((key, parse_literal(value.as_str())?));
            }
            _ => {}
        }
    }
    Ok(FieldDef {
        name,
        type_spec,
        length,
        unit,
        modifiers,
    })
}

fn build_frame(pair: pest::iterators::Pair<Rule>) -> Result<FrameSection, String> {
    let mut name = String::new();
    let mut structs = Vec::new();
    let mut options = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::frame_structs => {
                for part in inner.into_inner() {
                    if part.as_rule() == Rule::ident {
                        structs.push(part.as_str().to_string());
                    }
                }
            }
            Rule::option => options.push(build_option(inner)?),
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("frame section: missing name".to_string());
    }
    Ok(FrameSection { name, structs, options })
}

fn build_option(pair: pest::iterators::Pair<Rule>) -> Result<OptionSetting, String> {
    let mut it = pair.into_inner();
    let key = it.next().ok_or("option: key")?.as_str().to_string();
    let value = it.next().ok_or("option: value")?.as_str().to_string();
    Ok(OptionSetting { key, value })
}

fn string_body(pair: pest::iterators::Pair<Rule>) -> Result<&str, String> {
    pair.into_inner()
        .next()
        .map(|p| p.as_str())
        .ok_or_else(|| "string: body".to_string())
}

fn unescape(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t").replace("\\\"", "\"").replace("\\\\", "\\")
}

fn parse_literal(s: &str) -> Result<Literal, String> {
    let s = s.trim();
    match s {
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let n = u64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex literal {}: {}", s, e))?;
        if !negative {
            return Ok(Literal::Hex(n));
        }
        return i64::try_from(n)
            .map(|v| Literal::Int(-v))
            .map_err(|_| format!("hex literal out of range: {}", s));
    }
    if let Ok(n) = s.parse::<i64>() {
        return Ok(Literal::Int(n));
    }
    s.parse::<f64>()
        .map(Literal::Float)
        .map_err(|e| format!("invalid number {}: {}", s, e))
}
