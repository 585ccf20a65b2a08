//! Format decoded values for display. Struct definitions supply field order and units.

use crate::field::Field;
use crate::frame::{Frame, FrameValues};
use crate::structure::Struct;
use crate::value::{Fields, Value};

/// Raw scalar string.
pub fn format_scalar(v: &Value) -> String {
    match v {
        Value::U8(x) => format!("{}", x),
        Value::U16(x) => format!("{}", x),
        Value::U32(x) => format!("{}", x),
        Value::U64(x) => format!("{}", x),
        Value::I8(x) => format!("{}", x),
        Value::I16(x) => format!("{}", x),
        Value::I32(x) => format!("{}", x),
        Value::I64(x) => format!("{}", x),
        Value::Float(x) => format!("{}", x),
        Value::Double(x) => format!("{}", x),
        Value::Str(s) => format!("{:?}", s),
        Value::Bytes(b) => format!("hex({})", hex::encode(b)),
        _ => format!("{:?}", v),
    }
}

/// Format a value without schema information. Struct keys are sorted.
pub fn format_value(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Struct(m) => {
            let mut lines = vec![format!("{}{{", pad)];
            let mut keys: Vec<_> = m.keys().collect();
            keys.sort();
            for k in keys {
                let sub = format_value(&m[k], indent + 1);
                lines.push(format!("{}  {}: {}", pad, k, sub.trim_start()));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::List(lst) if lst.iter().all(|x| !matches!(x, Value::Struct(_))) => {
            let items: Vec<String> = lst.iter().map(format_scalar).collect();
            format!("{}[{}]", pad, items.join(", "))
        }
        Value::List(lst) => {
            let mut lines = vec![format!("{}[", pad)];
            for (i, item) in lst.iter().enumerate() {
                let sub = format_value(item, indent + 1);
                lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        other => format!("{}{}", pad, format_scalar(other)),
    }
}

fn format_field(field: &Field, v: &Value) -> String {
    let text = format_value(v, 0);
    if field.unit_str().is_empty() {
        text
    } else {
        format!("{} {}", text, field.unit_str())
    }
}

/// One instance, fields in declaration order with their units.
/// Values with no matching field are listed afterwards, sorted by name.
pub fn format_fields(s: &Struct, values: &Fields, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let mut lines = vec![format!("{}{} {{", pad, s)];
    for field in s {
        if let Some(v) = values.get(field.name()) {
            lines.push(format!("{}  {}: {}", pad, field.name(), format_field(field, v)));
        }
    }
    let mut extra: Vec<_> = values.keys().filter(|k| s.get_field(k).is_none()).collect();
    extra.sort();
    for k in extra {
        lines.push(format!("{}  {}: {}", pad, k, format_value(&values[k], 0)));
    }
    lines.push(format!("{}}}", pad));
    lines.join("\n")
}

/// A decoded struct value: one instance or a list of instances.
pub fn format_struct_value(s: &Struct, v: &Value, indent: usize) -> String {
    match v.instances() {
        Some(instances) if matches!(v, Value::Struct(_)) => format_fields(s, instances[0], indent),
        Some(instances) => {
            let pad = "  ".repeat(indent);
            let mut lines = vec![format!("{}[", pad)];
            for (i, inst) in instances.iter().enumerate() {
                lines.push(format!("{}  [{}]", pad, i));
                lines.push(format_fields(s, inst, indent + 1));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        None => format_value(v, indent),
    }
}

/// Every segment of a decoded frame, in name order.
pub fn format_frame(frame: &Frame, values: &FrameValues) -> String {
    values
        .iter()
        .map(|(name, v)| match frame.get_struct(name) {
            Some(s) => format_struct_value(s, v, 0),
            None => format!("{}: {}", name, format_value(v, 0).trim_start()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
