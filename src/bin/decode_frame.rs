//! Decode a hex-encoded frame (or a single struct message) against a schema file.
//!
//! ```text
//! decode_frame [-v] [--struct] <schema> <name> [hex]
//! ```
//!
//! The hex payload is read from stdin when not given on the command line.
//! Whitespace inside the hex text is ignored.

use anyhow::Context;
use binframe::dump::{format_frame, format_struct_value};
use binframe::Schema;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn read_hex(arg: Option<String>) -> anyhow::Result<Vec<u8>> {
    let text = match arg {
        Some(s) => s,
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s)?;
            s
        }
    };
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.strip_prefix("0x").unwrap_or(&compact);
    hex::decode(compact).context("invalid hex input")
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = if let Some(pos) = raw_args.iter().position(|a| a == "--verbose" || a == "-v") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let single_struct = if let Some(pos) = raw_args.iter().position(|a| a == "--struct") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    init_logging(verbose);

    let mut args = raw_args.into_iter();
    let (schema_path, name) = match (args.next(), args.next()) {
        (Some(p), Some(n)) => (PathBuf::from(p), n),
        _ => anyhow::bail!("usage: decode_frame [-v] [--struct] <schema> <name> [hex]"),
    };
    let bytes = read_hex(args.next())?;

    let schema = Schema::from_file(&schema_path)
        .with_context(|| format!("loading schema {}", schema_path.display()))?;
    tracing::debug!(path = %schema_path.display(), len = bytes.len(), "decoding");

    if single_struct {
        let s = schema
            .get_struct(&name)
            .with_context(|| format!("no struct named {} in schema", name))?;
        let value = s.decode(&bytes).with_context(|| format!("decoding struct {}", name))?;
        println!("{}", format_struct_value(s, &value, 0));
    } else {
        let frame = schema
            .frame(&name)
            .with_context(|| format!("no frame named {} in schema", name))?;
        let values = frame.decode(&bytes).with_context(|| format!("decoding frame {}", name))?;
        println!("{}", format_frame(frame, &values));
    }
    Ok(())
}
