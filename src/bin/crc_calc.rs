//! Compute or check a CRC over hex or text input.
//!
//! ```text
//! crc_calc [-v] [--algo NAME] [--schema FILE] [--text] [--verify] <input>
//! ```
//!
//! `NAME` is one of the predefined algorithms (crc32, crc16_kermit, crc16_modbus,
//! crc8) or a `crc` section of the schema given with `--schema`. With `--verify`
//! the input is treated as `message || checksum` and checked.

use anyhow::Context;
use binframe::{predefined, Crc, Schema};
use tracing_subscriber::EnvFilter;

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn take_value(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    args.remove(pos);
    if pos >= args.len() {
        anyhow::bail!("{} requires a value", flag);
    }
    Ok(Some(args.remove(pos)))
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = take_flag(&mut args, "-v") | take_flag(&mut args, "--verbose");
    let text = take_flag(&mut args, "--text");
    let verify = take_flag(&mut args, "--verify");
    let algo = take_value(&mut args, "--algo")?.unwrap_or_else(|| "crc32".to_string());
    let schema_path = take_value(&mut args, "--schema")?;

    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();

    let input = args
        .into_iter()
        .next()
        .context("usage: crc_calc [-v] [--algo NAME] [--schema FILE] [--text] [--verify] <input>")?;
    let data = if text {
        input.into_bytes()
    } else {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact.strip_prefix("0x").unwrap_or(&compact)).context("invalid hex input")?
    };

    let schema = match &schema_path {
        Some(p) => Some(Schema::from_file(p).with_context(|| format!("loading schema {}", p))?),
        None => None,
    };
    let crc: &Crc = match &schema {
        Some(s) => s.crc(&algo),
        None => predefined(&algo),
    }
    .with_context(|| format!("unknown CRC algorithm {}", algo))?;
    tracing::debug!(algorithm = %crc, len = data.len(), "computing checksum");

    if verify {
        let payload = crc.decode(&data)?;
        println!("ok: {} payload bytes", payload.len());
        return Ok(());
    }
    let sum = crc.checksum(&data);
    let width = crc.checksum_len() * 2;
    println!("checksum: 0x{:0width$x}", sum, width = width);
    println!("sealed:   {}", hex::encode(crc.encode(&data)));
    Ok(())
}
