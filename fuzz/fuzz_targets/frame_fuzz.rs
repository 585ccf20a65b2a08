//! Frame fuzz target: decode arbitrary bytes with a frame that has no integrity CRC,
//! so the segment parser sees the input directly. Decoding must not panic.
//! Build with: cargo fuzz run frame_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = r#"
struct modem = 1 {
  instance = crc8;
  uid: u8[4];
  label: string;
  level: i16 scale(10) offset(-5);
}
struct meter = 2 {
  voltage: u16 "V";
  raw: bytes;
}
struct empty = 3 { }
frame open {
  structs: modem, meter, empty;
  integrity = none;
}
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(schema) = binframe::Schema::parse(SCHEMA) else {
        return;
    };
    let Some(frame) = schema.frame("open") else {
        return;
    };
    if let Ok(values) = frame.decode(data) {
        let _ = frame.encode(&values);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run frame_fuzz");
}
