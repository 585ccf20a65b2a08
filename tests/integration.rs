//! Integration tests: struct encode/decode, CRC envelopes, frame multiplexing and error taxonomy.

use binframe::{
    ChecksumLayer, CodecError, ConfigError, Endianness, ErrorKind, Field, FieldType, Fields, Frame,
    FrameValues, Registry, Struct, Value, CRC_16_KERMIT, CRC_32, CRC_8,
};

fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn xyz() -> Struct {
    Struct::new("xyz")
        .with_integrity_crc(CRC_32.clone())
        .field(Field::new(FieldType::U16, "x"))
        .unwrap()
        .field(Field::new(FieldType::U16, "y"))
        .unwrap()
        .field(Field::new(FieldType::U16, "z"))
        .unwrap()
}

fn type_a() -> Struct {
    Struct::new("type_a")
        .with_code(1)
        .field(Field::new(FieldType::U8, "a"))
        .unwrap()
}

fn type_b() -> Struct {
    Struct::new("type_b")
        .with_code(2)
        .field(Field::new(FieldType::I16, "b"))
        .unwrap()
}

fn point(x: u16, y: u16, z: u16) -> Fields {
    fields(&[("x", Value::U16(x)), ("y", Value::U16(y)), ("z", Value::U16(z))])
}

// ==================== Struct codec ====================

#[test]
fn test_xyz_two_instances_with_integrity_crc() {
    let s = xyz();
    let bytes = s.encode_many(&[point(1, 2, 3), point(4, 5, 6)]).expect("encode");
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[..12], &[1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0]);
    assert_eq!(&bytes[12..], &CRC_32.checksum(&bytes[..12]).to_be_bytes());

    let decoded = s.decode(&bytes).expect("decode");
    assert_eq!(
        decoded,
        Value::List(vec![Value::Struct(point(1, 2, 3)), Value::Struct(point(4, 5, 6))])
    );
}

#[test]
fn test_single_instance_decodes_to_struct() {
    let s = xyz();
    let bytes = s.encode(&point(7, 8, 9)).expect("encode");
    assert_eq!(s.decode(&bytes).expect("decode"), Value::Struct(point(7, 8, 9)));
}

#[test]
fn test_encode_value_accepts_struct_or_list() {
    let s = xyz();
    let one = s.encode_value(&Value::Struct(point(1, 1, 1))).expect("struct");
    let many = s
        .encode_value(&Value::List(vec![Value::Struct(point(1, 1, 1)), Value::Struct(point(2, 2, 2))]))
        .expect("list");
    assert_eq!(one.len(), 10);
    assert_eq!(many.len(), 16);
    let err = s.encode_value(&Value::U8(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn test_scaled_fields_and_units() {
    let modem = Struct::new("modem")
        .field(Field::new(FieldType::Float, "sig_power").unit("dBm"))
        .unwrap()
        .field(Field::new(FieldType::I32, "latitude").unit("deg").scale(100000.0).precision(5))
        .unwrap()
        .field(Field::new(FieldType::U16, "temp").unit("C").scale(10.0).offset(400.0))
        .unwrap();
    let values = fields(&[
        ("sig_power", Value::Double(-71.5)),
        ("latitude", Value::Double(47.25)),
        ("temp", Value::Double(21.5)),
    ]);
    let bytes = modem.encode(&values).expect("encode");
    assert_eq!(bytes.len(), 4 + 4 + 2);
    assert_eq!(&bytes[8..], &615u16.to_le_bytes());

    let decoded = modem.decode_all(&bytes).expect("decode");
    let inst = &decoded[0];
    assert_eq!(inst["sig_power"], Value::Float(-71.5));
    assert_eq!(inst["latitude"], Value::Double(47.25));
    assert_eq!(inst["temp"], Value::Double(21.5));
    assert_eq!(modem.get_field("temp").unwrap().to_string(), "temp[C]");
}

#[test]
fn test_strings_and_blobs() {
    let s = Struct::new("tagged")
        .field(Field::new(FieldType::Str, "label"))
        .unwrap()
        .field(Field::new(FieldType::Bytes, "blob"))
        .unwrap();
    let values = fields(&[("label", Value::from("abc")), ("blob", Value::Bytes(vec![9, 8, 7]))]);
    let bytes = s.encode(&values).expect("encode");
    assert_eq!(bytes, vec![b'a', b'b', b'c', 0, 3, 0, 9, 8, 7]);
    assert_eq!(s.decode(&bytes).expect("decode"), Value::Struct(values));
}

#[test]
fn test_empty_string_and_blob_round_trip() {
    let s = Struct::new("empty")
        .field(Field::new(FieldType::Bytes, "blob"))
        .unwrap()
        .field(Field::new(FieldType::Str, "name"))
        .unwrap();
    let values = fields(&[("blob", Value::Bytes(vec![])), ("name", Value::from(""))]);
    let bytes = s.encode(&values).expect("encode");
    assert_eq!(bytes, vec![0, 0, 0]);
    assert_eq!(s.decode(&bytes).expect("decode"), Value::Struct(values));
}

#[test]
fn test_array_with_scale_and_offset() {
    let s = Struct::new("samples")
        .field(Field::new(FieldType::I16, "v").length(3).scale(10.0).offset(5.0))
        .unwrap();
    let input = [0.5, -2.5, 3.0];
    let values = fields(&[("v", input.iter().map(|&x| Value::Double(x)).collect())]);
    let bytes = s.encode(&values).expect("encode");
    assert_eq!(bytes.len(), 6);
    assert_eq!(s.fixed_size(), Some(6));

    let decoded = s.decode_all(&bytes).expect("decode");
    let list = decoded[0]["v"].as_list().expect("list");
    assert_eq!(list.len(), 3);
    for (got, want) in list.iter().zip(input) {
        assert!((got.as_f64().unwrap() - want).abs() < 0.1);
    }
}

#[test]
fn test_array_length_mismatch() {
    let s = Struct::new("samples")
        .field(Field::new(FieldType::U8, "v").length(4))
        .unwrap();
    let values = fields(&[("v", vec![Value::U8(1), Value::U8(2)].into_iter().collect())]);
    let err = s.encode(&values).unwrap_err();
    assert!(matches!(err, CodecError::ArrayLength { expected: 4, actual: 2, .. }));

    let scalar = fields(&[("v", Value::U8(1))]);
    let err = s.encode(&scalar).unwrap_err();
    assert!(matches!(err, CodecError::Shape { .. }));
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn test_transform_hooks() {
    fn square(x: f64) -> f64 {
        x * x
    }
    fn root(x: f64) -> f64 {
        x.sqrt()
    }
    let s = Struct::new("hooked")
        .field(Field::new(FieldType::U32, "energy").on_encode(square).on_decode(root))
        .unwrap();
    let bytes = s.encode(&fields(&[("energy", Value::U32(12))])).expect("encode");
    assert_eq!(bytes, 144u32.to_le_bytes().to_vec());
    let decoded = s.decode_all(&bytes).expect("decode");
    assert_eq!(decoded[0]["energy"], Value::Double(12.0));
}

#[test]
fn test_missing_field_names_field_and_struct() {
    let err = xyz().encode(&fields(&[("x", Value::U16(1))])).unwrap_err();
    match &err {
        CodecError::MissingField { field, structure } => {
            assert_eq!(field, "y");
            assert_eq!(structure, "xyz");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn test_out_of_range_value() {
    let s = Struct::new("small").field(Field::new(FieldType::U8, "n")).unwrap();
    let err = s.encode(&fields(&[("n", Value::U16(300))])).unwrap_err();
    assert!(matches!(err, CodecError::OutOfRange { .. }));
    let err = s.encode(&fields(&[("n", Value::I8(-1))])).unwrap_err();
    assert!(matches!(err, CodecError::OutOfRange { .. }));
}

#[test]
fn test_truncated_instance_is_framing_error() {
    let s = Struct::new("xy")
        .field(Field::new(FieldType::U16, "x"))
        .unwrap()
        .field(Field::new(FieldType::U16, "y"))
        .unwrap();
    let err = s.decode(&[1, 0, 2, 0, 3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Framing);
    match err {
        CodecError::Truncated { field, needed, available, .. } => {
            assert_eq!(field, "x");
            assert_eq!(needed, 2);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_unterminated_string() {
    let s = Struct::new("s").field(Field::new(FieldType::Str, "name")).unwrap();
    let err = s.decode(b"abc").unwrap_err();
    assert!(matches!(err, CodecError::UnterminatedString { .. }));
}

#[test]
fn test_empty_struct_with_leftover_bytes() {
    let s = Struct::new("nothing");
    assert_eq!(s.decode(&[]).expect("empty"), Value::List(vec![]));
    let err = s.decode(&[1]).unwrap_err();
    assert!(matches!(err, CodecError::TrailingBytes { remaining: 1, .. }));
}

#[test]
fn test_big_endian_struct() {
    let s = Struct::new("be")
        .with_endianness(Endianness::Big)
        .field(Field::new(FieldType::U16, "x"))
        .unwrap()
        .field(Field::new(FieldType::Bytes, "b"))
        .unwrap();
    let values = fields(&[("x", Value::U16(0x0102)), ("b", Value::Bytes(vec![0xAA]))]);
    let bytes = s.encode(&values).expect("encode");
    assert_eq!(bytes, vec![0x01, 0x02, 0x00, 0x01, 0xAA]);
    assert_eq!(s.decode(&bytes).expect("decode"), Value::Struct(values.clone()));

    let refs = [&values];
    let le = s.encode_with(&refs, Endianness::Little).expect("little");
    assert_eq!(le, vec![0x02, 0x01, 0x01, 0x00, 0xAA]);
}

// ==================== CRC envelopes ====================

#[test]
fn test_auth_inside_integrity() {
    let s = Struct::new("sealed")
        .with_auth_crc(CRC_16_KERMIT.clone())
        .with_integrity_crc(CRC_32.clone())
        .field(Field::new(FieldType::U8, "n"))
        .unwrap();
    let bytes = s.encode(&fields(&[("n", Value::U8(5))])).expect("encode");
    assert_eq!(bytes.len(), 1 + 2 + 4);
    let message = CRC_32.decode(&bytes).expect("integrity");
    let payload = CRC_16_KERMIT.decode(message).expect("auth");
    assert_eq!(payload, &[5]);
}

#[test]
fn test_checksum_layers_are_distinguished() {
    let s = Struct::new("sealed")
        .with_auth_crc(CRC_16_KERMIT.clone())
        .with_integrity_crc(CRC_32.clone())
        .field(Field::new(FieldType::U16, "n"))
        .unwrap();
    let bytes = s.encode(&fields(&[("n", Value::U16(500))])).expect("encode");

    let mut corrupt = bytes.clone();
    corrupt[0] ^= 0x01;
    let err = s.decode(&corrupt).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Checksum);
    assert_eq!(err.checksum_layer(), Some(ChecksumLayer::Integrity));

    // Valid integrity over a corrupted authenticated message.
    let mut message = bytes[..bytes.len() - 4].to_vec();
    message[1] ^= 0x80;
    let resealed = CRC_32.encode(&message);
    let err = s.decode(&resealed).unwrap_err();
    assert_eq!(err.checksum_layer(), Some(ChecksumLayer::Authentication));
}

#[test]
fn test_instance_crc() {
    let s = Struct::new("counted")
        .with_instance_crc(CRC_8.clone())
        .field(Field::new(FieldType::U16, "n"))
        .unwrap();
    let bytes = s
        .encode_many(&[fields(&[("n", Value::U16(1))]), fields(&[("n", Value::U16(2))])])
        .expect("encode");
    assert_eq!(bytes.len(), 6);
    assert_eq!(s.fixed_size(), Some(3));
    assert_eq!(bytes[2] as u32, CRC_8.checksum(&[1, 0]));
    assert_eq!(s.decode_all(&bytes).expect("decode").len(), 2);

    let mut corrupt = bytes.clone();
    corrupt[3] ^= 0x10;
    let err = s.decode(&corrupt).unwrap_err();
    assert_eq!(err.checksum_layer(), Some(ChecksumLayer::Instance));

    let err = s.decode(&bytes[..5]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Framing);
}

// ==================== Frame multiplexer ====================

fn ab_frame() -> Frame {
    Frame::new([type_a(), type_b()]).expect("frame")
}

#[test]
fn test_frame_one_and_two_instances() {
    let frame = ab_frame();
    let mut values = FrameValues::new();
    values.insert("type_a".into(), Value::Struct(fields(&[("a", Value::U8(7))])));
    values.insert(
        "type_b".into(),
        Value::List(vec![
            Value::Struct(fields(&[("b", Value::I16(-1))])),
            Value::Struct(fields(&[("b", Value::I16(300))])),
        ]),
    );
    let bytes = frame.encode(&values).expect("encode");
    assert_eq!(
        &bytes[..13],
        &[1, 0, 1, 0, 7, 4, 0, 2, 0, 0xFF, 0xFF, 0x2C, 0x01]
    );
    assert_eq!(bytes.len(), 13 + 4);

    let decoded = frame.decode(&bytes).expect("decode");
    assert_eq!(decoded, values);
}

#[test]
fn test_frame_absent_structs_contribute_nothing() {
    let frame = ab_frame();
    let mut values = FrameValues::new();
    values.insert("type_b".into(), Value::Struct(fields(&[("b", Value::I16(3))])));
    let bytes = frame.encode(&values).expect("encode");
    assert_eq!(bytes.len(), 4 + 2 + 4);
    let decoded = frame.decode(&bytes).expect("decode");
    assert!(!decoded.contains_key("type_a"));
    assert_eq!(decoded["type_b"], values["type_b"]);
}

#[test]
fn test_frame_repeated_codes_merge_in_wire_order() {
    let frame = ab_frame();
    let body: Vec<u8> = vec![
        2, 0, 2, 0, 1, 0, // type_b b=1
        1, 0, 1, 0, 9, // type_a a=9
        2, 0, 2, 0, 2, 0, // type_b b=2
    ];
    let decoded = frame.decode(&CRC_32.encode(&body)).expect("decode");
    assert_eq!(decoded["type_a"], Value::Struct(fields(&[("a", Value::U8(9))])));
    assert_eq!(
        decoded["type_b"],
        Value::List(vec![
            Value::Struct(fields(&[("b", Value::I16(1))])),
            Value::Struct(fields(&[("b", Value::I16(2))])),
        ])
    );
}

#[test]
fn test_frame_zero_length_segment() {
    let frame = ab_frame();
    let decoded = frame.decode(&CRC_32.encode(&[0, 0, 1, 0])).expect("decode");
    assert_eq!(decoded["type_a"], Value::List(vec![]));
    assert!(frame.decode(&CRC_32.encode(&[])).expect("empty").is_empty());
}

#[test]
fn test_frame_framing_errors() {
    let frame = ab_frame();

    let err = frame.decode(&CRC_32.encode(&[1, 0, 9, 0, 0])).unwrap_err();
    assert!(matches!(err, CodecError::UnknownStructCode(9)));
    assert_eq!(err.kind(), ErrorKind::Framing);

    let err = frame.decode(&CRC_32.encode(&[10, 0, 1, 0, 1, 2])).unwrap_err();
    assert!(matches!(err, CodecError::SegmentOverrun { declared: 10, available: 2, .. }));

    let err = frame.decode(&CRC_32.encode(&[1, 0, 1])).unwrap_err();
    assert!(matches!(err, CodecError::TruncatedHeader { offset: 0, available: 3 }));

    // Payload shorter than one type_b instance.
    let err = frame.decode(&CRC_32.encode(&[1, 0, 2, 0, 5])).unwrap_err();
    assert!(matches!(err, CodecError::Truncated { .. }));
}

#[test]
fn test_frame_checksum_errors() {
    let frame = Frame::builder()
        .add(type_a())
        .auth_crc(CRC_16_KERMIT.clone())
        .build()
        .expect("frame");
    let mut values = FrameValues::new();
    values.insert("type_a".into(), Value::Struct(fields(&[("a", Value::U8(1))])));
    let bytes = frame.encode(&values).expect("encode");
    assert_eq!(bytes.len(), 5 + 2 + 4);

    let mut corrupt = bytes.clone();
    corrupt[4] ^= 0x01;
    let err = frame.decode(&corrupt).unwrap_err();
    assert_eq!(err.checksum_layer(), Some(ChecksumLayer::Integrity));

    let mut message = bytes[..bytes.len() - 4].to_vec();
    message[4] ^= 0x01;
    let err = frame.decode(&CRC_32.encode(&message)).unwrap_err();
    assert_eq!(err.checksum_layer(), Some(ChecksumLayer::Authentication));

    let err = frame.decode(&[1, 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Checksum);
}

#[test]
fn test_frame_without_integrity_big_endian() {
    let frame = Frame::builder()
        .add(type_b())
        .endianness(Endianness::Big)
        .integrity_crc(None)
        .build()
        .expect("frame");
    let mut values = FrameValues::new();
    values.insert("type_b".into(), Value::Struct(fields(&[("b", Value::I16(0x0102))])));
    let bytes = frame.encode(&values).expect("encode");
    assert_eq!(bytes, vec![0, 2, 0, 2, 1, 2]);
    assert_eq!(frame.decode(&bytes).expect("decode"), values);
}

#[test]
fn test_frame_unknown_struct_on_encode() {
    let frame = ab_frame();
    let mut values = FrameValues::new();
    values.insert("nope".into(), Value::Struct(Fields::new()));
    let err = frame.encode(&values).unwrap_err();
    assert!(matches!(err, CodecError::UnknownStruct(ref n) if n == "nope"));
}

#[test]
fn test_frame_lookup() {
    let frame = ab_frame();
    assert_eq!(frame.struct_by_code(2).map(Struct::name), Some("type_b"));
    assert_eq!(frame.registry().name_of(1), Some("type_a"));
    assert_eq!(frame.registry().len(), 2);
    assert_eq!(frame.structs().count(), 2);
    assert_eq!(frame.integrity_crc(), Some(&CRC_32));
    assert!(frame.auth_crc().is_none());
    assert_eq!(type_a().to_string(), "1:type_a");
}

// ==================== Configuration ====================

#[test]
fn test_duplicate_code_rejected() {
    let clash = Struct::new("clash").with_code(1);
    let err = Frame::new([type_a(), clash]).unwrap_err();
    assert_eq!(
        err,
        ConfigError::DuplicateCode {
            code: 1,
            existing: "type_a".into(),
            name: "clash".into()
        }
    );

    let mut registry = Registry::new();
    registry.register(5, "five").expect("first");
    assert!(registry.register(5, "again").is_err());
    assert!(registry.contains(5));
}

#[test]
fn test_struct_configuration_errors() {
    let err = Frame::new([Struct::new("anon")]).unwrap_err();
    assert_eq!(err, ConfigError::MissingCode("anon".into()));

    let err = Frame::new([type_a(), type_a()]).unwrap_err();
    assert_eq!(err, ConfigError::DuplicateStruct("type_a".into()));

    let err = type_a().field(Field::new(FieldType::U8, "a")).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateField { .. }));

    let err = Struct::new("s").field(Field::new(FieldType::U8, "x").scale(0.0)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidScale { .. }));

    let err = Struct::new("s").field(Field::new(FieldType::U8, "x").length(0)).unwrap_err();
    assert!(matches!(err, ConfigError::ZeroLength { .. }));
}
