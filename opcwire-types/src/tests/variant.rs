use crate::{
    decode_exact, Array, BinaryEncodable, ByteString, DecodingOptions, EncodingMask, StatusCode,
    Variant, VariantScalarTypeId,
};

fn round_trip(value: &Variant) -> Variant {
    let decoded = decode_exact(&value.encode_to_vec(), &DecodingOptions::test()).unwrap();
    assert_eq!(&decoded, value);
    decoded
}

#[test]
fn size() {
    // The enum boxes its large members to stay reasonable on the stack
    assert!(std::mem::size_of::<Variant>() <= 32);
}

#[test]
fn empty() {
    assert_eq!(Variant::Empty.encode_to_vec(), vec![0x00]);
    round_trip(&Variant::Empty);
}

#[test]
fn scalars_round_trip() {
    for v in [
        Variant::from(true),
        Variant::from(-5i8),
        Variant::from(5u8),
        Variant::from(-1234i16),
        Variant::from(1234u16),
        Variant::from(-1_000_000i32),
        Variant::from(1_000_000u32),
        Variant::from(i64::MIN),
        Variant::from(u64::MAX),
        Variant::from(-6.5f32),
        Variant::from(0.125f64),
        Variant::from("水Boy"),
        Variant::from(ByteString::from(vec![1, 2, 3])),
        Variant::from(StatusCode::BadNodeIdInvalid),
        Variant::from(crate::NodeId::new(2, "x")),
        Variant::from(crate::LocalizedText::new("en", "hi")),
    ] {
        round_trip(&v);
    }
}

#[test]
fn one_dimensional_array() {
    let array = Array::new(
        VariantScalarTypeId::Int32,
        vec![Variant::from(1i32), Variant::from(2i32)],
    )
    .unwrap();
    let v = Variant::from(array);
    let bytes = v.encode_to_vec();
    assert_eq!(
        bytes[0],
        VariantScalarTypeId::Int32 as u8 | EncodingMask::ARRAY_VALUES_BIT
    );
    round_trip(&v);
}

#[test]
fn multi_dimensional_array() {
    let values: Vec<Variant> = (0..6i32).map(Variant::from).collect();
    let array = Array::new_multi(VariantScalarTypeId::Int32, values, vec![2, 3]).unwrap();
    let v = Variant::from(array);
    let bytes = v.encode_to_vec();
    assert_eq!(
        bytes[0],
        VariantScalarTypeId::Int32 as u8
            | EncodingMask::ARRAY_VALUES_BIT
            | EncodingMask::ARRAY_DIMENSIONS_BIT
    );
    round_trip(&v);
}

#[test]
fn zero_length_array_has_no_dimensions_header() {
    let array = Array::new_multi(VariantScalarTypeId::Byte, vec![], vec![]).unwrap();
    let v = Variant::from(array);
    let bytes = v.encode_to_vec();
    // mask byte + length 0, nothing else
    assert_eq!(bytes.len(), 5);
    round_trip(&v);
}

#[test]
fn reserved_type_ids_decode_as_byte_string() {
    // Scalar with the reserved wire id 26: body is a byte string
    let mut data = vec![26u8];
    data.extend_from_slice(&ByteString::from(vec![7, 8]).encode_to_vec());
    let v: Variant = decode_exact(&data, &DecodingOptions::test()).unwrap();
    assert_eq!(v, Variant::from(ByteString::from(vec![7, 8])));
}

#[test]
fn scalar_variant_of_variant_rejected() {
    let inner = Variant::from(5i32).encode_to_vec();
    let mut data = vec![VariantScalarTypeId::Variant as u8];
    data.extend_from_slice(&inner);
    assert!(decode_exact::<Variant>(&data, &DecodingOptions::test()).is_err());
}

#[test]
fn array_of_variant_accepted() {
    let values = vec![
        Variant::Variant(Box::new(Variant::from(1i32))),
        Variant::Variant(Box::new(Variant::from("two"))),
    ];
    let array = Array::new(VariantScalarTypeId::Variant, values).unwrap();
    round_trip(&Variant::from(array));
}

#[test]
fn dimension_mismatch_rejected() {
    // 2 values claiming to be a 3x1 matrix
    let mut data = vec![
        VariantScalarTypeId::Int32 as u8
            | EncodingMask::ARRAY_VALUES_BIT
            | EncodingMask::ARRAY_DIMENSIONS_BIT,
    ];
    data.extend_from_slice(&2i32.encode_to_vec());
    data.extend_from_slice(&1i32.encode_to_vec());
    data.extend_from_slice(&2i32.encode_to_vec());
    data.extend_from_slice(&(Some(vec![3u32, 1u32])).encode_to_vec());
    assert!(decode_exact::<Variant>(&data, &DecodingOptions::test()).is_err());
}
