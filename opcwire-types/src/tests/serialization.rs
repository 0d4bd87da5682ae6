use crate::{
    decode_exact, BinaryEncodable, DataValue, DateTime, DecodingOptions, Guid, NodeId,
    ReadRequest, ReadValueId, RequestHeader, StatusCode, TimestampsToReturn, UAString, Variant,
};
use std::str::FromStr;

fn round_trip<T>(value: &T) -> T
where
    T: BinaryEncodable + crate::BinaryDecodable + PartialEq + std::fmt::Debug,
{
    let decoded = decode_exact(&value.encode_to_vec(), &DecodingOptions::test()).unwrap();
    assert_eq!(&decoded, value);
    decoded
}

#[test]
fn int32_wire_form() {
    assert_eq!(
        1_000_000_000i32.encode_to_vec(),
        vec![0x00, 0xCA, 0x9A, 0x3B]
    );
}

#[test]
fn float_wire_form() {
    assert_eq!((-6.5f32).encode_to_vec(), vec![0x00, 0x00, 0xD0, 0xC0]);
}

#[test]
fn unsigned_64_bit_range_is_lossless() {
    let v = u64::MAX;
    assert_eq!(round_trip(&v), u64::MAX);
    let v = i64::MIN;
    assert_eq!(round_trip(&v), i64::MIN);
}

#[test]
fn boolean_decodes_any_nonzero_as_true() {
    let options = DecodingOptions::test();
    assert!(!decode_exact::<bool>(&[0x00], &options).unwrap());
    assert!(decode_exact::<bool>(&[0x01], &options).unwrap());
    assert!(decode_exact::<bool>(&[0x7F], &options).unwrap());
}

#[test]
fn guid_wire_form() {
    let guid = Guid::from_str("72962B91-FA75-4AE6-8D28-B404DC7DAF63").unwrap();
    assert_eq!(
        guid.encode_to_vec(),
        vec![
            0x91, 0x2B, 0x96, 0x72, 0x75, 0xFA, 0xE6, 0x4A, 0x8D, 0x28, 0xB4, 0x04, 0xDC, 0x7D,
            0xAF, 0x63
        ]
    );
}

#[test]
fn date_time_out_of_range_is_zero() {
    let too_old = DateTime::from_ticks(0);
    assert_eq!(too_old.encode_to_vec(), vec![0u8; 8]);
}

#[test]
fn headers_round_trip() {
    let header = RequestHeader::new(&NodeId::new(1, "session-token"), 99, 30_000);
    round_trip(&header);
}

#[test]
fn service_struct_round_trip() {
    let request = ReadRequest {
        request_header: RequestHeader::new(&NodeId::null(), 1, 1000),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![ReadValueId {
            node_id: NodeId::new(0, 2258u32),
            attribute_id: 13,
            index_range: UAString::null(),
            data_encoding: Default::default(),
        }]),
    };
    round_trip(&request);
}

#[test]
fn data_value_round_trip() {
    let dv = DataValue {
        value: Some(Variant::from(42i64)),
        status: Some(StatusCode::Good),
        source_timestamp: Some(DateTime::now()),
        source_picoseconds: Some(1234),
        server_timestamp: Some(DateTime::now()),
        server_picoseconds: None,
    };
    round_trip(&dv);
}
