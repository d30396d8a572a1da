use crate::encoding::{get_fixed32, get_fixed64, get_varint32, get_varint64, put_fixed32, put_fixed64, put_varint32, put_varint64, EncodingError};

#[test]
fn varint32_roundtrip_small_and_large_values() {
    for value in [0u32, 1, 127, 128, 300, u32::MAX] {
        let mut buf = Vec::new();
        put_varint32(&mut buf, value);
        let (decoded, consumed) = get_varint32(&buf).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, buf.len());
    }
}

#[test]
fn varint32_of_zero_is_one_byte() {
    let mut buf = Vec::new();
    put_varint32(&mut buf, 0);
    assert_eq!(buf, vec![0x00]);
}

#[test]
fn varint32_of_127_is_one_byte_no_continuation() {
    let mut buf = Vec::new();
    put_varint32(&mut buf, 127);
    assert_eq!(buf, vec![0x7f]);
}

#[test]
fn varint32_of_128_sets_continuation_bit() {
    let mut buf = Vec::new();
    put_varint32(&mut buf, 128);
    assert_eq!(buf, vec![0x80, 0x01]);
}

#[test]
fn varint64_roundtrip() {
    for value in [0u64, 1, 1 << 32, u64::MAX] {
        let mut buf = Vec::new();
        put_varint64(&mut buf, value);
        let (decoded, consumed) = get_varint64(&buf).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, buf.len());
    }
}

#[test]
fn varint_decode_on_truncated_buffer_is_unexpected_eof() {
    let err = get_varint32(&[0x80]).unwrap_err();
    assert!(matches!(err, EncodingError::UnexpectedEof { .. }));
}

#[test]
fn fixed32_roundtrip_is_little_endian() {
    let mut buf = Vec::new();
    put_fixed32(&mut buf, 0x11223344);
    assert_eq!(buf, vec![0x44, 0x33, 0x22, 0x11]);
    assert_eq!(get_fixed32(&buf).unwrap(), 0x11223344);
}

#[test]
fn fixed64_roundtrip_is_little_endian() {
    let mut buf = Vec::new();
    put_fixed64(&mut buf, 0x1122334455667788);
    assert_eq!(get_fixed64(&buf).unwrap(), 0x1122334455667788);
}

#[test]
fn fixed32_on_short_buffer_errors() {
    assert!(get_fixed32(&[1, 2, 3]).is_err());
}
