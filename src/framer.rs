use crate::{
    consts::{
        FIN_BIT, MASKING_KEY_LEN, MASK_BIT, MAX_INLINE_PAYLOAD_LEN, OPCODE_MASK, OPCODE_TEXT,
        PAYLOAD_LEN_16, PAYLOAD_LEN_64, PAYLOAD_LEN_MASK, RSV1_BIT, RSV2_BIT, RSV3_BIT, U16_MAX,
    },
    DecodedMessage, FrameError, FrameHeader, RngProvider,
};
use alloc::{vec, vec::Vec};

/// Xor `buf` with `key` (rotating by byte position). Applying it twice restores the input.
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, x) in buf.iter_mut().enumerate() {
        *x ^= key[i % 4];
    }
}

/// Full header width (extended length and masking key included) announced by
/// the first two bytes, `None` if fewer than 2 bytes are available
pub fn header_len_hint(buf: &[u8]) -> Option<usize> {
    let second = *buf.get(1)?;
    let ext_len = match second & PAYLOAD_LEN_MASK {
        PAYLOAD_LEN_16 => 2,
        PAYLOAD_LEN_64 => 8,
        _ => 0,
    };

    let key_len = if second & MASK_BIT != 0 {
        MASKING_KEY_LEN
    } else {
        0
    };

    Some(2 + ext_len + key_len)
}

/// Parse frame header (extended length and masking key included).
///
/// Does not check if the payload itself is fully available, use
/// [`FrameHeader::frame_len`] for that.
pub fn decode_header(buf: &[u8]) -> Result<FrameHeader, FrameError> {
    let (first, second) = match buf {
        [first, second, ..] => (*first, *second),
        _ => return Err(FrameError::HeaderTooShort),
    };

    let masked = second & MASK_BIT != 0;
    let (payload_len, mut offset) = match second & PAYLOAD_LEN_MASK {
        PAYLOAD_LEN_16 => {
            let ext: [u8; 2] = buf
                .get(2..4)
                .and_then(|ext| ext.try_into().ok())
                .ok_or(FrameError::HeaderTooShort)?;

            (u16::from_be_bytes(ext) as u64, 4)
        }
        PAYLOAD_LEN_64 => {
            let ext: [u8; 8] = buf
                .get(2..10)
                .and_then(|ext| ext.try_into().ok())
                .ok_or(FrameError::HeaderTooShort)?;

            // most significant bit must be 0
            let len = u64::from_be_bytes(ext);
            if len >> 63 != 0 {
                return Err(FrameError::PayloadTooLarge);
            }

            (len, 10)
        }
        len => (len as u64, 2),
    };

    let payload_size = usize::try_from(payload_len).map_err(|_| FrameError::PayloadTooLarge)?;

    let masking_key = if masked {
        let key: [u8; 4] = buf
            .get(offset..offset + MASKING_KEY_LEN)
            .and_then(|key| key.try_into().ok())
            .ok_or(FrameError::MissingMaskKey)?;

        offset += MASKING_KEY_LEN;
        Some(key)
    } else {
        None
    };

    offset
        .checked_add(payload_size)
        .ok_or(FrameError::PayloadTooLarge)?;

    Ok(FrameHeader {
        fin: first & FIN_BIT != 0,
        rsv1: first & RSV1_BIT != 0,
        rsv2: first & RSV2_BIT != 0,
        rsv3: first & RSV3_BIT != 0,
        opcode: first & OPCODE_MASK,
        masked,
        masking_key,
        payload_len,
        header_len: offset,
    })
}

/// Decode first frame from `buf` into a freshly allocated (unmasked) message.
///
/// `expect_masked` rejects unmasked frames (client -> server frames must be masked).
/// Bytes after the first frame are ignored.
pub fn decode(buf: &[u8], expect_masked: bool) -> Result<DecodedMessage, FrameError> {
    let header = decode_header(buf)?;
    let payload = buf
        .get(header.header_len..header.frame_len())
        .ok_or(FrameError::TruncatedFrame)?;

    if expect_masked && !header.masked {
        return Err(FrameError::UnmaskedFrame);
    }

    let mut payload = payload.to_vec();
    if let Some(key) = header.masking_key {
        apply_mask(&mut payload, key);
    }

    Ok(DecodedMessage {
        fin: header.fin,
        opcode: header.opcode,
        payload,
    })
}

/// Same as [`decode`], but unmasks payload inside `buf` and returns it as a subslice.
pub fn decode_in_place(
    buf: &mut [u8],
    expect_masked: bool,
) -> Result<(FrameHeader, &mut [u8]), FrameError> {
    let header = decode_header(buf)?;
    let payload = buf
        .get_mut(header.header_len..header.frame_len())
        .ok_or(FrameError::TruncatedFrame)?;

    if expect_masked && !header.masked {
        return Err(FrameError::UnmaskedFrame);
    }

    if let Some(key) = header.masking_key {
        apply_mask(payload, key);
    }

    Ok((header, payload))
}

/// Size of text frame carrying `payload_len` bytes
pub fn encoded_len(payload_len: usize, masked: bool) -> usize {
    let ext_len = match payload_len {
        0..=MAX_INLINE_PAYLOAD_LEN => 0,
        126..=U16_MAX => 2,
        _ => 8,
    };

    let key_len = if masked { MASKING_KEY_LEN } else { 0 };
    2 + ext_len + key_len + payload_len
}

/// Write single final text frame into `buf`, returns frame size.
///
/// Payload is masked if `masking_key` is set.
pub fn encode_into(
    buf: &mut [u8],
    payload: &[u8],
    masking_key: Option<[u8; 4]>,
) -> Result<usize, FrameError> {
    let payload_len = u64::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge)?;
    let needed = encoded_len(payload.len(), masking_key.is_some());
    let buf = buf
        .get_mut(..needed)
        .ok_or(FrameError::BufferTooSmall { needed })?;

    let mask_bit = if masking_key.is_some() { MASK_BIT } else { 0 };
    buf[0] = FIN_BIT | OPCODE_TEXT;

    let mut offset = 2;
    match payload.len() {
        0..=MAX_INLINE_PAYLOAD_LEN => {
            buf[1] = mask_bit | payload.len() as u8;
        }
        126..=U16_MAX => {
            buf[1] = mask_bit | PAYLOAD_LEN_16;
            buf[2..4].copy_from_slice(&(payload.len() as u16).to_be_bytes());
            offset += 2;
        }
        _ => {
            buf[1] = mask_bit | PAYLOAD_LEN_64;
            buf[2..10].copy_from_slice(&payload_len.to_be_bytes());
            offset += 8;
        }
    }

    match masking_key {
        Some(key) => {
            buf[offset..offset + MASKING_KEY_LEN].copy_from_slice(&key);
            offset += MASKING_KEY_LEN;

            let out = &mut buf[offset..];
            out.copy_from_slice(payload);
            apply_mask(out, key);
        }
        None => buf[offset..].copy_from_slice(payload),
    }

    Ok(needed)
}

/// Encode single final text frame with explicit masking key
pub fn encode_with_key(
    payload: &[u8],
    masking_key: Option<[u8; 4]>,
) -> Result<Vec<u8>, FrameError> {
    let mut frame = vec![0; encoded_len(payload.len(), masking_key.is_some())];
    encode_into(&mut frame, payload, masking_key)?;

    Ok(frame)
}

/// Encode single final text frame, masking key (if `mask`) generated by `RG`
pub fn encode_with<RG: RngProvider>(payload: &[u8], mask: bool) -> Result<Vec<u8>, FrameError> {
    let masking_key = if mask {
        let mut key = [0; MASKING_KEY_LEN];
        RG::random_buf(&mut key)?;
        Some(key)
    } else {
        None
    };

    encode_with_key(payload, masking_key)
}

/// Encode single final text frame, masking key (if `mask`) generated by [`crate::DefaultRng`]
#[cfg(any(feature = "getrandom02", feature = "getrandom03"))]
pub fn encode(payload: &[u8], mask: bool) -> Result<Vec<u8>, FrameError> {
    encode_with::<crate::DefaultRng>(payload, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::OPCODE_BINARY;
    use rand::Rng;

    const HELLO_UNMASKED: [u8; 7] = [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
    const HELLO_MASKED: [u8; 11] = [
        0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
    ];

    struct FixedRng;
    impl RngProvider for FixedRng {
        fn random_buf(buf: &mut [u8]) -> Result<(), FrameError> {
            buf.fill(0xAA);
            Ok(())
        }
    }

    struct FailingRng;
    impl RngProvider for FailingRng {
        fn random_buf(_buf: &mut [u8]) -> Result<(), FrameError> {
            Err(FrameError::RandomSource)
        }
    }

    #[test]
    fn decode_single_frame_unmasked() {
        let msg = decode(&HELLO_UNMASKED, false).unwrap();
        assert!(msg.fin);
        assert!(msg.is_text());
        assert_eq!(msg.as_text(), Ok("Hello"));
    }

    #[test]
    fn decode_single_frame_masked() {
        let msg = decode(&HELLO_MASKED, true).unwrap();
        assert!(msg.fin);
        assert_eq!(msg.opcode, OPCODE_TEXT);
        assert_eq!(msg.payload, b"Hello");

        let header = decode_header(&HELLO_MASKED).unwrap();
        assert!(header.masked);
        assert_eq!(header.masking_key, Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(header.header_len, 6);
        assert_eq!(header.frame_len(), HELLO_MASKED.len());
    }

    #[test]
    fn decode_in_place_unmasks_buffer() {
        let mut buf = HELLO_MASKED;
        let (header, payload) = decode_in_place(&mut buf, true).unwrap();
        assert_eq!(header.payload_len, 5);
        assert_eq!(payload, b"Hello");
    }

    #[test]
    fn decode_returns_other_opcodes() {
        let msg = decode(&[0x82, 0x02, 0xde, 0xad], false).unwrap();
        assert_eq!(msg.opcode, OPCODE_BINARY);
        assert!(!msg.is_text());
        assert_eq!(msg.payload, [0xde, 0xad]);

        let msg = decode(&[0x01, 0x00], false).unwrap();
        assert!(!msg.fin);
        assert!(msg.payload.is_empty());

        let header = decode_header(&[0xF1, 0x00]).unwrap();
        assert!(header.rsv1 && header.rsv2 && header.rsv3);
        assert_eq!(header.opcode, OPCODE_TEXT);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let mut buf = HELLO_UNMASKED.to_vec();
        buf.extend_from_slice(&HELLO_MASKED);

        let header = decode_header(&buf).unwrap();
        assert_eq!(header.frame_len(), HELLO_UNMASKED.len());
        assert_eq!(decode(&buf, false).unwrap().payload, b"Hello");

        let rest = &buf[header.frame_len()..];
        assert_eq!(decode(rest, true).unwrap().payload, b"Hello");
    }

    #[test]
    fn decode_header_too_short() {
        assert_eq!(decode(&[], false), Err(FrameError::HeaderTooShort));
        assert_eq!(decode(&[0x81], true), Err(FrameError::HeaderTooShort));

        // extended length bytes missing
        assert_eq!(decode(&[0x81, 126, 0x00], false), Err(FrameError::HeaderTooShort));
        assert_eq!(
            decode(&[0x81, 127, 0, 0, 0, 0], false),
            Err(FrameError::HeaderTooShort)
        );
    }

    #[test]
    fn decode_truncated_payload() {
        assert_eq!(decode(&[0x81, 0x05], false), Err(FrameError::TruncatedFrame));
        assert_eq!(decode(&[0x81, 0x05], true), Err(FrameError::TruncatedFrame));
        assert_eq!(
            decode(&HELLO_MASKED[..HELLO_MASKED.len() - 1], true),
            Err(FrameError::TruncatedFrame)
        );

        // 16 bit length (200) with only 3 payload bytes
        assert_eq!(
            decode(&[0x81, 126, 0x00, 0xc8, 1, 2, 3], false),
            Err(FrameError::TruncatedFrame)
        );
    }

    #[test]
    fn decode_missing_mask_key() {
        assert_eq!(decode(&[0x81, 0x85], true), Err(FrameError::MissingMaskKey));
        assert_eq!(
            decode(&[0x81, 0x85, 0x37, 0xfa, 0x21], true),
            Err(FrameError::MissingMaskKey)
        );
        assert_eq!(
            decode(&[0x81, 0xfe, 0x00, 0xc8, 0x01], true),
            Err(FrameError::MissingMaskKey)
        );
    }

    #[test]
    fn header_len_hint_from_first_bytes() {
        assert_eq!(header_len_hint(&[]), None);
        assert_eq!(header_len_hint(&[0x81]), None);
        assert_eq!(header_len_hint(&[0x81, 0x05]), Some(2));
        assert_eq!(header_len_hint(&[0x81, 0x85, 0x37]), Some(6));
        assert_eq!(header_len_hint(&[0x81, 0xfe]), Some(8));
        assert_eq!(header_len_hint(&[0x81, 127]), Some(10));
        assert_eq!(header_len_hint(&HELLO_MASKED), Some(6));

        // key cut after 3 bytes: the hint says more bytes are needed
        let partial = &HELLO_MASKED[..3];
        assert_eq!(decode_header(partial), Err(FrameError::MissingMaskKey));
        assert!(partial.len() < header_len_hint(partial).unwrap());
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = [0u8; 10];
        buf[0] = 0x81;
        buf[1] = 127;
        buf[2] = 0x80;
        assert_eq!(decode(&buf, false), Err(FrameError::PayloadTooLarge));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn decode_huge_declared_length_is_truncated() {
        let buf = [0x81, 127, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00];
        assert_eq!(decode(&buf, false), Err(FrameError::TruncatedFrame));
    }

    #[test]
    fn decode_rejects_unmasked_when_masking_expected() {
        assert_eq!(decode(&HELLO_UNMASKED, true), Err(FrameError::UnmaskedFrame));

        let mut buf = HELLO_UNMASKED;
        assert_eq!(
            decode_in_place(&mut buf, true).map(|_| ()),
            Err(FrameError::UnmaskedFrame)
        );
    }

    #[test]
    fn incomplete_errors() {
        assert!(FrameError::HeaderTooShort.is_incomplete());
        assert!(FrameError::TruncatedFrame.is_incomplete());
        assert!(!FrameError::MissingMaskKey.is_incomplete());
        assert!(!FrameError::PayloadTooLarge.is_incomplete());
    }

    #[test]
    fn encode_known_frames() {
        assert_eq!(encode_with_key(b"Hello", None).unwrap(), HELLO_UNMASKED);
        assert_eq!(
            encode_with_key(b"Hello", Some([0x37, 0xfa, 0x21, 0x3d])).unwrap(),
            HELLO_MASKED
        );
    }

    #[test]
    fn encode_length_boundaries() {
        assert_eq!(encode_with_key(&[], None).unwrap(), [0x81, 0x00]);

        let frame = encode_with_key(&[b'a'; 125], None).unwrap();
        assert_eq!(frame.len(), 2 + 125);
        assert_eq!(frame[1], 125);

        let frame = encode_with_key(&[b'a'; 126], None).unwrap();
        assert_eq!(frame.len(), 4 + 126);
        assert_eq!(frame[1], 126);
        assert_eq!(frame[2..4], [0x00, 0x7e]);

        let frame = encode_with_key(&vec![b'a'; 65535], None).unwrap();
        assert_eq!(frame.len(), 4 + 65535);
        assert_eq!(frame[1], 126);
        assert_eq!(frame[2..4], [0xff, 0xff]);

        let frame = encode_with_key(&vec![b'a'; 65536], None).unwrap();
        assert_eq!(frame.len(), 10 + 65536);
        assert_eq!(frame[1], 127);
        assert_eq!(frame[2..10], [0, 0, 0, 0, 0, 1, 0, 0]);

        let frame = encode_with_key(&vec![b'a'; 65536], Some([1, 2, 3, 4])).unwrap();
        assert_eq!(frame.len(), 14 + 65536);
        assert_eq!(frame[1], MASK_BIT | 127);
        assert_eq!(frame[10..14], [1, 2, 3, 4]);
    }

    #[test]
    fn encode_into_buffer_too_small() {
        let mut buf = [0u8; 6];
        assert_eq!(
            encode_into(&mut buf, b"Hello", None),
            Err(FrameError::BufferTooSmall { needed: 7 })
        );

        let mut buf = [0u8; 32];
        let n = encode_into(&mut buf, b"Hello", None).unwrap();
        assert_eq!(&buf[..n], HELLO_UNMASKED);
    }

    #[test]
    fn encode_with_rng_provider() {
        let frame = encode_with::<FixedRng>(b"Hi", true).unwrap();
        assert_eq!(frame[..6], [0x81, 0x82, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert_eq!(frame[6..], [b'H' ^ 0xAA, b'i' ^ 0xAA]);

        assert_eq!(
            encode_with::<FailingRng>(b"Hi", true),
            Err(FrameError::RandomSource)
        );
        assert_eq!(
            encode_with::<FailingRng>(b"Hi", false).unwrap(),
            [0x81, 0x02, b'H', b'i']
        );
    }

    #[test]
    fn mask_is_self_inverse() {
        let mut rng = rand::rng();
        for len in [0usize, 1, 3, 4, 5, 17, 1000] {
            let mut original = vec![0u8; len];
            rng.fill(&mut original[..]);
            let key: [u8; 4] = rng.random();

            let mut buf = original.clone();
            apply_mask(&mut buf, key);
            apply_mask(&mut buf, key);
            assert_eq!(buf, original);
        }
    }

    #[cfg(any(feature = "getrandom02", feature = "getrandom03"))]
    #[test]
    fn encode_decode_round_trip() {
        let mut rng = rand::rng();
        for len in [0usize, 1, 5, 125, 126, 127, 1000, 65535, 65536, 70000] {
            let mut payload = vec![0u8; len];
            rng.fill(&mut payload[..]);

            for mask in [false, true] {
                let frame = encode(&payload, mask).unwrap();
                assert_eq!(frame.len(), encoded_len(len, mask));
                assert_eq!(frame[1] & MASK_BIT != 0, mask);

                let msg = decode(&frame, mask).unwrap();
                assert!(msg.fin);
                assert_eq!(msg.opcode, OPCODE_TEXT);
                assert_eq!(msg.payload, payload);
            }
        }
    }
}
