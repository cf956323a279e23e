//! NDEF file encoding: 2-byte big-endian NLEN + one short, well-known record (URI or Text).

use crate::payload::{PayloadConfig, PayloadKind};

/// MB=1, ME=1, CF=0, SR=1, IL=0, TNF=001 (NFC Forum well-known type).
const RECORD_HEADER: u8 = 0xD1;
const TYPE_LEN: u8 = 0x01;
const TYPE_URI: u8 = b'U';
const TYPE_TEXT: u8 = b'T';
/// URI identifier code: no abbreviation.
const URI_PREFIX_NONE: u8 = 0x00;
const TEXT_LANG: &[u8] = b"en";

const NLEN_SIZE: usize = 2;
/// Header, type length, payload length, type.
const RECORD_FIXED_LEN: usize = 4;

/// A short record carries its payload length in a single byte.
pub const MAX_RECORD_PAYLOAD: usize = u8::MAX as usize;

/// Bytes of record payload that precede the configured text.
fn payload_overhead(kind: PayloadKind) -> usize {
    match kind {
        PayloadKind::Uri => 1,
        PayloadKind::Text => 1 + TEXT_LANG.len(),
    }
}

/// Longest text (in UTF-8 bytes) that fits a short record of the given kind.
///
/// The CC advertises a maximum NDEF file size of 0x00FF bytes. Text longer than 248 bytes
/// (URI) or 246 bytes (Text) still encodes, but the file then exceeds 255 bytes and readers
/// that honour the CC may refuse to read it.
pub fn max_text_len(kind: PayloadKind) -> usize {
    MAX_RECORD_PAYLOAD - payload_overhead(kind)
}

/// Payload cannot be framed as a short record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("{kind:?} payload is {len} bytes, short record allows at most {max}")]
    PayloadTooLong {
        kind: PayloadKind,
        len: usize,
        max: usize,
    },
}

/// Error parsing an NDEF file back into a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("file truncated")]
    Truncated,
    #[error("NLEN {nlen} does not match record length {actual}")]
    LengthMismatch { nlen: usize, actual: usize },
    #[error("unsupported record header {0:#04x}")]
    UnsupportedHeader(u8),
    #[error("unsupported record type {0:#04x}")]
    UnsupportedType(u8),
    #[error("unsupported URI prefix code {0:#04x}")]
    UnsupportedUriPrefix(u8),
    #[error("unsupported text status byte {0:#04x}")]
    UnsupportedTextStatus(u8),
    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Check the text fits a short record of the configured kind.
pub fn check_len(config: &PayloadConfig) -> Result<(), EncodeError> {
    let max = max_text_len(config.kind);
    let len = config.text.len();
    if len > max {
        return Err(EncodeError::PayloadTooLong {
            kind: config.kind,
            len,
            max,
        });
    }
    Ok(())
}

/// Encode the NDEF file for a payload: `[NLEN hi, NLEN lo, record...]`.
pub fn encode(config: &PayloadConfig) -> Result<Vec<u8>, EncodeError> {
    check_len(config)?;
    let text = config.text.as_bytes();
    let payload_len = payload_overhead(config.kind) + text.len();
    let record_len = RECORD_FIXED_LEN + payload_len;

    let mut out = Vec::with_capacity(NLEN_SIZE + record_len);
    // record_len <= 4 + 255, always fits NLEN.
    out.extend_from_slice(&(record_len as u16).to_be_bytes());
    out.push(RECORD_HEADER);
    out.push(TYPE_LEN);
    out.push(payload_len as u8);
    match config.kind {
        PayloadKind::Uri => {
            out.push(TYPE_URI);
            out.push(URI_PREFIX_NONE);
        }
        PayloadKind::Text => {
            out.push(TYPE_TEXT);
            // Status byte: UTF-8, language code length.
            out.push(TEXT_LANG.len() as u8);
            out.extend_from_slice(TEXT_LANG);
        }
    }
    out.extend_from_slice(text);
    Ok(out)
}

/// NLEN prefix of an NDEF file, if present.
pub fn nlen(file: &[u8]) -> Option<u16> {
    match file {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Parse an NDEF file holding a single short URI or Text record, as produced by `encode`.
pub fn decode_file(file: &[u8]) -> Result<PayloadConfig, DecodeError> {
    let nlen = nlen(file).ok_or(DecodeError::Truncated)? as usize;
    let record = &file[NLEN_SIZE..];
    if record.len() != nlen {
        return Err(DecodeError::LengthMismatch {
            nlen,
            actual: record.len(),
        });
    }
    if record.len() < RECORD_FIXED_LEN {
        return Err(DecodeError::Truncated);
    }
    if record[0] != RECORD_HEADER || record[1] != TYPE_LEN {
        return Err(DecodeError::UnsupportedHeader(record[0]));
    }
    let payload_len = record[2] as usize;
    let payload = &record[RECORD_FIXED_LEN..];
    if payload.len() != payload_len {
        return Err(DecodeError::Truncated);
    }
    match record[3] {
        TYPE_URI => {
            let (&prefix, uri) = payload.split_first().ok_or(DecodeError::Truncated)?;
            if prefix != URI_PREFIX_NONE {
                return Err(DecodeError::UnsupportedUriPrefix(prefix));
            }
            Ok(PayloadConfig::uri(std::str::from_utf8(uri)?))
        }
        TYPE_TEXT => {
            let (&status, rest) = payload.split_first().ok_or(DecodeError::Truncated)?;
            // Bit 7 set means UTF-16; bit 6 is reserved.
            if status & 0xC0 != 0 {
                return Err(DecodeError::UnsupportedTextStatus(status));
            }
            let lang_len = (status & 0x3F) as usize;
            if rest.len() < lang_len {
                return Err(DecodeError::Truncated);
            }
            Ok(PayloadConfig::text(std::str::from_utf8(&rest[lang_len..])?))
        }
        other => Err(DecodeError::UnsupportedType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_record_layout() {
        let file = encode(&PayloadConfig::uri("https://nfc.cool")).unwrap();
        let mut expected = vec![0x00, 0x13, 0xD1, 0x01, 0x12, 0x55, 0x00];
        expected.extend_from_slice(b"https://nfc.cool");
        assert_eq!(file, expected);
    }

    #[test]
    fn text_record_layout() {
        let file = encode(&PayloadConfig::text("hi")).unwrap();
        assert_eq!(
            file,
            [0x00, 0x09, 0xD1, 0x01, 0x05, 0x54, 0x02, 0x65, 0x6E, 0x68, 0x69]
        );
    }

    #[test]
    fn empty_payloads() {
        assert_eq!(
            encode(&PayloadConfig::uri("")).unwrap(),
            [0x00, 0x05, 0xD1, 0x01, 0x01, 0x55, 0x00]
        );
        assert_eq!(
            encode(&PayloadConfig::text("")).unwrap(),
            [0x00, 0x07, 0xD1, 0x01, 0x03, 0x54, 0x02, b'e', b'n']
        );
    }

    #[test]
    fn utf8_length_counts_bytes() {
        let file = encode(&PayloadConfig::text("é")).unwrap();
        // payload = 1 + 2 + 2 UTF-8 bytes
        assert_eq!(file[4], 5);
        assert_eq!(nlen(&file), Some(9));
    }

    #[test]
    fn longest_payloads_fit() {
        let uri = "u".repeat(max_text_len(PayloadKind::Uri));
        let file = encode(&PayloadConfig::uri(uri)).unwrap();
        assert_eq!(file[4], 0xFF);
        assert_eq!(nlen(&file), Some(259));

        let text = "t".repeat(max_text_len(PayloadKind::Text));
        let file = encode(&PayloadConfig::text(text)).unwrap();
        assert_eq!(file[4], 0xFF);
    }

    #[test]
    fn one_byte_too_long_is_rejected() {
        let uri = "u".repeat(255);
        assert_eq!(
            encode(&PayloadConfig::uri(uri)),
            Err(EncodeError::PayloadTooLong {
                kind: PayloadKind::Uri,
                len: 255,
                max: 254
            })
        );
        let text = "t".repeat(253);
        assert!(matches!(
            encode(&PayloadConfig::text(text)),
            Err(EncodeError::PayloadTooLong { max: 252, .. })
        ));
    }

    #[test]
    fn file_size_against_cc_limit() {
        let cc_max = u16::from_be_bytes([
            crate::tag::CAPABILITY_CONTAINER[11],
            crate::tag::CAPABILITY_CONTAINER[12],
        ]) as usize;
        assert_eq!(cc_max, 255);
        for (config, fits) in [
            (PayloadConfig::uri("u".repeat(248)), true),
            (PayloadConfig::uri("u".repeat(249)), false),
            (PayloadConfig::text("t".repeat(246)), true),
            (PayloadConfig::text("t".repeat(247)), false),
        ] {
            let file = encode(&config).unwrap();
            assert_eq!(file.len() <= cc_max, fits, "{:?} {}", config.kind, file.len());
        }
    }

    #[test]
    fn nlen_matches_record_length() {
        for len in 0..=250 {
            for config in [
                PayloadConfig::uri("a".repeat(len)),
                PayloadConfig::text("a".repeat(len)),
            ] {
                let file = encode(&config).unwrap();
                assert_eq!(nlen(&file).unwrap() as usize, file.len() - 2);
                assert_eq!(decode_file(&file).unwrap(), config);
            }
        }
    }

    #[test]
    fn decode_rejects_mismatched_nlen() {
        let mut file = encode(&PayloadConfig::uri("x")).unwrap();
        file[1] += 1;
        assert!(matches!(
            decode_file(&file),
            Err(DecodeError::LengthMismatch { .. })
        ));
        assert_eq!(decode_file(&[0x00]), Err(DecodeError::Truncated));
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let file = [0x00, 0x05, 0xD1, 0x01, 0x01, 0x53, 0x00];
        assert_eq!(decode_file(&file), Err(DecodeError::UnsupportedType(0x53)));
    }

    #[test]
    fn decode_rejects_abbreviated_uri() {
        // 0x04 = "https://"
        let file = [0x00, 0x06, 0xD1, 0x01, 0x02, 0x55, 0x04, b'a'];
        assert_eq!(
            decode_file(&file),
            Err(DecodeError::UnsupportedUriPrefix(0x04))
        );
    }
}
