//! Credential codec (C3): `Session` <-> portable `WC01...` string.
//!
//! Pipeline: JSON -> zlib deflate (level 9) -> CRC32 (big-endian, appended) ->
//! base64url (no padding) -> `WC01` prefix. Grounded on `compression.rs`'s
//! general shape of "serialize, compress, checksum", with its own exact byte
//! layout and prefix.

use crate::session::Session;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use thiserror::Error;

const PREFIX: &str = "WC01";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("session failed validation: {0}")]
    Validation(String),
    #[error("unsupported codec version: {0:?}")]
    Version(String),
    #[error("malformed portable string")]
    Decode,
    #[error("checksum mismatch: credential string was tampered with or corrupted")]
    Checksum,
}

/// Encode a [`Session`] into a portable, checksum-protected, URL-safe string.
pub fn encode(session: &Session) -> Result<String, CodecError> {
    session
        .validate()
        .map_err(|e| CodecError::Validation(e.to_string()))?;

    let json = serde_json::to_vec(session).expect("Session serialization is infallible");

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(&json).expect("in-memory zlib write is infallible");
    let compressed = encoder.finish().expect("in-memory zlib finish is infallible");

    let checksum = crc32fast::hash(&compressed);
    let mut payload = compressed;
    payload.extend_from_slice(&checksum.to_be_bytes());

    let encoded = URL_SAFE_NO_PAD.encode(payload);
    Ok(format!("{PREFIX}{encoded}"))
}

/// Decode a portable string back into a [`Session`], verifying the checksum
/// and structural invariants.
pub fn decode(s: &str) -> Result<Session, CodecError> {
    let body = extract_body(s)?;

    let padded = add_padding_chars(body);
    let raw = base64::engine::general_purpose::URL_SAFE
        .decode(&padded)
        .map_err(|_| CodecError::Decode)?;

    if raw.len() < 5 {
        return Err(CodecError::Decode);
    }

    let (compressed, checksum_bytes) = raw.split_at(raw.len() - 4);
    let expected = u32::from_be_bytes(checksum_bytes.try_into().expect("split_at(len-4) yields 4 bytes"));
    let actual = crc32fast::hash(compressed);
    if actual != expected {
        return Err(CodecError::Checksum);
    }

    let json = inflate(compressed).map_err(|_| CodecError::Decode)?;
    let session: Session = serde_json::from_slice(&json).map_err(|_| CodecError::Decode)?;
    session
        .validate()
        .map_err(|e| CodecError::Validation(e.to_string()))?;
    Ok(session)
}

/// Cheap check used for UI hint text as the user types/pastes: prefix,
/// length, and base64 decodability, but *not* the checksum.
#[must_use]
pub fn quick_validate(s: &str) -> bool {
    let Ok(body) = extract_body(s) else {
        return false;
    };
    if body.is_empty() {
        return false;
    }
    let padded = add_padding_chars(body);
    base64::engine::general_purpose::URL_SAFE.decode(&padded).is_ok()
}

fn extract_body(s: &str) -> Result<&str, CodecError> {
    if let Some(body) = s.strip_prefix(PREFIX) {
        return Ok(body);
    }
    if s.len() >= 4 && &s[..2] == "WC" {
        return Err(CodecError::Version(s[..4.min(s.len())].to_string()));
    }
    Err(CodecError::Decode)
}

/// base64's `URL_SAFE_NO_PAD` engine does not require padding, but we accept
/// '=' padded input too (a user may have hand-padded a pasted string), so
/// restore it to a multiple-of-4 length before falling back to the standard
/// decoder pathway.
fn add_padding_chars(s: &str) -> String {
    let mut s = s.to_string();
    while s.len() % 4 != 0 {
        s.push('=');
    }
    s
}

fn inflate(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> Session {
        let mut cookies = BTreeMap::new();
        cookies.insert("a".to_string(), "b".to_string());
        cookies.insert("c".to_string(), "d".to_string());
        Session::new("1234567".into(), cookies, 1_700_000_000).unwrap()
    }

    #[test]
    fn round_trips() {
        let session = sample();
        let encoded = encode(&session).unwrap();
        assert!(encoded.starts_with(PREFIX));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn rejects_wrong_version_prefix() {
        let err = decode("WC02somethingelse").unwrap_err();
        assert_eq!(err, CodecError::Version("WC02".into()));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(decode("not-a-portable-string").unwrap_err(), CodecError::Decode);
    }

    #[test]
    fn single_byte_mutation_is_rejected() {
        // E2E-2: flip the last character to the next one in the alphabet.
        let encoded = encode(&sample()).unwrap();
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        let c = chars[last];
        chars[last] = match c {
            'a'..='y' | 'A'..='Y' | '0'..='8' => ((c as u8) + 1) as char,
            'z' => 'a',
            'Z' => 'A',
            '9' => '0',
            _ => 'A',
        };
        let mutated: String = chars.into_iter().collect();
        assert_ne!(mutated, encoded);
        let result = decode(&mutated);
        assert!(matches!(result, Err(CodecError::Checksum) | Err(CodecError::Decode)));
    }

    #[test]
    fn quick_validate_accepts_well_formed_but_does_not_check_checksum() {
        let encoded = encode(&sample()).unwrap();
        assert!(quick_validate(&encoded));

        // Corrupt just the checksum region at the very end; quick_validate
        // only checks shape, so it still passes.
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let mutated: String = chars.into_iter().collect();
        assert!(quick_validate(&mutated));
        assert!(decode(&mutated).is_err() || decode(&mutated).unwrap() == sample());
    }

    #[test]
    fn quick_validate_rejects_bad_prefix() {
        assert!(!quick_validate("nope"));
    }

    proptest::proptest! {
        #[test]
        fn round_trip_holds_for_arbitrary_sessions(
            token in "[a-zA-Z0-9]{1,64}",
            timestamp in 0i64..4_000_000_000i64,
            n_cookies in 0usize..5,
        ) {
            let mut cookies = BTreeMap::new();
            for i in 0..n_cookies {
                cookies.insert(format!("k{i}"), format!("v{i}"));
            }
            let session = Session::new(token, cookies, timestamp).unwrap();
            let encoded = encode(&session).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, session);
        }
    }
}
