// src/util/decode.rs

//! Decoding of captured child process output
//!
//! Windows tooling writes console output in a mix of encodings. Captured
//! bytes are interpreted in this order:
//!
//! 1. A UTF-16 byte order mark selects UTF-16 LE or BE decoding.
//! 2. Valid UTF-8 without embedded NUL bytes is returned as-is.
//! 3. Strict UTF-16 LE, then strict UTF-16 BE.
//! 4. As a last resort, the raw bytes are Base64 raw URL-encoded.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// The byte order used to interpret UTF-16 data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn unit(&self, p: &[u8]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes([p[0], p[1]]),
            ByteOrder::Big => u16::from_be_bytes([p[0], p[1]]),
        }
    }
}

/// Attempts to interpret the given bytes as a string.
pub fn decode_output(p: &[u8]) -> String {
    if p.is_empty() {
        return String::new();
    }

    if has_utf16_bom(p, ByteOrder::Little) {
        return decode_utf16_lossy(&p[2..], ByteOrder::Little);
    }
    if has_utf16_bom(p, ByteOrder::Big) {
        return decode_utf16_lossy(&p[2..], ByteOrder::Big);
    }

    if let Ok(s) = std::str::from_utf8(p) {
        if !s.contains('\0') {
            return s.to_string();
        }
    }

    if let Some(s) = parse_utf16(p, ByteOrder::Little) {
        return s;
    }
    if let Some(s) = parse_utf16(p, ByteOrder::Big) {
        return s;
    }

    URL_SAFE_NO_PAD.encode(p)
}

fn has_utf16_bom(p: &[u8], order: ByteOrder) -> bool {
    p.len() >= 2 && order.unit(p) == 0xFEFF
}

/// Strictly parses the given bytes as UTF-16 with the specified byte
/// order. Returns `None` if the data has an uneven length or contains
/// invalid surrogates.
fn parse_utf16(p: &[u8], order: ByteOrder) -> Option<String> {
    if p.is_empty() {
        return Some(String::new());
    }
    if p.len() % 2 != 0 {
        return None;
    }

    let units: Vec<u16> = p.chunks_exact(2).map(|pair| order.unit(pair)).collect();
    char::decode_utf16(units.into_iter())
        .collect::<Result<String, _>>()
        .ok()
}

/// Interprets the given bytes as UTF-16, replacing invalid characters with
/// the unicode replacement character. An odd trailing byte is dropped.
fn decode_utf16_lossy(p: &[u8], order: ByteOrder) -> String {
    let even = p.len() - p.len() % 2;
    let units: Vec<u16> = p[..even]
        .chunks_exact(2)
        .map(|pair| order.unit(pair))
        .collect();
    char::decode_utf16(units.into_iter())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
