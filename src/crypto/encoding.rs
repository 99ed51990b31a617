//! # Text Encodings
//!
//! Base58Check for short binary fields (IVs, tags, nonces) and armor for
//! opaque blobs embedded in text.
//!
//! ## Armor Format
//!
//! ```text
//!   bytes ──► zlib deflate ──► base64 (standard alphabet) ──► 64-column lines
//! ```
//!
//! Dearmoring ignores whitespace, so armored text survives re-indentation
//! inside the letter's tag tree.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;

use crate::error::{Error, Result};

/// Line width of armored output
pub const ARMOR_LINE_WIDTH: usize = 64;

/// Upper bound on dearmored size (decompression bomb guard)
pub const MAX_DEARMORED_SIZE: usize = 64 * 1024 * 1024;

const COMPRESSION_LEVEL: u8 = 6;

/// Encode bytes as Base58Check text
pub fn base58check_encode(data: &[u8]) -> String {
    bs58::encode(data).with_check().into_string()
}

/// Decode Base58Check text, verifying the checksum
pub fn base58check_decode(text: &str) -> Result<Vec<u8>> {
    Ok(bs58::decode(text).with_check(None).into_vec()?)
}

/// Armor bytes for embedding in text
pub fn armor(data: &[u8]) -> String {
    let compressed = compress_to_vec_zlib(data, COMPRESSION_LEVEL);
    let encoded = STANDARD.encode(compressed);

    let mut out = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE_WIDTH + 1);
    for (i, chunk) in encoded.as_bytes().chunks(ARMOR_LINE_WIDTH).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // base64 output is pure ASCII
        out.extend(chunk.iter().map(|b| *b as char));
    }
    out
}

/// Reverse [`armor`]
pub fn dearmor(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::EncodingError("armored text is empty".into()));
    }

    let compressed = STANDARD.decode(compact.as_bytes())?;
    decompress_to_vec_zlib_with_limit(&compressed, MAX_DEARMORED_SIZE)
        .map_err(|e| Error::EncodingError(format!("zlib: {:?}", e.status)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base58check_detects_corruption() {
        let encoded = base58check_encode(&[1, 2, 3, 4, 5]);
        assert_eq!(base58check_decode(&encoded).unwrap(), vec![1, 2, 3, 4, 5]);

        // Swap the last character for a different valid base58 digit
        let mut corrupted = encoded.clone();
        let last = corrupted.pop().unwrap();
        corrupted.push(if last == '2' { '3' } else { '2' });
        assert!(base58check_decode(&corrupted).is_err());
    }

    #[test]
    fn test_armor_wraps_lines() {
        let data: Vec<u8> = (0..2048u32).map(|i| (i * 7919 % 251) as u8).collect();
        let armored = armor(&data);

        assert!(armored.lines().all(|line| line.len() <= ARMOR_LINE_WIDTH));
        assert_eq!(dearmor(&armored).unwrap(), data);
    }

    #[test]
    fn test_dearmor_ignores_indentation() {
        let armored = armor(b"indented blob");
        let indented: String = armored.lines().map(|l| format!("    {}\n", l)).collect();

        assert_eq!(dearmor(&indented).unwrap(), b"indented blob");
    }

    #[test]
    fn test_dearmor_rejects_garbage() {
        assert!(matches!(dearmor(""), Err(Error::EncodingError(_))));
        assert!(matches!(dearmor("!!!not base64!!!"), Err(Error::EncodingError(_))));
        // Valid base64, not zlib
        assert!(matches!(dearmor("aGVsbG8="), Err(Error::EncodingError(_))));
    }
}
