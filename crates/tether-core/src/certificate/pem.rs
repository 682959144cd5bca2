//! PEM armor checks, integrity digest and informational fingerprint
//!
//! These helpers look at the text armor only. No X.509 structure is parsed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Opening armor line
pub const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
/// Closing armor line
pub const PEM_END: &str = "-----END CERTIFICATE-----";

/// Shortest material accepted as a certificate
pub const MIN_CERT_SIZE: usize = 200;
/// Largest material the manager stores or loads
pub const MAX_CERT_SIZE: usize = 8192;

/// Both armor markers present and total length in `[200, 8192]` bytes
pub fn is_valid_pem_format(pem: &str) -> bool {
    if !pem.contains(PEM_BEGIN) || !pem.contains(PEM_END) {
        return false;
    }
    (MIN_CERT_SIZE..=MAX_CERT_SIZE).contains(&pem.len())
}

/// CRC-32 over the raw material bytes
pub fn checksum(pem: &str) -> u32 {
    crc32fast::hash(pem.as_bytes())
}

/// SHA-256 of the decoded body, hex encoded
///
/// Display only. Returns `None` when the body between the markers is not
/// valid base64.
pub fn fingerprint(pem: &str) -> Option<String> {
    let start = pem.find(PEM_BEGIN)? + PEM_BEGIN.len();
    let end = pem[start..].find(PEM_END)? + start;

    let body: String = pem[start..end]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let der = STANDARD.decode(body).ok()?;

    Some(hex::encode(Sha256::digest(&der)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::anchor::DEVELOPMENT_ANCHOR_PEM;

    fn padded_pem(body_len: usize) -> String {
        format!("{}\n{}\n{}\n", PEM_BEGIN, "A".repeat(body_len), PEM_END)
    }

    #[test]
    fn test_format_requires_both_markers() {
        let body = "A".repeat(300);
        assert!(!is_valid_pem_format(&format!("{}\n{}\n", PEM_BEGIN, body)));
        assert!(!is_valid_pem_format(&format!("{}\n{}\n", body, PEM_END)));
        assert!(is_valid_pem_format(&padded_pem(300)));
    }

    #[test]
    fn test_format_length_bounds() {
        // Markers and newlines
        let overhead = padded_pem(0).len();
        assert!(!is_valid_pem_format(&padded_pem(MIN_CERT_SIZE - overhead - 1)));
        assert!(is_valid_pem_format(&padded_pem(MIN_CERT_SIZE - overhead)));
        assert!(is_valid_pem_format(&padded_pem(MAX_CERT_SIZE - overhead)));
        assert!(!is_valid_pem_format(&padded_pem(MAX_CERT_SIZE - overhead + 1)));
    }

    #[test]
    fn test_checksum_detects_single_byte_change() {
        let original = padded_pem(300);
        let mut tampered = original.clone().into_bytes();
        tampered[40] = b'B';
        let tampered = String::from_utf8(tampered).unwrap();

        assert_eq!(checksum(&original), checksum(&original.clone()));
        assert_ne!(checksum(&original), checksum(&tampered));
    }

    #[test]
    fn test_fingerprint_of_development_anchor() {
        let fp = fingerprint(DEVELOPMENT_ANCHOR_PEM).unwrap();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(fingerprint("no armor here").is_none());
        assert!(fingerprint(&format!("{}\n!!!!\n{}", PEM_BEGIN, PEM_END)).is_none());
    }
}
