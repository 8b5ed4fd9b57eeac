//! Webhook signature verification.
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw body and sends
//! the digest as `X-Hub-Signature-256: sha256=<hex>`. Verification is
//! constant-time via the `Mac` comparison; we never compare hex strings.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Verifies `signature_header` against the HMAC-SHA256 of `payload` under
/// `secret`.
///
/// Returns `false` for a missing prefix, non-hex digest, or mismatched MAC.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &str) -> bool {
    let Some(hex_digest) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(digest) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&digest).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_verifies() {
        let payload = br#"{"action":"created"}"#;
        let header = sign(payload, "s3cret");
        assert!(verify_signature(payload, &header, "s3cret"));
    }

    #[test]
    fn mutated_payload_fails() {
        let payload = br#"{"action":"created"}"#;
        let header = sign(payload, "s3cret");
        let mut tampered = payload.to_vec();
        tampered[0] ^= 0x01;
        assert!(!verify_signature(&tampered, &header, "s3cret"));
    }

    #[test]
    fn mutated_signature_fails() {
        let payload = br#"{"action":"created"}"#;
        let mut header = sign(payload, "s3cret");
        // flip one hex digit
        let last = header.pop().unwrap();
        header.push(if last == '0' { '1' } else { '0' });
        assert!(!verify_signature(payload, &header, "s3cret"));
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = br#"{"action":"created"}"#;
        let header = sign(payload, "s3cret");
        assert!(!verify_signature(payload, &header, "other"));
    }

    #[test]
    fn missing_prefix_or_bad_hex_fails() {
        let payload = b"x";
        assert!(!verify_signature(payload, "", "s3cret"));
        assert!(!verify_signature(payload, "deadbeef", "s3cret"));
        assert!(!verify_signature(payload, "sha256=zz", "s3cret"));
    }
}
