//! Challenge response computation.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The response a device must send for `code`: `hex(sha256(code + secret))`.
pub fn expected_response(code: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte equality of two responses.
pub fn responses_match(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // sha256("abc")
        assert_eq!(
            expected_response("a", "bc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_secret_changes_response() {
        assert_ne!(
            expected_response("CODE", "secret-1"),
            expected_response("CODE", "secret-2")
        );
    }

    #[test]
    fn test_responses_match() {
        let expected = expected_response("CODE", "secret");
        assert!(responses_match(&expected, &expected.clone()));
        assert!(!responses_match(&expected, &expected.to_uppercase()));
        assert!(!responses_match(&expected, &expected[..10]));
        assert!(!responses_match(&expected, ""));
    }
}
