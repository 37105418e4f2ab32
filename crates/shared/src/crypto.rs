//! Credential hashing and token generation.
//!
//! Admin API keys carry the `ft_` prefix and are stored as plain SHA-256
//! digests. Agent tokens carry the `fta_` prefix and are stored as
//! HMAC-SHA256 digests keyed with the server's token secret.

use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Prefix of admin API keys.
pub const ADMIN_KEY_PREFIX: &str = "ft_";

/// Prefix of agent tokens issued at registration.
pub const AGENT_TOKEN_PREFIX: &str = "fta_";

/// Number of random characters following the prefix of a generated token.
const TOKEN_BODY_LEN: usize = 40;

/// Length of the identifying prefix kept after the type prefix.
const KEY_PREFIX_LEN: usize = 8;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes HMAC-SHA256 of the input keyed with `secret`, hex encoded.
pub fn hmac_sha256_hex(secret: &str, input: &str) -> String {
    // HMAC accepts keys of any length, including empty ones.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(input.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Generates a random token made of `prefix` followed by alphanumerics.
pub fn generate_token(prefix: &str) -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_BODY_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, body)
}

/// Extracts the identifying prefix from a key (first 8 characters after
/// the type prefix).
pub fn extract_key_prefix<'a>(key: &'a str, type_prefix: &str) -> Option<&'a str> {
    let rest = key.strip_prefix(type_prefix)?;
    if rest.len() >= KEY_PREFIX_LEN && rest.is_char_boundary(KEY_PREFIX_LEN) {
        Some(&rest[..KEY_PREFIX_LEN])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hmac_sha256_hex_known_vector() {
        // Widely published HMAC-SHA256 test vector
        let digest = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog");
        assert_eq!(
            digest,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_hmac_depends_on_secret() {
        assert_ne!(
            hmac_sha256_hex("secret-a", "fta_token"),
            hmac_sha256_hex("secret-b", "fta_token")
        );
    }

    #[test]
    fn test_hmac_empty_secret() {
        assert_eq!(hmac_sha256_hex("", "x").len(), 64);
    }

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token(AGENT_TOKEN_PREFIX);
        assert!(token.starts_with("fta_"));
        assert_eq!(token.len(), AGENT_TOKEN_PREFIX.len() + TOKEN_BODY_LEN);
        assert!(token[4..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_token_unique() {
        assert_ne!(generate_token("ft_"), generate_token("ft_"));
    }

    #[test]
    fn test_extract_key_prefix() {
        assert_eq!(
            extract_key_prefix("ft_abcdefgh12345", ADMIN_KEY_PREFIX),
            Some("abcdefgh")
        );
        assert_eq!(extract_key_prefix("ft_short", ADMIN_KEY_PREFIX), None);
        assert_eq!(extract_key_prefix("invalid_key", ADMIN_KEY_PREFIX), None);
    }

    #[test]
    fn test_extract_key_prefix_agent_token() {
        assert_eq!(
            extract_key_prefix("fta_12345678rest", AGENT_TOKEN_PREFIX),
            Some("12345678")
        );
        // Admin prefix does not match an agent token
        assert_eq!(extract_key_prefix("fta_12345678", ADMIN_KEY_PREFIX), None);
    }

    #[test]
    fn test_extract_key_prefix_case_sensitive() {
        assert_eq!(extract_key_prefix("FT_abcdefgh12345", ADMIN_KEY_PREFIX), None);
    }
}
