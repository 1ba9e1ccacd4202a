//! Secret-link tokens and password hashes.
//!
//! Password hashes are PBKDF2-HMAC-SHA512 stored as `"<saltHex>:<derivedKeyHex>"`.
//! Every operation here is synchronous and never panics on caller input.

use constant_time_eq::constant_time_eq;
use rand::Rng;
use sha2::Sha512;

const TOKEN_BYTES: usize = 32;
const SALT_BYTES: usize = 16;
const DERIVED_KEY_BYTES: usize = 64;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Returns 32 CSPRNG bytes as 64 lowercase hex characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hashes a password with a fresh salt. Two calls on the same input never match.
pub fn hash_password(plaintext: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt);
    let key = derive_key(plaintext, &salt);
    format!("{}:{}", hex::encode(salt), hex::encode(key))
}

/// Checks `plaintext` against a stored `salt:hash` string.
///
/// Malformed stored values (missing half, bad hex, wrong key length) are a
/// plain `false`.
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    let Some((salt_hex, key_hex)) = stored.split_once(':') else {
        return false;
    };
    if salt_hex.is_empty() || key_hex.is_empty() {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(key_hex)) else {
        return false;
    };
    if expected.len() != DERIVED_KEY_BYTES {
        return false;
    }

    let actual = derive_key(plaintext, &salt);
    constant_time_eq(&actual, &expected)
}

fn derive_key(plaintext: &str, salt: &[u8]) -> [u8; DERIVED_KEY_BYTES] {
    let mut key = [0u8; DERIVED_KEY_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha512>(plaintext.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}
