//! MySQL authentication response scrambles.
//!
//! This module computes the auth-response bytes carried by the handshake
//! response for the common authentication plugins:
//! - `mysql_native_password`: SHA1-based (legacy, MySQL < 8.0 default)
//! - `caching_sha2_password`: SHA256-based fast path (MySQL 8.0+ default)
//! - `mysql_clear_password`: the password itself
//!
//! # mysql_native_password
//!
//! ```text
//! SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))
//! ```
//!
//! # caching_sha2_password
//!
//! ```text
//! XOR(SHA256(password), SHA256(SHA256(SHA256(password)) + seed))
//! ```
//!
//! Full authentication (RSA key exchange or TLS) happens after the
//! handshake response and is left to the connection layer.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Well-known authentication plugin names.
pub mod plugins {
    /// SHA1-based authentication (legacy default)
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    /// SHA256-based authentication (MySQL 8.0+ default)
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
    /// MySQL clear password (only safe over an encrypted channel)
    pub const MYSQL_CLEAR_PASSWORD: &str = "mysql_clear_password";
}

/// Servers send a 20-byte scramble, often followed by a NUL.
fn trim_seed(auth_data: &[u8]) -> &[u8] {
    match auth_data {
        [seed @ .., 0] if seed.len() == 20 => seed,
        _ => auth_data,
    }
}

fn xor<const N: usize>(a: [u8; N], b: [u8; N]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// Compute mysql_native_password authentication response.
///
/// Returns 20 bytes, or an empty vec if the password is empty.
pub fn mysql_native_password(password: &str, auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![];
    }

    let seed = trim_seed(auth_data);
    let seed = &seed[..seed.len().min(20)];

    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();

    let mut hasher = Sha1::new();
    hasher.update(seed);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    xor(stage1, stage3)
}

/// Compute caching_sha2_password fast authentication response.
///
/// Returns 32 bytes, or an empty vec if the password is empty.
pub fn caching_sha2_password(password: &str, auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![];
    }

    let seed = trim_seed(auth_data);

    let password_hash: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let password_hash_hash: [u8; 32] = Sha256::digest(password_hash).into();

    let mut hasher = Sha256::new();
    hasher.update(password_hash_hash);
    hasher.update(seed);
    let scramble: [u8; 32] = hasher.finalize().into();

    xor(password_hash, scramble)
}

/// Compute the auth response for `plugin`.
///
/// Returns the plugin the bytes were computed for alongside the bytes.
/// Unknown plugins fall back to `mysql_native_password`, and the caller
/// must announce that name; the server will answer with an auth switch
/// request if it disagrees.
///
/// `mysql_clear_password` yields the bare password. Length-prefixed auth
/// forms carry its NUL terminator inside the data, see
/// [`clear_password_terminated`].
pub fn auth_response<'p>(
    plugin: &'p str,
    password: &str,
    auth_data: &[u8],
) -> (&'p str, Vec<u8>) {
    match plugin {
        plugins::CACHING_SHA2_PASSWORD => (plugin, caching_sha2_password(password, auth_data)),
        plugins::MYSQL_CLEAR_PASSWORD => (plugin, password.as_bytes().to_vec()),
        plugins::MYSQL_NATIVE_PASSWORD => (plugin, mysql_native_password(password, auth_data)),
        other => {
            tracing::warn!(plugin = other, "Unknown auth plugin, using mysql_native_password");
            (
                plugins::MYSQL_NATIVE_PASSWORD,
                mysql_native_password(password, auth_data),
            )
        }
    }
}

/// Clear-text password with its terminator, as sent inside a
/// length-prefixed auth response.
pub fn clear_password_terminated(password: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(password.len() + 1);
    result.extend_from_slice(password.as_bytes());
    result.push(0);
    result
}
