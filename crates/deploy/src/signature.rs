//! Keyed-hash verification of webhook bodies.
//!
//! GitHub signs every delivery with the hook's shared secret and sends the
//! digest as `"<algorithm>=<hex>"` in `X-Hub-Signature` (SHA-1) and
//! `X-Hub-Signature-256` (SHA-256). [`verify`] recomputes the digest over the
//! raw body and compares the hex strings in constant time.
//!
//! Malformed input is never an error here; it is simply "not valid".

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// Hash algorithms accepted in a signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureAlgorithm {
    /// Looks up an algorithm by the name used in signature headers.
    ///
    /// Returns `None` for unrecognised names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// The name used in signature headers.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Computes the lowercase hex HMAC of `body` keyed with `key`.
    fn hex_digest(self, key: &[u8], body: &[u8]) -> Option<String> {
        match self {
            Self::Sha1 => keyed_hex::<Hmac<Sha1>>(key, body),
            Self::Sha224 => keyed_hex::<Hmac<Sha224>>(key, body),
            Self::Sha256 => keyed_hex::<Hmac<Sha256>>(key, body),
            Self::Sha384 => keyed_hex::<Hmac<Sha384>>(key, body),
            Self::Sha512 => keyed_hex::<Hmac<Sha512>>(key, body),
        }
    }
}

fn keyed_hex<M: Mac + KeyInit>(key: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = <M as KeyInit>::new_from_slice(key).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Encodes the secret the way the hook was configured: one byte per
/// character, Latin-1. Characters outside Latin-1 cannot have been used to
/// sign anything we would accept.
fn secret_bytes(secret: &str) -> Option<Vec<u8>> {
    secret.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

/// Returns `true` iff `signature_header` is a valid keyed digest of `body`
/// under `secret`.
///
/// The header is split on the first `=` into algorithm name and expected hex
/// digest. A missing separator, an unknown algorithm, or any mismatch returns
/// `false`.
pub fn verify(signature_header: &str, body: &[u8], secret: &str) -> bool {
    let Some((algorithm, expected)) = signature_header.split_once('=') else {
        return false;
    };
    let Some(algorithm) = SignatureAlgorithm::from_name(algorithm) else {
        return false;
    };
    let Some(key) = secret_bytes(secret) else {
        return false;
    };
    let Some(computed) = algorithm.hex_digest(&key, body) else {
        return false;
    };
    computed.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Produces a signature header value (`"<algorithm>=<hex>"`) for `body`.
///
/// Returns `None` if `secret` contains characters outside Latin-1.
pub fn sign(algorithm: SignatureAlgorithm, body: &[u8], secret: &str) -> Option<String> {
    let key = secret_bytes(secret)?;
    let digest = algorithm.hex_digest(&key, body)?;
    Some(format!("{}={digest}", algorithm.name()))
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
