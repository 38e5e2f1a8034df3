//! HKDF and HMAC helpers

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HKDF-SHA256 extract-and-expand into a fixed-size output.
///
/// `N` must not exceed 8160 bytes (255 blocks); every caller in this
/// workspace asks for far less.
pub fn hkdf_sha256<const N: usize>(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> [u8; N] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; N];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("HKDF-SHA256 expansion of {N} bytes is within bounds");
    };
    okm
}

/// HKDF-SHA256 with the info string given as several parts.
pub fn hkdf_sha256_multi<const N: usize>(
    salt: Option<&[u8]>,
    ikm: &[u8],
    info: &[&[u8]],
) -> [u8; N] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; N];
    let Ok(()) = hkdf.expand_multi_info(info, &mut okm) else {
        unreachable!("HKDF-SHA256 expansion of {N} bytes is within bounds");
    };
    okm
}

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    for part in parts {
        mac.update(part);
    }
    let result = mac.finalize().into_bytes();

    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}
