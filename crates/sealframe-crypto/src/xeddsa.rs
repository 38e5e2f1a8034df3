//! XEdDSA signatures over X25519 keys
//!
//! Lets a single Curve25519 key pair both agree keys and sign. The Edwards
//! public key is derived from the Montgomery u-coordinate with the sign bit
//! fixed to zero, and the signing scalar is negated when needed so that the
//! signer's Edwards point matches.
//!
//! Based on "The XEdDSA and VXEdDSA Signature Schemes" (Perrin, 2016).

use curve25519_dalek::{
    MontgomeryPoint,
    constants::ED25519_BASEPOINT_TABLE,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::{Scalar, clamp_integer},
};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// XEdDSA signature length: R point (32) followed by s scalar (32).
pub const SIGNATURE_LENGTH: usize = 64;

/// Sign `message` with an X25519 private key.
///
/// `random` must be 64 bytes from a CSPRNG; it randomizes the nonce so a
/// weak hash of the message alone never determines `r`.
pub fn sign(private_key: &[u8; 32], message: &[u8], random: &[u8; 64]) -> [u8; SIGNATURE_LENGTH] {
    let mut clamped = clamp_integer(*private_key);
    let k = Scalar::from_bytes_mod_order(clamped);
    clamped.zeroize();

    let e = (&k * ED25519_BASEPOINT_TABLE).compress();
    let a = if e.as_bytes()[31] >> 7 == 1 { -k } else { k };
    let public = (&a * ED25519_BASEPOINT_TABLE).compress();

    let r = hash1(&a, message, random);
    let r_point = (&r * ED25519_BASEPOINT_TABLE).compress();
    let h = challenge(&r_point, &public, message);
    let s = r + h * a;

    let mut signature = [0u8; SIGNATURE_LENGTH];
    signature[..32].copy_from_slice(r_point.as_bytes());
    signature[32..].copy_from_slice(s.as_bytes());
    signature
}

/// Verify an XEdDSA signature against an X25519 public key.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> bool {
    let Some(a_point) = edwards_from_montgomery(public_key) else {
        return false;
    };

    let mut r_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..]);

    let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes)) else {
        return false;
    };

    let r_point = CompressedEdwardsY(r_bytes);
    let h = challenge(&r_point, &a_point.compress(), message);
    let check = EdwardsPoint::vartime_double_scalar_mul_basepoint(&h, &(-a_point), &s);

    check.compress().as_bytes().ct_eq(&r_bytes).into()
}

/// Edwards point for a Montgomery u-coordinate, sign bit zero.
fn edwards_from_montgomery(u: &[u8; 32]) -> Option<EdwardsPoint> {
    let mut masked = *u;
    masked[31] &= 0x7F;
    MontgomeryPoint(masked).to_edwards(0)
}

/// hash1(a || M || Z) mod q
fn hash1(a: &Scalar, message: &[u8], random: &[u8; 64]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update([0xFE]);
    hasher.update([0xFF; 31]);
    hasher.update(a.as_bytes());
    hasher.update(message);
    hasher.update(random);
    wide_scalar(&hasher.finalize())
}

/// hash(R || A || M) mod q
fn challenge(r: &CompressedEdwardsY, a: &CompressedEdwardsY, message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(r.as_bytes());
    hasher.update(a.as_bytes());
    hasher.update(message);
    wide_scalar(&hasher.finalize())
}

fn wide_scalar(digest: &[u8]) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(digest);
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    scalar
}
