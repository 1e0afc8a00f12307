//! Short Weierstrass arithmetic over the NIST P-256 domain parameters.
//!
//! Platform crypto libraries will happily sign with a P-256 key once both the scalar and the
//! public coordinates are known, but they rarely expose "give me the public point of this raw
//! scalar" for keys that did not originate on the platform. This module implements exactly that
//! step: affine point addition, doubling and double-and-add scalar multiplication, with the
//! modular inverse computed by the extended Euclidean algorithm.
//!
//! None of this is constant time. It is only ever fed the locally derived scalar of the
//! current user, never attacker controlled input.

use std::sync::LazyLock;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, Zero};

use crate::error::{CryptoError, Result};

/// Width in bytes of a P-256 field element or scalar.
pub const FIELD_BYTES: usize = 32;

/// The P-256 domain parameters.
pub static P256: LazyLock<CurveParams> = LazyLock::new(|| CurveParams {
    p: hex_int("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff"),
    a: hex_int("ffffffff00000001000000000000000000000000fffffffffffffffffffffffc"),
    b: hex_int("5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b"),
    n: hex_int("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551"),
    g: Point::Affine {
        x: hex_int("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"),
        y: hex_int("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"),
    },
});

fn hex_int(hex: &str) -> BigInt {
    BigInt::parse_bytes(hex.as_bytes(), 16).expect("curve constants are valid hex")
}

/// A point on the curve, either the point at infinity or an affine coordinate pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Point {
    /// The group identity.
    Infinity,
    /// An affine point `(x, y)`, coordinates reduced modulo the field prime.
    Affine {
        /// x coordinate
        x: BigInt,
        /// y coordinate
        y: BigInt,
    },
}

/// Domain parameters of a short Weierstrass curve `y^2 = x^3 + a*x + b (mod p)`.
pub struct CurveParams {
    /// Field prime.
    pub p: BigInt,
    /// Curve coefficient `a`.
    pub a: BigInt,
    /// Curve coefficient `b`.
    pub b: BigInt,
    /// Order of the base point.
    pub n: BigInt,
    /// Base point.
    pub g: Point,
}

impl CurveParams {
    /// Check whether `point` satisfies the curve equation.
    pub fn is_on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                let lhs = modulo(&(y * y), &self.p);
                let rhs = modulo(&(x * x * x + &self.a * x + &self.b), &self.p);
                lhs == rhs
            }
        }
    }

    /// Compute `2 * point`.
    pub fn double(&self, point: &Point) -> Point {
        let Point::Affine { x: x1, y: y1 } = point else {
            return Point::Infinity;
        };
        if modulo(y1, &self.p).is_zero() {
            return Point::Infinity;
        }

        let Some(denominator) = inv_mod(&(BigInt::from(2) * y1), &self.p) else {
            return Point::Infinity;
        };
        let m = modulo(&((BigInt::from(3) * x1 * x1 + &self.a) * denominator), &self.p);
        let x3 = modulo(&(&m * &m - BigInt::from(2) * x1), &self.p);
        let y3 = modulo(&(&m * (x1 - &x3) - y1), &self.p);
        Point::Affine { x: x3, y: y3 }
    }

    /// Compute `p1 + p2`.
    pub fn add(&self, p1: &Point, p2: &Point) -> Point {
        let (x1, y1, x2, y2) = match (p1, p2) {
            (Point::Infinity, _) => return p2.clone(),
            (_, Point::Infinity) => return p1.clone(),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
        };

        if x1 == x2 {
            // P + (-P)
            if modulo(&(y1 + y2), &self.p).is_zero() {
                return Point::Infinity;
            }
            if y1 == y2 {
                return self.double(p1);
            }
        }

        let Some(denominator) = inv_mod(&modulo(&(x2 - x1), &self.p), &self.p) else {
            return Point::Infinity;
        };
        let m = modulo(&((y2 - y1) * denominator), &self.p);
        let x3 = modulo(&(&m * &m - x1 - x2), &self.p);
        let y3 = modulo(&(&m * (x1 - &x3) - y1), &self.p);
        Point::Affine { x: x3, y: y3 }
    }

    /// Compute `k * point` using double-and-add. `k` is reduced modulo the group order first.
    pub fn mul(&self, k: &BigInt, point: &Point) -> Point {
        if *point == Point::Infinity {
            return Point::Infinity;
        }

        let k = modulo(k, &self.n);
        let Some(k) = k.to_biguint() else {
            return Point::Infinity;
        };

        let mut result = Point::Infinity;
        let mut addend = point.clone();
        for bit in 0..k.bits() {
            if k.bit(bit) {
                result = self.add(&result, &addend);
            }
            addend = self.double(&addend);
        }
        result
    }
}

/// Modular inverse of `k` modulo `p` using the extended Euclidean algorithm.
///
/// Returns `None` for `k == 0` or when `k` and `p` are not coprime.
pub fn inv_mod(k: &BigInt, p: &BigInt) -> Option<BigInt> {
    if k.is_zero() {
        return None;
    }
    if k.is_negative() {
        return inv_mod(&-k, p).map(|inv| p - inv);
    }

    let (mut old_r, mut r) = (k.clone(), p.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let q = &old_r / &r;
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return None;
    }
    Some(modulo(&old_s, p))
}

/// Mathematical modulo, always in `[0, m)`.
fn modulo(a: &BigInt, m: &BigInt) -> BigInt {
    let r = a % m;
    if r.is_negative() {
        r + m
    } else {
        r
    }
}

/// Compute the uncompressed public point `(x, y)` of a big-endian private scalar.
pub fn public_from_private(
    scalar: &[u8; FIELD_BYTES],
) -> Result<([u8; FIELD_BYTES], [u8; FIELD_BYTES])> {
    let curve = &*P256;
    let k = BigInt::from_bytes_be(Sign::Plus, scalar);
    if k.is_zero() || k >= curve.n {
        return Err(CryptoError::InvalidKey("scalar out of range"));
    }

    match curve.mul(&k, &curve.g) {
        Point::Affine { x, y } => Ok((to_field_bytes(&x)?, to_field_bytes(&y)?)),
        Point::Infinity => Err(CryptoError::InvalidKey("scalar maps to the point at infinity")),
    }
}

/// Left pad a non-negative integer to a fixed width big-endian field element.
fn to_field_bytes(value: &BigInt) -> Result<[u8; FIELD_BYTES]> {
    let bytes = value
        .to_biguint()
        .as_ref()
        .map(BigUint::to_bytes_be)
        .ok_or(CryptoError::InvalidKey("negative coordinate"))?;
    if bytes.len() > FIELD_BYTES {
        return Err(CryptoError::InvalidKey("coordinate wider than the field"));
    }

    let mut out = [0u8; FIELD_BYTES];
    out[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}
