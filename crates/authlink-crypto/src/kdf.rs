use hmac::digest::{typenum::Unsigned, OutputSizeUser};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    error::{CryptoError, Result},
    util::generate_random_bytes,
};

pub(crate) type PbkdfSha256Hmac = hmac::Hmac<sha2::Sha256>;
pub(crate) const PBKDF_SHA256_HMAC_OUT_SIZE: usize =
    <<PbkdfSha256Hmac as OutputSizeUser>::OutputSize as Unsigned>::USIZE;

/// PBKDF2 iterations used for every identity. Changing this invalidates every issued bundle.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Length of the KDF salt in bytes.
pub const SALT_LEN: usize = 32;

/// Stretched outputs starting with these bytes are never used as a private scalar.
///
/// This is the byte form of "the hex encoding starts with `ffffffff`". Every integer at or above
/// the P-256 group order has this prefix, so anything that passes the check is a valid scalar,
/// but the check is intentionally the raw prefix and not a comparison against the order: issued
/// identities were accepted or rejected by exactly this rule.
const REJECTED_PREFIX: [u8; 4] = [0xff; 4];

/// A stretched password accepted as a private scalar, together with the salt that produced it.
pub(crate) struct StretchedScalar {
    pub(crate) scalar: Zeroizing<[u8; PBKDF_SHA256_HMAC_OUT_SIZE]>,
    pub(crate) salt: [u8; SALT_LEN],
}

/// Derive pbkdf2-sha256 of a given password and salt with the identity iteration count.
pub fn stretch_password(
    password: &[u8],
    salt: &[u8; SALT_LEN],
) -> Zeroizing<[u8; PBKDF_SHA256_HMAC_OUT_SIZE]> {
    Zeroizing::new(
        pbkdf2::pbkdf2_array::<PbkdfSha256Hmac, PBKDF_SHA256_HMAC_OUT_SIZE>(
            password,
            salt,
            PBKDF2_ITERATIONS,
        )
        .expect("hash is a valid fixed size"),
    )
}

/// Whether a stretched value falls in the rejected region.
pub fn is_rejected(candidate: &[u8]) -> bool {
    candidate.starts_with(&REJECTED_PREFIX)
}

/// Stretch `password` into a private scalar candidate, applying the rejection rule.
///
/// Without a salt a random one is generated and re-rolled until the candidate is accepted. With a
/// fixed salt the candidate is final, so a rejection is reported as
/// [`CryptoError::InvalidDerivation`] without retrying.
pub(crate) fn derive_scalar<F>(
    password: &[u8],
    salt: Option<[u8; SALT_LEN]>,
    mut stretch: F,
) -> Result<StretchedScalar>
where
    F: FnMut(&[u8], &[u8; SALT_LEN]) -> Zeroizing<[u8; PBKDF_SHA256_HMAC_OUT_SIZE]>,
{
    loop {
        let salt_bytes = match salt {
            Some(salt) => salt,
            None => *generate_random_bytes::<[u8; SALT_LEN]>(),
        };

        let scalar = stretch(password, &salt_bytes);
        if !is_rejected(scalar.as_slice()) {
            return Ok(StretchedScalar {
                scalar,
                salt: salt_bytes,
            });
        }

        if salt.is_some() {
            debug!("Stretched password is in the rejected range for the fixed salt");
            return Err(CryptoError::InvalidDerivation);
        }
        debug!("Stretched password is in the rejected range, retrying with a fresh salt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected_then(accepted: [u8; 32]) -> impl FnMut(&[u8], &[u8; 32]) -> Zeroizing<[u8; 32]> {
        let mut calls = 0;
        move |_, _| {
            calls += 1;
            if calls == 1 {
                let mut rejected = [0x11; 32];
                rejected[..4].copy_from_slice(&[0xff; 4]);
                Zeroizing::new(rejected)
            } else {
                Zeroizing::new(accepted)
            }
        }
    }

    #[test]
    fn stretching_is_deterministic_and_password_sensitive() {
        let salt = *b"saltsaltsaltsaltsaltsaltsaltsalt";
        let a = stretch_password(b"password", &salt);
        let b = stretch_password(b"password", &salt);
        let c = stretch_password(b"Password", &salt);
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn prefix_check_is_exactly_four_ff_bytes() {
        assert!(is_rejected(&[0xff, 0xff, 0xff, 0xff, 0x00]));
        assert!(!is_rejected(&[0xff, 0xff, 0xff, 0xfe, 0xff]));
        assert!(!is_rejected(&[0x00, 0xff, 0xff, 0xff, 0xff]));
    }

    #[test]
    fn random_salt_is_rerolled_after_rejection() {
        let mut calls = 0;
        let mut salts = Vec::new();
        let mut inner = rejected_then([0x22; 32]);
        let result = derive_scalar(b"pw", None, |password, salt| {
            calls += 1;
            salts.push(*salt);
            inner(password, salt)
        })
        .expect("second candidate is accepted");

        assert_eq!(calls, 2);
        assert_ne!(salts[0], salts[1]);
        assert_eq!(*result.scalar, [0x22; 32]);
        assert_eq!(result.salt, salts[1]);
        assert!(!is_rejected(result.scalar.as_slice()));
    }

    #[test]
    fn fixed_salt_fails_without_retry() {
        let mut calls = 0;
        let mut inner = rejected_then([0x22; 32]);
        let result = derive_scalar(b"pw", Some([7; 32]), |password, salt| {
            calls += 1;
            inner(password, salt)
        });

        assert!(matches!(result, Err(CryptoError::InvalidDerivation)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn fixed_salt_is_used_verbatim() {
        let result = derive_scalar(b"pw", Some([7; 32]), |_, _| Zeroizing::new([0x33; 32]))
            .expect("candidate is accepted");
        assert_eq!(result.salt, [7; 32]);
    }
}
