use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    curve::{public_from_private, FIELD_BYTES},
    error::{CryptoError, Result},
    kdf::{derive_scalar, stretch_password, SALT_LEN},
    signature::{verify_with_key, verifying_key_from_coordinates, EcdsaSignature},
    util::generate_random_bytes,
};

/// A password derived P-256 keypair.
///
/// The private scalar is PBKDF2-HMAC-SHA256 of the password and [`KeyMaterial::salt`]. It only
/// ever lives in memory and is recomputed whenever the password changes.
#[derive(Clone)]
pub struct KeyMaterial {
    scalar: Zeroizing<[u8; FIELD_BYTES]>,
    x: [u8; FIELD_BYTES],
    y: [u8; FIELD_BYTES],
    salt: [u8; SALT_LEN],
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyMaterial {
    /// Derive a keypair from `password`, computing the public point from the scalar.
    ///
    /// Without a salt a fresh one is generated, which is how new identities are issued. With a
    /// salt the derivation is deterministic and fails with [`CryptoError::InvalidDerivation`] if
    /// the stretched password is in the rejected range.
    pub fn derive(password: &str, salt: Option<[u8; SALT_LEN]>) -> Result<Self> {
        Self::derive_inner(password, salt, None, stretch_password)
    }

    /// Derive the private scalar for an existing identity and pair it with the published
    /// coordinates `(x, y)`.
    ///
    /// The coordinates are taken as given. A password that does not belong to them is caught by
    /// the sign-then-verify self-test and reported as [`CryptoError::KeyGenerationInvalid`].
    pub fn derive_with_public(
        password: &str,
        salt: [u8; SALT_LEN],
        x: &[u8; FIELD_BYTES],
        y: &[u8; FIELD_BYTES],
    ) -> Result<Self> {
        Self::derive_inner(password, Some(salt), Some((*x, *y)), stretch_password)
    }

    pub(crate) fn derive_inner<F>(
        password: &str,
        salt: Option<[u8; SALT_LEN]>,
        public: Option<([u8; FIELD_BYTES], [u8; FIELD_BYTES])>,
        stretch: F,
    ) -> Result<Self>
    where
        F: FnMut(&[u8], &[u8; SALT_LEN]) -> Zeroizing<[u8; FIELD_BYTES]>,
    {
        let stretched = derive_scalar(password.as_bytes(), salt, stretch)?;

        let signing_key = SigningKey::from_slice(stretched.scalar.as_slice())
            .map_err(|_| CryptoError::InvalidKey("scalar out of range"))?;

        let (x, y) = match public {
            Some(public) => public,
            None => public_from_private(&stretched.scalar)?,
        };
        let verifying_key = verifying_key_from_coordinates(&x, &y)?;

        let keys = KeyMaterial {
            scalar: stretched.scalar,
            x,
            y,
            salt: stretched.salt,
            signing_key,
            verifying_key,
        };
        keys.self_test()?;
        Ok(keys)
    }

    fn self_test(&self) -> Result<()> {
        let message = generate_random_bytes::<[u8; 32]>();
        let signature = self.sign(message.as_slice());
        if !self.verify(message.as_slice(), &signature) {
            debug!("Key self-test failed, signature does not verify against the public point");
            return Err(CryptoError::KeyGenerationInvalid);
        }
        Ok(())
    }

    /// Sign `message` with ECDSA P-256 / SHA-256.
    pub fn sign(&self, message: &[u8]) -> EcdsaSignature {
        let signature: Signature = self.signing_key.sign(message);
        signature.into()
    }

    /// Verify a signature over `message` against this keypair's public point. Never errors.
    pub fn verify(&self, message: &[u8], signature: &EcdsaSignature) -> bool {
        verify_with_key(&self.verifying_key, message, signature)
    }

    /// Public x coordinate, big-endian.
    pub fn x(&self) -> &[u8; FIELD_BYTES] {
        &self.x
    }

    /// Public y coordinate, big-endian.
    pub fn y(&self) -> &[u8; FIELD_BYTES] {
        &self.y
    }

    /// Salt the scalar was stretched with.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// The raw private scalar.
    pub fn private_scalar(&self) -> &[u8; FIELD_BYTES] {
        &self.scalar
    }
}

// We manually implement this to make sure we don't print the private scalar
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("x", &hex::encode(self.x))
            .field("y", &hex::encode(self.y))
            .field("salt", &hex::encode(self.salt))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_with_coordinates;

    // Stand-in for PBKDF2 that keeps unit tests fast. Not a valid KDF.
    fn fast_stretch(password: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; FIELD_BYTES]> {
        let mut out = *salt;
        out[0] = 0x01;
        for (i, b) in password.iter().enumerate() {
            out[1 + i % 31] ^= b;
        }
        Zeroizing::new(out)
    }

    #[test]
    fn derive_is_deterministic_for_a_fixed_salt() {
        let salt = [0x5a; SALT_LEN];
        let a = KeyMaterial::derive("correct horse", Some(salt)).expect("valid derivation");
        let b = KeyMaterial::derive("correct horse", Some(salt)).expect("valid derivation");

        assert_eq!(a.private_scalar(), b.private_scalar());
        assert_eq!(a.x(), b.x());
        assert_eq!(a.y(), b.y());
        assert_eq!(a.salt(), &salt);
    }

    #[test]
    fn public_point_matches_scalar() {
        let keys =
            KeyMaterial::derive_inner("pw", Some([9; SALT_LEN]), None, fast_stretch).expect("valid");
        let (x, y) = public_from_private(keys.private_scalar()).expect("scalar in range");
        assert_eq!((keys.x(), keys.y()), (&x, &y));
    }

    #[test]
    fn sign_and_verify() {
        let keys = KeyMaterial::derive_inner("pw", None, None, fast_stretch).expect("valid");
        let signature = keys.sign(b"hello");

        assert!(keys.verify(b"hello", &signature));
        assert!(!keys.verify(b"hellO", &signature));
        assert!(verify_with_coordinates(keys.x(), keys.y(), b"hello", &signature));

        let mut tampered = *signature.as_bytes();
        tampered[10] ^= 0x01;
        assert!(!keys.verify(b"hello", &EcdsaSignature::from_bytes(tampered)));
    }

    #[test]
    fn mismatched_key_does_not_verify() {
        let a = KeyMaterial::derive_inner("a", Some([1; SALT_LEN]), None, fast_stretch)
            .expect("valid");
        let b = KeyMaterial::derive_inner("b", Some([2; SALT_LEN]), None, fast_stretch)
            .expect("valid");
        assert!(!b.verify(b"m", &a.sign(b"m")));
    }

    #[test]
    fn login_path_uses_supplied_coordinates() {
        let salt = [3; SALT_LEN];
        let issued = KeyMaterial::derive_inner("pw", Some(salt), None, fast_stretch).expect("valid");
        let login = KeyMaterial::derive_inner(
            "pw",
            Some(salt),
            Some((*issued.x(), *issued.y())),
            fast_stretch,
        )
        .expect("same password");
        assert_eq!(login.private_scalar(), issued.private_scalar());
    }

    #[test]
    fn wrong_password_fails_self_test() {
        let salt = [3; SALT_LEN];
        let issued = KeyMaterial::derive_inner("pw", Some(salt), None, fast_stretch).expect("valid");
        let result = KeyMaterial::derive_inner(
            "not pw",
            Some(salt),
            Some((*issued.x(), *issued.y())),
            fast_stretch,
        );
        assert!(matches!(result, Err(CryptoError::KeyGenerationInvalid)));
    }

    #[test]
    fn real_kdf_login_round_trip() {
        let issued = KeyMaterial::derive("hunter2", None).expect("valid");
        let login =
            KeyMaterial::derive_with_public("hunter2", *issued.salt(), issued.x(), issued.y())
                .expect("same password");
        assert_eq!(login.x(), issued.x());

        let wrong =
            KeyMaterial::derive_with_public("hunter3", *issued.salt(), issued.x(), issued.y());
        assert!(matches!(wrong, Err(CryptoError::KeyGenerationInvalid)));
    }

    #[test]
    fn debug_hides_scalar() {
        let keys = KeyMaterial::derive_inner("pw", None, None, fast_stretch).expect("valid");
        let debug = format!("{keys:?}");
        assert!(!debug.contains(&hex::encode(keys.private_scalar())));
        assert!(debug.contains(&hex::encode(keys.x())));
    }
}
