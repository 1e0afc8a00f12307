use p256::{
    ecdsa::{signature::Verifier, Signature, VerifyingKey},
    EncodedPoint, FieldBytes,
};

use crate::{
    curve::FIELD_BYTES,
    error::{CryptoError, Result},
};

/// Length of a raw `r || s` P-256 signature.
pub const SIGNATURE_LEN: usize = 64;

/// An ECDSA P-256 / SHA-256 signature in the fixed width `r || s` form.
///
/// This is the layout browser WebCrypto produces and the peer expects, not DER.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature([u8; SIGNATURE_LEN]);

impl EcdsaSignature {
    /// Wrap raw `r || s` bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a signature from 128 hex characters.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let mut bytes = [0u8; SIGNATURE_LEN];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw `r || s` bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Lowercase hex encoding, as sent on the wire and in the connect cookie.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<Signature> for EcdsaSignature {
    fn from(signature: Signature) -> Self {
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(&signature.to_bytes());
        Self(bytes)
    }
}

impl std::fmt::Debug for EcdsaSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EcdsaSignature").field(&self.to_hex()).finish()
    }
}

/// Build a verifying key from uncompressed affine coordinates.
///
/// Fails with [`CryptoError::InvalidKey`] if the coordinates are not a point on P-256.
pub fn verifying_key_from_coordinates(
    x: &[u8; FIELD_BYTES],
    y: &[u8; FIELD_BYTES],
) -> Result<VerifyingKey> {
    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(x),
        FieldBytes::from_slice(y),
        false,
    );
    VerifyingKey::from_encoded_point(&point)
        .map_err(|_| CryptoError::InvalidKey("coordinates are not a point on P-256"))
}

pub(crate) fn verify_with_key(
    key: &VerifyingKey,
    message: &[u8],
    signature: &EcdsaSignature,
) -> bool {
    let Ok(signature) = Signature::from_slice(signature.as_bytes()) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

/// Verify `signature` over `message` against the public key `(x, y)`.
///
/// Any failure, including coordinates that are not on the curve or a signature with a zero
/// component, is reported as `false`.
pub fn verify_with_coordinates(
    x: &[u8; FIELD_BYTES],
    y: &[u8; FIELD_BYTES],
    message: &[u8],
    signature: &EcdsaSignature,
) -> bool {
    match verifying_key_from_coordinates(x, y) {
        Ok(key) => verify_with_key(&key, message, signature),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::{signature::Signer, SigningKey};

    use super::*;
    use crate::curve::public_from_private;

    const SCALAR: [u8; 32] = [
        0x3a, 0x91, 0x0c, 0x5e, 0x27, 0xd4, 0x66, 0x18, 0xb3, 0x4f, 0x02, 0xe9, 0x7d, 0x55, 0xc1,
        0x20, 0x8a, 0x1b, 0xf6, 0x43, 0x9e, 0x0d, 0x72, 0xa8, 0x35, 0x6c, 0xe1, 0x14, 0xbb, 0x07,
        0x58, 0xcd,
    ];

    fn sign(message: &[u8]) -> EcdsaSignature {
        let key = SigningKey::from_slice(&SCALAR).expect("scalar is in range");
        let signature: Signature = key.sign(message);
        signature.into()
    }

    #[test]
    fn hex_form_is_128_characters() {
        let signature = sign(b"message");
        let hex = signature.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(EcdsaSignature::from_hex(&hex), Ok(signature));
    }

    #[test]
    fn from_hex_rejects_wrong_width() {
        assert!(EcdsaSignature::from_hex("abcd").is_err());
        assert!(EcdsaSignature::from_hex(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn verifies_against_derived_coordinates() {
        let (x, y) = public_from_private(&SCALAR).expect("scalar is in range");
        let signature = sign(b"challenge bytes");
        assert!(verify_with_coordinates(&x, &y, b"challenge bytes", &signature));
        assert!(!verify_with_coordinates(&x, &y, b"challenge byteS", &signature));
    }

    #[test]
    fn garbage_never_errors() {
        let (x, y) = public_from_private(&SCALAR).expect("scalar is in range");
        let zero = EcdsaSignature::from_bytes([0; SIGNATURE_LEN]);
        assert!(!verify_with_coordinates(&x, &y, b"m", &zero));
        assert!(!verify_with_coordinates(&[1; 32], &[2; 32], b"m", &sign(b"m")));
    }

    #[test]
    fn off_curve_coordinates_are_rejected() {
        assert!(matches!(
            verifying_key_from_coordinates(&[1; 32], &[2; 32]),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
