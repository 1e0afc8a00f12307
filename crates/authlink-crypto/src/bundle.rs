use serde::{Deserialize, Serialize};

use crate::{
    curve::FIELD_BYTES,
    error::{CryptoError, Result},
    kdf::SALT_LEN,
    keys::KeyMaterial,
    util::{generate_random_bytes, hex_array},
};

/// Length of the pre-shared static challenge.
pub const STATIC_CHALLENGE_LEN: usize = 32;

/// The public half of an identity, as published to the peer.
///
/// Nothing in here is secret. On the wire every field is exactly 64 hex characters:
///
/// ```json
/// { "x": "…", "y": "…", "salt": "…", "ch1": "…" }
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthBundle {
    /// Public x coordinate.
    #[serde(with = "hex_array")]
    pub x: [u8; FIELD_BYTES],
    /// Public y coordinate.
    #[serde(with = "hex_array")]
    pub y: [u8; FIELD_BYTES],
    /// KDF salt.
    #[serde(with = "hex_array")]
    pub salt: [u8; SALT_LEN],
    /// Random value whose signature gates the transport upgrade.
    #[serde(rename = "ch1", with = "hex_array")]
    pub static_challenge: [u8; STATIC_CHALLENGE_LEN],
}

impl AuthBundle {
    /// Issue a brand new identity for `password`: fresh salt, fresh keypair and a fresh static
    /// challenge.
    pub fn create(password: &str) -> Result<(Self, KeyMaterial)> {
        let keys = KeyMaterial::derive(password, None)?;
        let bundle = Self::from_keys(&keys, *generate_random_bytes::<[u8; STATIC_CHALLENGE_LEN]>());
        Ok((bundle, keys))
    }

    /// Publish `keys` together with a chosen static challenge.
    pub fn from_keys(keys: &KeyMaterial, static_challenge: [u8; STATIC_CHALLENGE_LEN]) -> Self {
        AuthBundle {
            x: *keys.x(),
            y: *keys.y(),
            salt: *keys.salt(),
            static_challenge,
        }
    }

    /// Re-derive the keypair this bundle was issued for.
    ///
    /// Fails with [`CryptoError::KeyGenerationInvalid`] when `password` is not the one the bundle
    /// was created with.
    pub fn derive_keys(&self, password: &str) -> Result<KeyMaterial> {
        KeyMaterial::derive_with_public(password, self.salt, &self.x, &self.y)
    }

    /// Parse a bundle file.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    /// Pretty printed JSON, the form an operator drops on the server.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CryptoError::Encoding(e.to_string()))
    }
}

impl std::fmt::Debug for AuthBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthBundle")
            .field("x", &hex::encode(self.x))
            .field("y", &hex::encode(self.y))
            .field("salt", &hex::encode(self.salt))
            .field("ch1", &hex::encode(self.static_challenge))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_with_coordinates;

    const BUNDLE_JSON: &str = r#"{
        "x": "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296",
        "y": "4FE342E2FE1A7F9B8EE7EB4A7C0F9E162BCE33576B315ECECBB6406837BF51F5",
        "salt": "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        "ch1": "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
    }"#;

    #[test]
    fn parses_bundle_file() {
        let bundle = AuthBundle::from_json(BUNDLE_JSON).expect("valid bundle");
        assert_eq!(bundle.x[0], 0x6b);
        assert_eq!(bundle.y[0], 0x4f);
        assert_eq!(bundle.salt[31], 0x1f);
        assert_eq!(bundle.static_challenge, [0xff; 32]);
    }

    #[test]
    fn serializes_lowercase_with_ch1_key() {
        let bundle = AuthBundle::from_json(BUNDLE_JSON).expect("valid bundle");
        let value: serde_json::Value =
            serde_json::from_str(&bundle.to_json_pretty().expect("serializable")).expect("json");
        assert_eq!(
            value["y"],
            "4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"
        );
        assert_eq!(value["ch1"], "ff".repeat(32));
        assert!(value.get("static_challenge").is_none());
    }

    #[test]
    fn rejects_wrong_width() {
        let short = BUNDLE_JSON.replace("000102", "0001");
        assert!(matches!(
            AuthBundle::from_json(&short),
            Err(CryptoError::Encoding(_))
        ));

        let non_hex = BUNDLE_JSON.replace("000102", "00010g");
        assert!(AuthBundle::from_json(&non_hex).is_err());
    }

    #[test]
    fn rejects_missing_field() {
        let json = r#"{ "x": "00", "y": "00", "salt": "00" }"#;
        assert!(AuthBundle::from_json(json).is_err());
    }

    #[test]
    fn created_bundle_round_trips_through_login() {
        let (bundle, keys) = AuthBundle::create("s3cret").expect("valid");
        assert_eq!((&bundle.x, &bundle.y), (keys.x(), keys.y()));

        let parsed =
            AuthBundle::from_json(&bundle.to_json_pretty().expect("serializable")).expect("valid");
        let login = parsed.derive_keys("s3cret").expect("same password");

        let proof = login.sign(&parsed.static_challenge);
        assert!(verify_with_coordinates(
            &bundle.x,
            &bundle.y,
            &bundle.static_challenge,
            &proof
        ));
        assert!(matches!(
            parsed.derive_keys("S3cret"),
            Err(CryptoError::KeyGenerationInvalid)
        ));
    }
}
