use thiserror::Error;

/// Errors produced while deriving, loading or using an identity keypair.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The stretched password landed in the rejected `ffffffff` region while the salt was fixed.
    ///
    /// With a fixed salt a retry would produce the same value, so this means the password and
    /// salt do not describe a previously issued identity.
    #[error("Derived key is invalid")]
    InvalidDerivation,

    /// The sign-then-verify self-test failed for the assembled keypair.
    #[error("Invalid key generation parameters")]
    KeyGenerationInvalid,

    /// Coordinates do not describe a point on the curve, or the scalar is out of range.
    #[error("Invalid key material: {0}")]
    InvalidKey(&'static str),

    /// A hex encoded value had the wrong width or contained non-hex characters.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::Encoding(err.to_string())
    }
}

pub(crate) type Result<T, E = CryptoError> = std::result::Result<T, E>;
