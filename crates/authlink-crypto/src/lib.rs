//! Password derived P-256 identities.
//!
//! An identity is an ECDSA P-256 keypair whose private scalar is PBKDF2-HMAC-SHA256 of the user's
//! password. Only the public half, the [`AuthBundle`], is ever stored; the [`KeyMaterial`] is
//! re-derived in memory whenever it is needed.
//!
//! ```no_run
//! # fn main() -> Result<(), authlink_crypto::CryptoError> {
//! use authlink_crypto::{verify_with_coordinates, AuthBundle};
//!
//! let (bundle, _) = AuthBundle::create("correct horse battery staple")?;
//!
//! // Later, on login
//! let keys = bundle.derive_keys("correct horse battery staple")?;
//! let proof = keys.sign(&bundle.static_challenge);
//! assert!(verify_with_coordinates(&bundle.x, &bundle.y, &bundle.static_challenge, &proof));
//! # Ok(())
//! # }
//! ```

mod bundle;
pub use bundle::{AuthBundle, STATIC_CHALLENGE_LEN};
pub mod curve;
mod error;
pub(crate) use error::Result;
pub use error::CryptoError;
mod kdf;
pub use kdf::{is_rejected, stretch_password, PBKDF2_ITERATIONS, SALT_LEN};
mod keys;
pub use keys::KeyMaterial;
mod signature;
pub use signature::{
    verify_with_coordinates, verifying_key_from_coordinates, EcdsaSignature, SIGNATURE_LEN,
};
mod util;
pub use util::generate_random_bytes;
