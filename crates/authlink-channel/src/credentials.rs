use std::sync::Arc;

use authlink_crypto::{AuthBundle, CryptoError, KeyMaterial};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::{bundle_source::AuthBundleSource, error::ChannelError};

/// The active password and what was derived from it.
///
/// The bundle is fetched once and kept until [`Credentials::rotated`]. Keys are derived lazily
/// and only again when the password changes; a failed derivation is cached as well, so a wrong
/// password costs one key stretch and not one per reconnect attempt.
#[derive(Default)]
pub(crate) struct Credentials {
    password: Option<Zeroizing<String>>,
    bundle: Option<AuthBundle>,
    keys: Option<Result<Arc<KeyMaterial>, CryptoError>>,
}

impl Credentials {
    pub(crate) fn set_password(&mut self, password: &str) {
        if self.password.as_deref().map(String::as_str) != Some(password) {
            self.password = Some(Zeroizing::new(password.to_owned()));
            self.keys = None;
        }
    }

    /// Switch to `password` for an identity that was just replaced on the peer.
    pub(crate) fn rotated(&mut self, password: &str) {
        self.bundle = None;
        self.keys = None;
        self.password = Some(Zeroizing::new(password.to_owned()));
    }

    pub(crate) async fn bundle(
        &mut self,
        source: &dyn AuthBundleSource,
    ) -> Result<AuthBundle, ChannelError> {
        if let Some(bundle) = &self.bundle {
            return Ok(bundle.clone());
        }
        let bundle = source.fetch().await?;
        self.bundle = Some(bundle.clone());
        Ok(bundle)
    }

    /// The published bundle together with the keys the current password derives for it.
    pub(crate) async fn keys(
        &mut self,
        source: &dyn AuthBundleSource,
    ) -> Result<(AuthBundle, Arc<KeyMaterial>), ChannelError> {
        let bundle = self.bundle(source).await?;

        if self.keys.is_none() {
            let Some(password) = &self.password else {
                return Err(ChannelError::InvalidCredentials(CryptoError::InvalidKey(
                    "no password",
                )));
            };
            let password = password.clone();
            let stretched = bundle.clone();
            let derived = blocking(move || stretched.derive_keys(&password))
                .await
                .map(Arc::new);
            match &derived {
                Ok(_) => debug!("Derived keys for the published identity"),
                Err(e) => warn!(error = %e, "Password does not unlock the published identity"),
            }
            self.keys = Some(derived);
        }

        match &self.keys {
            Some(Ok(keys)) => Ok((bundle, keys.clone())),
            Some(Err(e)) => Err(ChannelError::InvalidCredentials(e.clone())),
            None => Err(ChannelError::InvalidCredentials(CryptoError::InvalidDerivation)),
        }
    }
}

/// Run a key stretch on the blocking pool so it does not stall the runtime.
pub(crate) async fn blocking<T, F>(stretch: F) -> Result<T, CryptoError>
where
    F: FnOnce() -> Result<T, CryptoError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(stretch).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        // Only when the runtime shuts down
        Err(_) => Err(CryptoError::InvalidDerivation),
    }
}
