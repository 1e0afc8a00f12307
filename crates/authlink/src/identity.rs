use std::path::PathBuf;

use authlink_channel::{AuthBundleSource, FetchError, HttpAuthBundleSource};
use authlink_crypto::AuthBundle;
use color_eyre::eyre::{bail, eyre, Result};
use tracing::info;

use crate::{command::AUTH_URL_ENV, prompt};

/// Create a fresh identity and emit its bundle, the file the peer serves.
pub(crate) fn init(password: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let password = prompt::new_password_when_none("New password", password)?;
    let (bundle, _) = AuthBundle::create(&password)?;
    let json = bundle.to_json_pretty()?;

    match out {
        Some(path) => {
            std::fs::write(&path, json + "\n")?;
            info!(path = %path.display(), "Auth bundle written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub(crate) async fn check(auth_url: Option<String>, password: Option<String>) -> Result<()> {
    let Some(auth_url) = auth_url else {
        bail!("--auth-url or {AUTH_URL_ENV} is required");
    };

    let bundle = match HttpAuthBundleSource::new(auth_url).fetch().await {
        Ok(bundle) => bundle,
        Err(FetchError::NotFound) => {
            bail!("No auth bundle has been published. Create one with `authlink init`.")
        }
        Err(e) => return Err(e.into()),
    };

    let password = prompt::password_when_none(password)?;
    bundle
        .derive_keys(&password)
        .map_err(|e| eyre!("Invalid password: {e}"))?;

    println!("Password is valid");
    Ok(())
}
