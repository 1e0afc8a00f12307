use authlink_channel::{
    ChannelConfig, ChannelEvent, Connection, HttpAuthBundleSource, WebSocketConnector,
};
use color_eyre::eyre::{bail, Result};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    command::{Cli, AUTH_URL_ENV, URL_ENV},
    prompt,
};

pub(crate) struct Endpoints {
    url: String,
    auth_url: String,
}

impl Endpoints {
    pub(crate) fn new(cli: &Cli) -> Result<Self> {
        let Some(url) = cli.url.clone() else {
            bail!("--url or {URL_ENV} is required");
        };
        let Some(auth_url) = cli.auth_url.clone() else {
            bail!("--auth-url or {AUTH_URL_ENV} is required");
        };
        Ok(Self { url, auth_url })
    }

    fn connection(&self) -> (Connection, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let connection = Connection::new(
            ChannelConfig::default(),
            WebSocketConnector::new(&self.url),
            HttpAuthBundleSource::new(&self.auth_url),
            events_tx,
        );
        (connection, events)
    }
}

/// Bridge stdin and stdout to the channel until stdin ends or the channel fails for good.
pub(crate) async fn connect(endpoints: Endpoints, password: Option<String>) -> Result<()> {
    let password = prompt::password_when_none(password)?;
    let (connection, mut events) = endpoints.connection();

    connection.connect(&password).await?;
    info!(url = %endpoints.url, "Connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(&line) {
                    Ok(message) => connection.send(&message).await?,
                    Err(e) => warn!(error = %e, "Ignoring input line that is not JSON"),
                }
            }
            event = events.recv() => match event {
                Some(ChannelEvent::Message(message)) => println!("{message}"),
                Some(ChannelEvent::Disconnected(cause)) => warn!(%cause, "Connection lost, reconnecting"),
                Some(ChannelEvent::Reconnected) => info!("Reconnected"),
                Some(ChannelEvent::Error(e)) => {
                    connection.disconnect().await;
                    return Err(e.into());
                }
                None => break,
            },
        }
    }

    connection.disconnect().await;
    Ok(())
}

pub(crate) async fn rotate(
    endpoints: Endpoints,
    password: Option<String>,
    new_password: Option<String>,
) -> Result<()> {
    let password = prompt::password_when_none(password)?;
    let (connection, _events) = endpoints.connection();

    connection.connect(&password).await?;
    let new_password = prompt::new_password_when_none("New password", new_password)?;

    let result = connection.rotate(&new_password).await;
    connection.disconnect().await;
    result?;

    println!("Password changed");
    Ok(())
}
