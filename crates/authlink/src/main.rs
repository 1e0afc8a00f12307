//! Command line client for authlink channels.
//!
//! Creates identities, checks passwords against the published auth bundle, and connects to a
//! peer to exchange JSON messages over stdin and stdout.

use clap::{CommandFactory, Parser};
use color_eyre::eyre::Result;
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use crate::command::*;

mod command;
mod identity;
mod prompt;
mod session;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // the log level hierarchy is determined by:
    //    - if RUST_LOG is detected at runtime
    //    - if RUST_LOG is provided at compile time
    //    - default to INFO
    let filter = EnvFilter::builder()
        .with_default_directive(
            option_env!("RUST_LOG")
                .unwrap_or("info")
                .parse()
                .expect("should provide valid log level at compile time."),
        )
        // parse directives from the RUST_LOG environment variable,
        // overriding the default directive for matching targets.
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    color_eyre::install()?;

    let cli = Cli::parse();

    let Some(command) = cli.command.clone() else {
        let mut cmd = Cli::command();
        cmd.print_help()?;
        return Ok(());
    };

    process_commands(command, cli).await
}

async fn process_commands(command: Commands, cli: Cli) -> Result<()> {
    match command {
        Commands::Init { out } => identity::init(cli.password, out),
        Commands::Check => identity::check(cli.auth_url, cli.password).await,
        Commands::Connect => session::connect(session::Endpoints::new(&cli)?, cli.password).await,
        Commands::Rotate { new_password } => {
            session::rotate(session::Endpoints::new(&cli)?, cli.password, new_password).await
        }
    }
}
