use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const URL_ENV: &str = "AUTHLINK_URL";
pub const AUTH_URL_ENV: &str = "AUTHLINK_AUTH_URL";
pub const PASSWORD_ENV: &str = "AUTHLINK_PASSWORD";
pub const NEW_PASSWORD_ENV: &str = "AUTHLINK_NEW_PASSWORD";

#[derive(Parser, Clone)]
#[command(name = "authlink", version, about = "Password authenticated channel client", long_about = None)]
pub struct Cli {
    // Optional as a workaround for https://github.com/clap-rs/clap/issues/3572
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, env = URL_ENV, help = "WebSocket endpoint of the peer")]
    pub url: Option<String>,

    #[arg(
        long,
        global = true,
        env = AUTH_URL_ENV,
        help = "URL of the published auth bundle"
    )]
    pub auth_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = PASSWORD_ENV,
        hide_env_values = true,
        help = "Password of the identity. Prompted for when missing."
    )]
    pub password: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    #[command(long_about = "Create a new identity and print its auth bundle.")]
    Init {
        #[arg(short = 'o', long, help = "Write the bundle to a file instead of stdout")]
        out: Option<PathBuf>,
    },

    #[command(long_about = "Check a password against the published auth bundle.")]
    Check,

    #[command(
        long_about = "Connect, print incoming messages as JSON lines and send every JSON line read from stdin."
    )]
    Connect,

    #[command(long_about = "Replace the published identity with one derived from a new password.")]
    Rotate {
        #[arg(
            long,
            env = NEW_PASSWORD_ENV,
            hide_env_values = true,
            help = "The new password. Prompted for when missing."
        )]
        new_password: Option<String>,
    },
}
