//! CLI entry point for grantline.

pub mod auth;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// grantline CLI
#[derive(Parser, Debug)]
#[command(name = "grantline", version, about = "OAuth2 grant proxy CLI")]
pub struct Cli {
    /// Directory for stored tokens and pending state (default: ~/.grantline)
    #[arg(long, global = true, env = "GRANTLINE_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Read client configuration from a TOML file instead of the environment
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with the device-code flow
    Device(ScopeArgs),
    /// Print the authorization URL for the authorization-code flow
    Authorize(AuthorizeArgs),
    /// Finish the authorization-code flow with the callback parameters
    Callback(CallbackArgs),
    /// Forget stored tokens and any pending device code
    Logout,
}

#[derive(Parser, Debug)]
pub struct ScopeArgs {
    /// Requested scope; repeat for several
    #[arg(short, long = "scope", required = true)]
    pub scopes: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct AuthorizeArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Session to key the pending login under (default: a fresh random id)
    #[arg(long)]
    pub session: Option<String>,

    /// Application data to carry through the state parameter
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CallbackArgs {
    #[arg(long)]
    pub code: String,

    #[arg(long)]
    pub state: String,

    /// Session printed by `grantline authorize`
    #[arg(long)]
    pub session: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
