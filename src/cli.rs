//! CLI argument parsing and startup helpers.

use crate::config::{ClientConfig, DEFAULT_API_BASE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use url::Url;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mentor-session",
    about = "Sign in to the mentor API and keep the session fresh"
)]
pub struct Args {
    /// API origin
    #[arg(long, env = "MENTOR_API_BASE", default_value = DEFAULT_API_BASE, value_parser = validate_api_base)]
    pub api_base: Url,

    /// Cookie file holding the session between runs
    #[arg(long, env = "MENTOR_COOKIE_FILE", default_value = "mentor-session.json")]
    pub cookie_file: PathBuf,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in with username and password
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create a mentor account and log in
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// End the session
    Logout,
    /// Trade the refresh token for a new pair
    Refresh,
    /// Show token state
    Status,
    /// Fetch and print the signed-in profile
    Whoami,
    /// Reset a forgotten password
    ResetPassword {
        #[arg(short, long)]
        username: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Replace the profile description
    UpdateAbout { about: String },
    /// Keep the session fresh; every line on stdin counts as activity
    Watch,
}

fn validate_api_base(s: &str) -> Result<Url, String> {
    let url = Url::parse(s).map_err(|e| format!("Invalid API URL {}: {}", s, e))?;
    if url.cannot_be_a_base() {
        return Err(format!("API URL cannot be used as a base: {}", s));
    }
    let is_https = url.scheme() == "https";
    let is_local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
    if !is_https && !is_local {
        return Err("API URL must use HTTPS for non-local hosts".to_string());
    }
    Ok(url)
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_writer(std::io::stderr).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Build the client configuration from validated arguments.
pub fn build_config(args: &Args) -> ClientConfig {
    ClientConfig::new(args.api_base.clone()).with_cookie_file(&args.cookie_file)
}

/// Report a fatal startup error and return the exit code.
pub fn fail(context: &str, e: impl std::fmt::Display) -> i32 {
    error!(error = %e, "{}", context);
    1
}
