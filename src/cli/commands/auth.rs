//! Token-secret and frontend arguments.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_ACCESS_SECRET: &str = "access-secret";
pub const ARG_REFRESH_SECRET: &str = "refresh-secret";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_SECRET)
                .long(ARG_ACCESS_SECRET)
                .help("HMAC secret for access tokens")
                .env("FITCORE_ACCESS_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_SECRET)
                .long(ARG_REFRESH_SECRET)
                .help("HMAC secret for refresh tokens, must differ from the access secret")
                .env("FITCORE_REFRESH_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend origin allowed by CORS; https enables Secure cookies")
                .env("FITCORE_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
}

pub struct Options {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub frontend_base_url: Url,
}

impl Options {
    /// Extract and validate the auth options.
    ///
    /// # Errors
    /// Returns an error if an argument is missing, the secrets match, or the
    /// URL does not parse.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let access_secret = matches
            .get_one::<String>(ARG_ACCESS_SECRET)
            .cloned()
            .context("missing required argument: --access-secret")?;
        let refresh_secret = matches
            .get_one::<String>(ARG_REFRESH_SECRET)
            .cloned()
            .context("missing required argument: --refresh-secret")?;
        if access_secret == refresh_secret {
            anyhow::bail!("access and refresh secrets must differ");
        }
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        let frontend_base_url = Url::parse(&frontend_base_url)
            .with_context(|| format!("invalid frontend base URL: {frontend_base_url}"))?;

        Ok(Self {
            access_secret: SecretString::from(access_secret),
            refresh_secret: SecretString::from(refresh_secret),
            frontend_base_url,
        })
    }
}
