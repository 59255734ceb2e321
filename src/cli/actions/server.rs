//! Server action: everything `api::serve` needs, resolved from the CLI.

use anyhow::Result;
use secrecy::SecretString;
use url::Url;

use crate::api;

pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub frontend_base_url: Url,
}

/// Run the API server until shutdown.
///
/// # Errors
/// Returns an error if the database connection or the listener fails.
pub async fn execute(args: Args) -> Result<()> {
    api::serve(
        args.port,
        &args.dsn,
        &args.access_secret,
        &args.refresh_secret,
        args.frontend_base_url,
    )
    .await
}
