use anyhow::Result;
use fitcore::cli::{self, actions::Action};

#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    match action {
        Action::Server(args) => cli::actions::server::execute(args).await,
    }
}
