pub mod server;

/// What the CLI resolved to run.
pub enum Action {
    Server(server::Args),
}
