mod cli;
mod commands;

pub use self::cli::run;

/// Command line error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed command line input.
    #[error("invalid input: {0}")]
    Input(String),
    #[error("block rejected: {0}")]
    Block(#[from] nakamoto_validation::block::Error),
    #[error("script failed: {0}")]
    Script(#[from] nakamoto_script::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
