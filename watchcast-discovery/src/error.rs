use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid channel url: {0}")]
    InvalidUrl(String),

    #[error("unexpected host: {0}")]
    DisallowedHost(String),

    #[error("failed to spawn {0}: {1}")]
    Spawn(&'static str, std::io::Error),

    #[error("metadata fetch for {0} exited with {1}")]
    NonZeroExit(&'static str, std::process::ExitStatus),

    #[error("malformed metadata from {0}: {1}")]
    MetadataParse(&'static str, serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
