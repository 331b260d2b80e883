use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to spawn {0}: {1}")]
    Spawn(&'static str, std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
