pub mod error;
pub mod queue;
pub mod status_client;

pub use error::{Error, Result};
pub use queue::IngestQueue;
pub use status_client::IngestStatusClient;
