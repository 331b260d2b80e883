pub mod error;
pub mod supervisor;

pub use error::{Error, Result};
pub use supervisor::PipelineSupervisor;
