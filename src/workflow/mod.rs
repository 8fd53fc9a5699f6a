pub mod engine;
pub mod error;

pub use engine::{Principal, RequestAction};
pub use error::WorkflowError;
