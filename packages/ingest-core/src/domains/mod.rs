pub mod billing;
pub mod categorization;
pub mod documents;
pub mod error;
pub mod ingestions;
pub mod usage;
pub mod vectors;

pub use error::ServiceError;
