//! Infrastructure services: model provider, object storage, pools, and
//! the dependency container handed to the domain layer.

pub mod bootstrap;
pub mod deps;
pub mod object_store;
pub mod openai;
pub mod traits;

pub use deps::ServerDeps;
pub use object_store::DocumentStorage;
pub use openai::OpenAiClient;
pub use traits::{BaseAi, BaseEmbeddingService};
