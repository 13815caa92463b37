pub mod base;
pub mod embeddings;
pub mod index;
pub mod prompts;
pub mod sources;
pub mod store;
pub mod tools;

pub use base::KnowledgeBase;
pub use embeddings::{create_embedder, EmbeddingProvider, HttpEmbeddingProvider};
pub use index::VectorIndex;
pub use store::EmbeddingCache;
