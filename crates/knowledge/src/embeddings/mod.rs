//! Embedding generation.
//!
//! Providers turn text into vectors. The [`Embedder`] wraps a provider with
//! the guarantees the index relies on: bounded calls, a fixed dimension,
//! finite non-zero vectors, and unit length under the inner-product metric.

pub mod config;
pub mod guard;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use guard::Embedder;
pub use provider::{create_provider, EmbeddingProvider};
