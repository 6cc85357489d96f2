//! HTTP adapters for the critique service and embedding provider ports.

pub mod critique_client;
pub mod embedding_client;
mod http;

pub use critique_client::HttpCritiqueService;
pub use embedding_client::HttpEmbeddingProvider;
pub use http::API_KEY_ENV;
