pub mod critique_service;
pub mod embedding;
pub mod validator;

pub use critique_service::CritiqueService;
pub use embedding::EmbeddingProvider;
pub use validator::Validator;
