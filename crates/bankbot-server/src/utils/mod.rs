pub mod error;
pub mod limiters;
pub mod similarity;

pub use error::{ApiError, ChatError};
pub use limiters::Limiters;
pub use similarity::{cosine_distance, cosine_similarity, similarity_from_distance};
