mod dense;
mod dropout;
mod embedding;

pub use dense::Dense;
pub use dropout::Dropout;
pub use embedding::EmbeddingBag;
