pub mod activations;
mod classifier;
pub mod layers;
pub mod loss;
mod model;

pub use classifier::{ClassifierSpec, SequenceClassifier};
pub use model::{Mode, Model, ParamGroup, argmax_rows};
