pub mod engine;

pub use engine::{ImageTransformEngine, TransformedImage};
