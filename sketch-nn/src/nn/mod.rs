pub mod activation;
pub mod mask;
pub mod point;

pub use activation::*;
pub use mask::*;
pub use point::*;
