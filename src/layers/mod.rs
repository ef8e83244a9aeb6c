pub mod base;
pub mod macros;
pub mod marker;

pub use base::{LayerProperties, LayerTrait, LayerType};
pub use marker::Marker;
