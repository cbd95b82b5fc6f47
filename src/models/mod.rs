pub mod image;
pub mod record;

pub use image::*;
pub use record::*;
