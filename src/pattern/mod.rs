//! Procedural textures: seeded noise grids and the tileable paper height-field

pub mod noise;
mod paper;

pub use paper::PaperTexture;
