//! Mixing kernels - per-dab pixel operations on float premultiplied color

pub mod hsv;
pub mod rms;
mod wet;

pub use hsv::mix_saturated;
pub use rms::{flow_mask, rms_mix, RmsParams};
pub use wet::WetMaps;
