//! Persisted-state contract
//!
//! Layer pixels travel as straight-alpha PNG streams, base64-encoded inside
//! the JSON project record and addressed by their SHA-256 content hash.

mod types;

pub use types::*;

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;
use sha2::{Digest, Sha256};

use crate::core::errors::EngineError;
use crate::layer::PixelBuffer;

/// Encode a premultiplied buffer as a straight-alpha PNG.
pub fn encode_layer_png(image: &PixelBuffer) -> Result<Vec<u8>, EngineError> {
    let mut buf = Cursor::new(Vec::new());
    image.to_straight_image().write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Decode a PNG stream into a premultiplied buffer.
pub fn decode_layer_png(bytes: &[u8]) -> Result<PixelBuffer, EngineError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    Ok(PixelBuffer::from_straight_image(&img.to_rgba8()))
}

/// Content hash used as `image_ref`.
pub fn image_ref(png: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(png);
    hex::encode(hasher.finalize())
}

pub fn encode_base64(png: &[u8]) -> String {
    BASE64.encode(png)
}

/// Decode base64 PNG data, with or without a `data:` URL prefix.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, EngineError> {
    let payload = if let Some(stripped) = data.strip_prefix("data:image/png;base64,") {
        stripped
    } else if data.starts_with("data:") {
        data.split_once(',').map_or(data, |(_, rest)| rest)
    } else {
        data
    };
    Ok(BASE64.decode(payload)?)
}

impl ProjectData {
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl LayerData {
    /// Decoded pixels, checked against the canvas dimensions.
    ///
    /// Returns `Ok(None)` for layers without image data (groups).
    pub fn decode_image(&self, width: u32, height: u32) -> Result<Option<PixelBuffer>, EngineError> {
        let Some(data) = &self.image_data else {
            return Ok(None);
        };
        let png = decode_base64(data)?;
        if let Some(expected) = &self.image_ref {
            let actual = image_ref(&png);
            if &actual != expected {
                tracing::warn!("Layer '{}' image hash mismatch ({} != {})", self.name, actual, expected);
            }
        }
        let image = decode_layer_png(&png)?;
        if image.dimensions() != (width, height) {
            return Err(EngineError::InvalidDimensions {
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(Some(image))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_png_preserves_opaque_pixels() {
        let mut image = PixelBuffer::new(3, 2);
        image.put_pixel(0, 0, [255, 0, 0, 255]);
        image.put_pixel(2, 1, [10, 20, 30, 255]);
        let png = encode_layer_png(&image).unwrap();
        assert_eq!(decode_layer_png(&png).unwrap(), image);
    }

    #[test]
    fn test_image_ref_is_hex_sha256() {
        let r = image_ref(b"abc");
        assert_eq!(r.len(), 64);
        assert!(r.starts_with("ba7816bf"));
    }

    #[test]
    fn test_decode_base64_data_url() {
        let encoded = format!("data:image/png;base64,{}", encode_base64(b"png"));
        assert_eq!(decode_base64(&encoded).unwrap(), b"png");
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn test_decode_image_checks_dimensions() {
        let png = encode_layer_png(&PixelBuffer::new(4, 4)).unwrap();
        let layer = LayerData {
            name: "Layer 1".into(),
            kind: crate::layer::LayerKind::Normal,
            visible: true,
            opacity: 1.0,
            blend_mode: "normal".into(),
            depth: 0,
            expanded: true,
            locked: false,
            alpha_lock: false,
            clipped: false,
            private: false,
            image_ref: Some(image_ref(&png)),
            image_data: Some(encode_base64(&png)),
        };
        assert!(layer.decode_image(4, 4).unwrap().is_some());
        assert!(layer.decode_image(8, 8).is_err());
    }
}
