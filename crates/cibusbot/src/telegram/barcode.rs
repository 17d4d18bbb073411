//! Code 128 barcode rendering
//!
//! Shop scanners read the coupon id off the phone screen, so the image is
//! wide and tall enough to scan at arm's length.

use barcoders::generators::image::{Color, Image, Rotation};
use barcoders::sym::code128::Code128;
use thiserror::Error;

/// Bar height in pixels
const HEIGHT: u32 = 200;

/// Width of a single module in pixels
const X_DIM: u32 = 3;

/// Code 128 character set B prefix understood by `barcoders`
const CHARSET_B: char = 'Ɓ';

#[derive(Error, Debug)]
pub enum BarcodeError {
    #[error("can't encode {id:?} as Code 128: {reason}")]
    Encode { id: String, reason: String },

    #[error("can't render barcode image: {0}")]
    Render(String),
}

/// Renders `coupon_id` as a PNG Code 128 barcode.
pub fn render_png(coupon_id: &str) -> Result<Vec<u8>, BarcodeError> {
    let barcode = Code128::new(format!("{}{}", CHARSET_B, coupon_id)).map_err(|e| BarcodeError::Encode {
        id: coupon_id.to_string(),
        reason: e.to_string(),
    })?;
    let encoded = barcode.encode();

    let png = Image::PNG {
        height: HEIGHT,
        xdim: X_DIM,
        rotation: Rotation::Zero,
        foreground: Color::new([0, 0, 0, 255]),
        background: Color::new([255, 255, 255, 255]),
    };

    png.generate(&encoded[..]).map_err(|e| BarcodeError::Render(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_renders_png() {
        let png = render_png("912345678").unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_renders_every_valid_id_charset() {
        for id in ["1234", "1234567890123456", "coupon-id_1.v2"] {
            assert!(render_png(id).unwrap().starts_with(PNG_MAGIC), "id {:?}", id);
        }
    }
}
