//! Pairing code rendering.
//!
//! Pure function from pairing code text to PNG bytes: medium error
//! correction, scaled to a fixed 256x256 canvas.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

/// Output image edge length in pixels.
pub const QR_SIZE: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Render `data` as a 256x256 PNG with medium error correction.
pub fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;
    let modules = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();
    // min_dimensions rounds module sizes up; snap to the exact canvas.
    let scaled = imageops::resize(&modules, QR_SIZE, QR_SIZE, FilterType::Nearest);

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(scaled).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
