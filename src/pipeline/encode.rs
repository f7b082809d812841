//! Image encoding: page image file → base64 [`EncodedImage`].
//!
//! Vision APIs accept images as base64 data-URIs embedded in the JSON
//! request body. The rendered pages are PNG — lossless, so the fine print
//! on identity cards survives; JPEG artefacts on rendered text measurably
//! degrade extraction accuracy.

use crate::provider::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Read a rendered page image and base64-encode it for the capability call.
///
/// The bytes are passed through untouched — no re-encoding, no resizing;
/// the rasteriser already controls the pixel density via DPI.
pub fn encode_image_file(path: &Path) -> Result<EncodedImage, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let b64 = STANDARD.encode(&bytes);
    debug!("encoded {} → {} bytes base64", path.display(), b64.len());
    Ok(EncodedImage::new(b64, mime_type_for(path)))
}

fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            "image/jpeg"
        }
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cin_page_01.png");
        std::fs::write(&path, b"fake png bytes").unwrap();

        let img = encode_image_file(&path).expect("encode should succeed");
        assert_eq!(img.mime_type, "image/png");
        let decoded = STANDARD.decode(&img.data).expect("valid base64");
        assert_eq!(decoded, b"fake png bytes");
    }

    #[test]
    fn jpeg_extension_sets_mime() {
        assert_eq!(mime_type_for(Path::new("scan.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("scan.png")), "image/png");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(encode_image_file(Path::new("/no/such/image.png")).is_err());
    }
}
