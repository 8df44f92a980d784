//! Image encoding: `DynamicImage` or raw media bytes → base64 [`ImagePart`].
//!
//! Rendered pages and PDF image objects are re-encoded as PNG so text in
//! figures stays crisp. Embedded Word media keep their original bytes when
//! the model accepts the format, and are converted to PNG otherwise.

use crate::document::ImagePart;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::{debug, warn};

/// Image formats the answer model accepts as inline data.
pub const INLINE_IMAGE_MIMES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// Encode a decoded image as a base64 PNG.
pub fn encode_png(img: &DynamicImage) -> Result<ImagePart, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImagePart::new(b64, "image/png"))
}

/// Wrap already-encoded media bytes.
pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> ImagePart {
    ImagePart::new(STANDARD.encode(bytes), mime_type)
}

/// Encode an embedded media part for the model.
///
/// Accepted formats pass through; anything else is decoded and re-encoded
/// as PNG. Returns `None` when the bytes cannot be decoded (EMF, WMF, SVG).
pub fn encode_media(bytes: &[u8], name: &str) -> Option<ImagePart> {
    let mime = mime_from_extension(name);
    if INLINE_IMAGE_MIMES.contains(&mime) {
        return Some(encode_bytes(bytes, mime));
    }
    match image::load_from_memory(bytes).map(|img| encode_png(&img)) {
        Ok(Ok(part)) => {
            debug!("Converted {name} ({mime}) to PNG");
            Some(part)
        }
        Ok(Err(e)) | Err(e) => {
            warn!("Media {name} ({mime}) cannot be converted to PNG ({e}), skipped");
            None
        }
    }
}

/// MIME type for a media part name, by extension.
pub fn mime_from_extension(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "emf" => "image/emf",
        "wmf" => "image/wmf",
        _ => "application/octet-stream",
    }
}
