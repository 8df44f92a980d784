//! Plain text and Markdown notes.

use crate::document::NormalizedDocument;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode as UTF-8 (invalid sequences replaced), drop a leading BOM and
/// normalise line endings. Never produces images.
pub fn normalize_text(bytes: &[u8]) -> NormalizedDocument {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes)
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    NormalizedDocument::text_only(text)
}
