//! Normalised input representation shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// One image found while normalising a notes file.
///
/// `data` is the base64 payload (no `data:` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePart {
    pub data: String,
    pub mime_type: String,
}

impl ImagePart {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Self-contained `data:` URI for this image.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Plain text plus embedded/rendered images of one or more source files.
///
/// Image order only matters for `[Image N]` references in model output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub text: String,
    pub images: Vec<ImagePart>,
}

impl NormalizedDocument {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    /// Look up an image by its 1-based label number.
    pub fn image(&self, number: usize) -> Option<&ImagePart> {
        number.checked_sub(1).and_then(|i| self.images.get(i))
    }
}

/// Raw bytes of one uploaded file plus whatever type hint came with it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name, used for type detection and error messages.
    pub name: String,
    pub bytes: Vec<u8>,
    /// Declared MIME type, if the caller knows it.
    pub mime_type: Option<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_inlines_payload() {
        let img = ImagePart::new("aGVsbG8=", "image/png");
        assert_eq!(img.to_data_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn image_lookup_is_one_based() {
        let doc = NormalizedDocument {
            text: String::new(),
            images: vec![ImagePart::new("a", "image/png"), ImagePart::new("b", "image/jpeg")],
        };
        assert_eq!(doc.image(2).map(|i| i.data.as_str()), Some("b"));
        assert!(doc.image(0).is_none());
        assert!(doc.image(3).is_none());
    }
}
