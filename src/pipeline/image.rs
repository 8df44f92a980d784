//! Stage 3: turn an image directive into a data URI.
//!
//! Reusing a notes image never touches the network. Generation is a single
//! image call; if it fails the answer simply goes without an illustration.

use super::directive::ImageDirective;
use crate::backend::ImageRequest;
use crate::client::LlmClient;
use crate::config::AnswerConfig;
use crate::document::NormalizedDocument;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

/// MIME type requested from, and recorded for, generated images.
pub const GENERATED_IMAGE_MIME: &str = "image/jpeg";

pub async fn resolve_image(
    client: &LlmClient,
    directive: Option<&ImageDirective>,
    notes: &NormalizedDocument,
    config: &AnswerConfig,
    label: &str,
) -> Option<String> {
    match directive? {
        ImageDirective::UseExisting(number) => {
            let uri = notes.image(*number).map(|img| img.to_data_uri());
            if uri.is_none() {
                warn!(
                    "{label}: model picked [Image {number}] but the notes have {} images",
                    notes.images.len()
                );
            }
            uri
        }
        ImageDirective::Generate(prompt) => {
            let request = ImageRequest {
                model: config.image_model.clone(),
                prompt: prompt.clone(),
                output_mime_type: GENERATED_IMAGE_MIME.to_string(),
            };
            match client.generate_image(label, &request).await {
                Ok(image) => {
                    debug!("{label}: generated {} byte image", image.bytes.len());
                    Some(format!(
                        "data:{GENERATED_IMAGE_MIME};base64,{}",
                        STANDARD.encode(&image.bytes)
                    ))
                }
                Err(e) => {
                    warn!("{label}: image generation failed, continuing without image: {e}");
                    None
                }
            }
        }
    }
}
