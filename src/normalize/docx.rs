//! Word (.docx) notes.
//!
//! A DOCX file is a ZIP archive. The parts used here:
//!
//! - `word/document.xml`: body text, runs and drawing references
//! - `word/_rels/document.xml.rels`: relationship id → part path
//! - `word/media/*`: embedded images
//!
//! The body is walked once with a streaming XML reader. Text comes from
//! `w:t` runs; `w:tab` becomes a tab; `w:br`, `w:cr` and the end of every
//! `w:p` become newlines. Each `a:blip r:embed` (or legacy
//! `v:imagedata r:id`) is resolved through the relationships and read from
//! the archive in document order. Media the model cannot read are converted
//! to PNG, or skipped when they cannot be decoded.

use super::encode::encode_media;
use crate::document::{ImagePart, NormalizedDocument};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Extract text (and, when `extract_images`, embedded images) from a DOCX.
///
/// The error string describes what is wrong with the container; the caller
/// attaches the file name.
pub fn normalize_docx(bytes: &[u8], extract_images: bool) -> Result<NormalizedDocument, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a valid DOCX archive: {e}"))?;

    let body = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| "missing word/document.xml".to_string())?;

    let walked = walk_body(&body)?;

    let mut images = Vec::new();
    if extract_images && !walked.image_refs.is_empty() {
        let rels = match read_part(&mut archive, "word/_rels/document.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        for rel_id in &walked.image_refs {
            if let Some(img) = load_image(&mut archive, &rels, rel_id) {
                images.push(img);
            }
        }
    }

    debug!(
        "DOCX: {} chars of text, {} images",
        walked.text.len(),
        images.len()
    );

    Ok(NormalizedDocument {
        text: walked.text.trim_end().to_string(),
        images,
    })
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Option<String>, String> {
    let Ok(mut part) = archive.by_name(name) else {
        return Ok(None);
    };
    let mut content = String::new();
    part.read_to_string(&mut content)
        .map_err(|e| format!("cannot read {name}: {e}"))?;
    Ok(Some(content))
}

#[inline]
fn get_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(Result::ok)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

#[derive(Debug, Default)]
struct WalkedBody {
    text: String,
    /// Relationship ids of referenced images, in document order.
    image_refs: Vec<String>,
}

#[derive(Default)]
struct WalkState {
    body: WalkedBody,
    in_text: bool,
    /// Inside `w:pPr`, where `w:tab` means a tab stop, not a tab character.
    in_paragraph_props: bool,
}

impl WalkState {
    fn on_element(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:tab" if !self.in_paragraph_props => self.body.text.push('\t'),
            b"w:br" | b"w:cr" => self.body.text.push('\n'),
            b"a:blip" => {
                if let Some(id) = get_attr(e, b"r:embed") {
                    self.body.image_refs.push(id);
                }
            }
            b"v:imagedata" => {
                if let Some(id) = get_attr(e, b"r:id") {
                    self.body.image_refs.push(id);
                }
            }
            _ => {}
        }
    }
}

fn walk_body(xml: &str) -> Result<WalkedBody, String> {
    let mut reader = Reader::from_str(xml);
    // w:t runs carry significant whitespace (xml:space="preserve").
    reader.trim_text(false);

    let mut state = WalkState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => state.in_text = true,
                b"w:pPr" => state.in_paragraph_props = true,
                _ => state.on_element(&e),
            },
            Ok(Event::Empty(e)) => state.on_element(&e),
            Ok(Event::Text(e)) if state.in_text => {
                let text = e.unescape().unwrap_or_default();
                state.body.text.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => state.in_text = false,
                b"w:pPr" => state.in_paragraph_props = false,
                b"w:p" => state.body.text.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed word/document.xml: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(state.body)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, String> {
    let mut relationships = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                let external = get_attr(&e, b"TargetMode").is_some_and(|m| m == "External");
                if let (false, Some(id), Some(target)) =
                    (external, get_attr(&e, b"Id"), get_attr(&e, b"Target"))
                {
                    relationships.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed relationships: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Archive path for a relationship target, which is relative to `word/`
/// unless it starts with `/`.
fn media_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target.trim_start_matches("./")),
    }
}

fn load_image(
    archive: &mut Archive<'_>,
    rels: &HashMap<String, String>,
    rel_id: &str,
) -> Option<ImagePart> {
    let Some(target) = rels.get(rel_id) else {
        warn!("DOCX image reference {rel_id} has no relationship, skipped");
        return None;
    };
    let path = media_path(target);
    let mut file = match archive.by_name(&path) {
        Ok(f) => f,
        Err(e) => {
            warn!("DOCX media part {path} unreadable ({e}), skipped");
            return None;
        }
    };
    let mut bytes = Vec::new();
    if let Err(e) = file.read_to_end(&mut bytes) {
        warn!("DOCX media part {path} unreadable ({e}), skipped");
        return None;
    }
    encode_media(&bytes, &path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalize::encode::encode_bytes;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
            xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
            xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <w:body>
    <w:p>
      <w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
      <w:r><w:t xml:space="preserve">Cell </w:t></w:r>
      <w:r><w:t>biology</w:t><w:tab/><w:t>&amp; more</w:t></w:r>
    </w:p>
    <w:p>
      <w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r>
      <w:r><w:drawing><a:graphic><a:graphicData><a:blip r:embed="rId5"/></a:graphicData></a:graphic></w:drawing></w:r>
    </w:p>
  </w:body>
</w:document>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;

    /// Build an in-memory DOCX with the given body, relationships and media.
    pub(crate) fn build_docx(body: &str, rels: Option<&str>, media: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
        if let Some(rels) = rels {
            zip.start_file("word/_rels/document.xml.rels", opts).unwrap();
            zip.write_all(rels.as_bytes()).unwrap();
        }
        for (name, bytes) in media {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_text_with_tabs_and_breaks() {
        let bytes = build_docx(BODY, Some(RELS), &[("word/media/image1.png", &b"png-bytes"[..])]);
        let doc = normalize_docx(&bytes, true).unwrap();
        assert_eq!(doc.text, "Cell biology\t& more\nLine one\nLine two");
    }

    #[test]
    fn resolves_embedded_images_through_relationships() {
        let bytes = build_docx(BODY, Some(RELS), &[("word/media/image1.png", &b"png-bytes"[..])]);
        let doc = normalize_docx(&bytes, true).unwrap();
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].mime_type, "image/png");
        assert_eq!(doc.images[0], encode_bytes(b"png-bytes", "image/png"));
    }

    #[test]
    fn text_only_mode_skips_media() {
        let bytes = build_docx(BODY, Some(RELS), &[("word/media/image1.png", &b"png-bytes"[..])]);
        let doc = normalize_docx(&bytes, false).unwrap();
        assert!(doc.images.is_empty());
        assert!(doc.text.contains("Line two"));
    }

    #[test]
    fn undecodable_media_are_skipped() {
        let rels = RELS.replace("media/image1.png", "media/image1.emf");
        let bytes = build_docx(
            BODY,
            Some(&rels),
            &[("word/media/image1.emf", &b"\x01\x00\x00\x00EMF-bytes"[..])],
        );
        let doc = normalize_docx(&bytes, true).unwrap();
        assert!(doc.images.is_empty());
        assert!(doc.text.contains("Line two"));
    }

    #[test]
    fn missing_media_part_is_skipped() {
        let bytes = build_docx(BODY, Some(RELS), &[]);
        let doc = normalize_docx(&bytes, true).unwrap();
        assert!(doc.images.is_empty());
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let err = normalize_docx(b"plain text, not a zip", true).unwrap_err();
        assert!(err.contains("DOCX"), "got: {err}");
    }

    #[test]
    fn zip_without_body_is_an_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let err = normalize_docx(&bytes, true).unwrap_err();
        assert!(err.contains("word/document.xml"));
    }

    #[test]
    fn media_paths_resolve_relative_to_word() {
        assert_eq!(media_path("media/image1.png"), "word/media/image1.png");
        assert_eq!(media_path("/word/media/a.jpeg"), "word/media/a.jpeg");
    }
}
