//! Text and image extraction for uploaded documents.
//!
//! PDFs go through `pdf-extract`; everything else must be valid UTF-8 text.
//! Embedded PDF images are pulled out with `lopdf`. Only XObjects whose
//! stream is already an encoded image file (DCT/JPX) are kept; raw pixel
//! streams are skipped.

use lopdf::{Dictionary, Document, Object, ObjectId};

pub const MIME_PDF: &str = "application/pdf";

/// Images smaller than this in either dimension are icons or rules.
pub const MIN_IMAGE_WIDTH: i64 = 100;
pub const MIN_IMAGE_HEIGHT: i64 = 100;

#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    NotText(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::NotText(name) => {
                write!(f, "{} is neither a PDF nor UTF-8 text", name)
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Kind of document an upload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Text => "text",
        }
    }
}

/// Detect the kind of `bytes` from magic bytes, falling back to the file extension.
pub fn detect_kind(filename: &str, bytes: &[u8]) -> DocumentKind {
    let sniffed_pdf = infer::get(bytes).is_some_and(|k| k.mime_type() == MIME_PDF);
    if sniffed_pdf || filename.to_lowercase().ends_with(".pdf") {
        DocumentKind::Pdf
    } else {
        DocumentKind::Text
    }
}

/// Extract plain text from an uploaded document.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<(DocumentKind, String), ExtractError> {
    match detect_kind(filename, bytes) {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map(|text| (DocumentKind::Pdf, text))
            .map_err(|e| ExtractError::Pdf(e.to_string())),
        DocumentKind::Text => String::from_utf8(bytes.to_vec())
            .map(|text| (DocumentKind::Text, text))
            .map_err(|_| ExtractError::NotText(filename.to_string())),
    }
}

/// Label prefix for images of an uploaded PDF: the filename without `.pdf`.
pub fn default_label_prefix(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.len().checked_sub(4) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".pdf") => {
            name[..cut].to_string()
        }
        _ => name.to_string(),
    }
}

/// An image found on a PDF page.
#[derive(Debug, Clone)]
pub struct PdfImage {
    /// 1-based page number.
    pub page: u32,
    pub width: i64,
    pub height: i64,
    pub bytes: Vec<u8>,
}

/// Extract embedded images from a PDF, in page order.
///
/// Each image XObject is returned once, on the first page that uses it.
pub fn extract_pdf_images(bytes: &[u8]) -> Result<Vec<PdfImage>, ExtractError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut seen = std::collections::HashSet::new();
    let mut images = Vec::new();

    for (page, page_id) in doc.get_pages() {
        for (image_id, dict, content) in page_image_streams(&doc, page_id) {
            if !seen.insert(image_id) {
                continue;
            }
            let width = dict.get(b"Width").and_then(Object::as_i64).unwrap_or(0);
            let height = dict.get(b"Height").and_then(Object::as_i64).unwrap_or(0);
            if width < MIN_IMAGE_WIDTH || height < MIN_IMAGE_HEIGHT {
                tracing::debug!(page, width, height, "skipping small pdf image");
                continue;
            }
            if !infer::is_image(content) {
                tracing::debug!(page, "skipping pdf image without a file encoding");
                continue;
            }
            images.push(PdfImage {
                page,
                width,
                height,
                bytes: content.to_vec(),
            });
        }
    }
    Ok(images)
}

fn page_image_streams(doc: &Document, page_id: ObjectId) -> Vec<(ObjectId, &Dictionary, &[u8])> {
    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|obj| resolve_dict(doc, obj))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(_, obj)| {
            let id = obj.as_reference().ok()?;
            let stream = doc.get_object(id).ok()?.as_stream().ok()?;
            let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok()?;
            (subtype == b"Image").then_some((id, &stream.dict, stream.content.as_slice()))
        })
        .collect()
}

/// Resources of a page, inherited from the page tree when the page has none.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // page trees are shallow; the bound guards against reference cycles
    for _ in 0..32 {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        other => other.as_dict().ok(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object, Stream};

    /// Bytes that sniff as JPEG.
    pub fn jpeg(tag: u8) -> Vec<u8> {
        vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, tag, 0xFF, 0xD9,
        ]
    }

    /// A PDF with one page per entry of `pages`, each drawing the listed
    /// `(width, height, bytes)` images.
    pub fn pdf_with_images(pages: &[Vec<(i64, i64, Vec<u8>)>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();

        for images in pages {
            let mut xobjects = lopdf::Dictionary::new();
            for (i, (width, height, bytes)) in images.iter().enumerate() {
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => *width,
                        "Height" => *height,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    bytes.clone(),
                ));
                xobjects.set(format!("Im{}", i + 1), image_id);
            }
            let resources_id = doc.add_object(dictionary! { "XObject" => xobjects });
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{jpeg, pdf_with_images};
    use super::*;

    #[test]
    fn test_plain_text() {
        let (kind, text) = extract_text("notes.txt", "Library opens at 9.".as_bytes()).unwrap();
        assert_eq!(kind, DocumentKind::Text);
        assert_eq!(text, "Library opens at 9.");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = extract_text("blob.bin", &[0xff, 0xfe, 0x00, 0x80]).unwrap_err();
        assert!(matches!(err, ExtractError::NotText(_)));
    }

    #[test]
    fn test_pdf_detection() {
        assert_eq!(detect_kind("brochure.PDF", b"anything"), DocumentKind::Pdf);
        assert_eq!(detect_kind("x", b"%PDF-1.7\n"), DocumentKind::Pdf);
        assert_eq!(detect_kind("x.md", b"# heading"), DocumentKind::Text);
    }

    #[test]
    fn test_default_label_prefix() {
        assert_eq!(default_label_prefix("fest_brochure.pdf"), "fest_brochure");
        assert_eq!(default_label_prefix("uploads/Placements.PDF"), "Placements");
        assert_eq!(default_label_prefix("notes.txt"), "notes.txt");
        assert_eq!(default_label_prefix(".pdf"), "");
    }

    #[test]
    fn test_pdf_images_by_page() {
        let pdf = pdf_with_images(&[
            vec![(400, 300, jpeg(1))],
            vec![],
            vec![(640, 480, jpeg(2)), (32, 32, jpeg(3))],
        ]);
        let images = extract_pdf_images(&pdf).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].page, 1);
        assert_eq!(images[0].bytes, jpeg(1));
        assert_eq!(images[1].page, 3);
        assert_eq!((images[1].width, images[1].height), (640, 480));
    }

    #[test]
    fn test_pdf_images_skip_raw_pixels() {
        let pdf = pdf_with_images(&[vec![(200, 200, vec![0u8; 64])]]);
        assert!(extract_pdf_images(&pdf).unwrap().is_empty());
    }

    #[test]
    fn test_pdf_images_rejects_non_pdf() {
        assert!(matches!(
            extract_pdf_images(b"not a pdf at all"),
            Err(ExtractError::Pdf(_))
        ));
    }
}
