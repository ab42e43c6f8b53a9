//! Page-count inspection.
//!
//! Loads a PDF once, checks that it can be split, and records its page
//! count. Everything downstream works from the returned [`Document`].

use std::io::Read;
use std::path::Path;

use lopdf::Document as LopdfDocument;

use crate::header::{sniff, sniff_file};
use crate::error::{Error, Result};
use crate::model::Document;

/// Inspect a PDF file.
///
/// # Example
///
/// ```no_run
/// let doc = pdfbatch::inspect_file("report.pdf")?;
/// println!("{} pages", doc.page_count());
/// # Ok::<(), pdfbatch::Error>(())
/// ```
pub fn inspect_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    let header = sniff_file(path)?;
    let doc = LopdfDocument::load(path)?;
    finish(doc, header.version, Some(path.to_path_buf()))
}

/// Inspect a PDF held in memory.
pub fn inspect_bytes(data: &[u8]) -> Result<Document> {
    let header = sniff(data)?;
    let doc = LopdfDocument::load_mem(data)?;
    finish(doc, header.version, None)
}

/// Inspect a PDF from a reader.
pub fn inspect_reader<R: Read>(mut reader: R) -> Result<Document> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    inspect_bytes(&data)
}

fn finish(
    doc: LopdfDocument,
    header_version: String,
    source: Option<std::path::PathBuf>,
) -> Result<Document> {
    if doc.is_encrypted() {
        return Err(Error::unreadable("encrypted documents are not supported"));
    }

    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(Error::unreadable("document has no pages"));
    }

    let version = if doc.version.is_empty() {
        header_version
    } else {
        doc.version.clone()
    };

    log::debug!(
        "inspected {}: PDF {}, {} pages",
        source
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string()),
        version,
        page_count
    );

    Ok(Document::from_parts(source, version, page_count, doc))
}
