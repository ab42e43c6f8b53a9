//! `%PDF-` header sniffing.
//!
//! Runs before the full parse so that inputs which are plainly not PDFs
//! (HTML error pages, images, empty downloads) fail with a clear reason.
//! Like most readers it tolerates junk before the marker, as long as the
//! marker appears within the first kilobyte.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// How far into the input the `%PDF-` marker is searched for.
pub const HEADER_SEARCH_LEN: usize = 1024;

const MARKER: &[u8] = b"%PDF-";

/// What the header line says about a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// Byte offset of the `%PDF-` marker
    pub offset: usize,
    /// Declared version, such as "1.7"
    pub version: String,
}

/// Sniff the header of an in-memory document.
pub fn sniff(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_LEN)];
    let offset = window
        .windows(MARKER.len())
        .position(|w| w == MARKER)
        .ok_or_else(|| {
            Error::unreadable(format!(
                "no %PDF- marker in the first {} bytes",
                HEADER_SEARCH_LEN
            ))
        })?;

    let rest = &data[offset + MARKER.len()..];
    let declared: Vec<u8> = rest
        .iter()
        .copied()
        .take(8)
        .take_while(|b| b.is_ascii_digit() || *b == b'.')
        .collect();
    let version = String::from_utf8_lossy(&declared).into_owned();

    let usable = matches!(
        version.split_once('.'),
        Some((major, minor)) if !major.is_empty() && !minor.is_empty() && !minor.contains('.')
    );
    if !usable {
        return Err(Error::unreadable(format!(
            "header declares no usable version: {:?}",
            String::from_utf8_lossy(&rest[..rest.len().min(8)])
        )));
    }

    Ok(PdfHeader { offset, version })
}

/// Sniff the header of a file, reading only its first kilobyte.
pub fn sniff_file<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let mut head = Vec::with_capacity(HEADER_SEARCH_LEN + 16);
    File::open(path)?
        .take((HEADER_SEARCH_LEN + 16) as u64)
        .read_to_end(&mut head)?;
    sniff(&head)
}
