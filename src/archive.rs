//! Unpacking of artifact bundles returned as ZIP archives.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Component, Path};

use zip::ZipArchive;

use crate::error::Result;

/// Unpacked bundle: archive-relative name (always `/`-separated) → content.
pub type Bundle = BTreeMap<String, Vec<u8>>;

/// Entries larger than this are skipped.
pub const MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;

/// Unpack a ZIP archive held in memory.
pub fn unpack_zip(data: &[u8]) -> Result<Bundle> {
    unpack(ZipArchive::new(Cursor::new(data))?, MAX_ENTRY_SIZE)
}

/// Unpack a ZIP archive from a file.
pub fn unpack_zip_file<P: AsRef<Path>>(path: P) -> Result<Bundle> {
    let reader = BufReader::new(File::open(path)?);
    unpack(ZipArchive::new(reader)?, MAX_ENTRY_SIZE)
}

fn unpack<R: Read + Seek>(mut archive: ZipArchive<R>, max_entry_size: u64) -> Result<Bundle> {
    let mut bundle = Bundle::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        let Some(name) = sanitize_name(&raw_name) else {
            log::warn!("Skipping archive entry with unusable path: {}", raw_name);
            continue;
        };

        if entry.size() > max_entry_size {
            log::warn!(
                "Skipping archive entry {} ({} bytes exceeds {} byte limit)",
                name,
                entry.size(),
                max_entry_size
            );
            continue;
        }

        // The declared size is only a hint; the read itself is capped.
        let mut contents = Vec::new();
        entry
            .by_ref()
            .take(max_entry_size.saturating_add(1))
            .read_to_end(&mut contents)?;
        if contents.len() as u64 > max_entry_size {
            log::warn!(
                "Skipping archive entry {} (more than {} bytes)",
                name,
                max_entry_size
            );
            continue;
        }
        bundle.insert(name, contents);
    }

    log::debug!("unpacked {} archive entries", bundle.len());
    Ok(bundle)
}

/// Reduce an entry name to its normal components, joined with `/`.
///
/// Parent, root, and drive components are dropped, so an entry can never
/// escape the directory it is later written to. Returns `None` when nothing
/// is left.
pub fn sanitize_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    let parts: Vec<String> = Path::new(&normalized)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Check whether bytes look like a ZIP archive.
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06")
}
