//! Accumulated output of a batch run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

use super::{ArtifactKind, ArtifactPayload, BatchResult, KindSet, PageRange};
use crate::error::{BatchError, Error, Result};

/// A file produced by one batch, renamed to be unique across the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    /// Unique name within the collection
    pub name: String,
    /// Name the extraction service gave the file
    pub original_name: String,
    /// Batch the file came from
    pub range: PageRange,
    /// File content
    pub data: Vec<u8>,
}

/// Named files unioned across batches, in merge order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCollection {
    files: Vec<NamedFile>,
    names: HashSet<String>,
}

impl FileCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file from the batch covering `range` and return its final name.
    ///
    /// The name is prefixed with the batch's start page; if that still
    /// collides, a numeric suffix is added before the extension.
    pub fn insert(&mut self, range: PageRange, name: &str, data: Vec<u8>) -> String {
        let base = prefixed_name(range.start(), name);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.names.contains(&candidate) {
            candidate = with_suffix(&base, n);
            n += 1;
        }

        self.names.insert(candidate.clone());
        self.files.push(NamedFile {
            name: candidate.clone(),
            original_name: name.to_string(),
            range,
            data,
        });
        candidate
    }

    /// Look up a file by its final name.
    pub fn get(&self, name: &str) -> Option<&NamedFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Final file names in merge order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.name.as_str())
    }

    /// Iterate over files in merge order.
    pub fn iter(&self) -> std::slice::Iter<'_, NamedFile> {
        self.files.iter()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<'a> IntoIterator for &'a FileCollection {
    type Item = &'a NamedFile;
    type IntoIter = std::slice::Iter<'a, NamedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Prefix a file name with a zero-padded start page (`p0101_fig1.png`).
pub fn prefixed_name(start_page: u32, name: &str) -> String {
    format!("p{:04}_{}", start_page, name)
}

fn with_suffix(name: &str, n: usize) -> String {
    let file_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = file_start + dot;
            format!("{}-{}{}", &name[..dot], n, &name[dot..])
        }
        _ => format!("{}-{}", name, n),
    }
}

/// Metadata returned by one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Batch the record came from
    pub range: PageRange,
    /// Raw metadata content as returned by the service
    pub content: String,
}

/// Text contributed by one batch, as a byte span of the merged body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Batch the text came from
    pub range: PageRange,
    /// Byte span within [`MergedResult::text`]
    pub span: Range<usize>,
}

/// Counters collected while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Number of batches merged
    pub batch_count: u32,
    /// Number of pages covered by merged batches
    pub page_count: u32,
    /// Size of the merged text body in bytes
    pub text_bytes: usize,
    /// Number of image files
    pub image_count: usize,
    /// Number of table files
    pub table_count: usize,
    /// Number of metadata records
    pub metadata_count: usize,
    /// Number of file names that had to be changed beyond the page prefix
    pub renamed_count: usize,
}

/// Final output of a run, one container per requested artifact kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedResult {
    kinds: KindSet,
    text: String,
    segments: Vec<TextSegment>,
    images: FileCollection,
    tables: FileCollection,
    metadata: Vec<MetadataRecord>,
    ranges: Vec<PageRange>,
    stats: MergeStats,
}

impl MergedResult {
    /// Create an empty result for the requested kinds.
    pub fn new(kinds: KindSet) -> Self {
        Self {
            kinds,
            text: String::new(),
            segments: Vec::new(),
            images: FileCollection::new(),
            tables: FileCollection::new(),
            metadata: Vec::new(),
            ranges: Vec::new(),
            stats: MergeStats::default(),
        }
    }

    /// Fold one batch into the result.
    ///
    /// Batches must arrive in plan order: `range` has to start after every
    /// range merged so far. Payloads for kinds that were not requested are
    /// dropped.
    pub fn merge(&mut self, range: PageRange, batch: BatchResult) -> Result<()> {
        if let Some(last) = self.ranges.last() {
            if range.start() <= last.end() {
                return Err(Error::InvalidPlan(format!(
                    "{} merged after {}; batches must be merged in plan order",
                    range, last
                )));
            }
        }

        for (kind, payload) in batch.into_artifacts() {
            if !self.kinds.contains(&kind) {
                log::debug!("{}: ignoring unrequested {} payload", range, kind);
                continue;
            }
            match (kind, payload) {
                (ArtifactKind::Text, payload) => self.append_text(range, payload),
                (ArtifactKind::Metadata, payload) => self.append_metadata(range, payload),
                (ArtifactKind::Image, ArtifactPayload::Files(files)) => {
                    for (name, data) in files {
                        let final_name = self.images.insert(range, &name, data);
                        self.note_rename(range, &name, &final_name);
                    }
                }
                (ArtifactKind::Table, ArtifactPayload::Files(files)) => {
                    for (name, data) in files {
                        let final_name = self.tables.insert(range, &name, data);
                        self.note_rename(range, &name, &final_name);
                    }
                }
                (kind, ArtifactPayload::Text(_)) => {
                    log::warn!("{}: {} payload is not a file collection, skipped", range, kind);
                }
            }
        }

        if self.kinds.contains(&ArtifactKind::Text)
            && self.segments.last().map(|s| s.range) != Some(range)
        {
            self.append_text(range, ArtifactPayload::Text(String::new()));
        }

        self.ranges.push(range);
        self.stats.batch_count += 1;
        self.stats.page_count += range.len();
        self.stats.text_bytes = self.text.len();
        self.stats.image_count = self.images.len();
        self.stats.table_count = self.tables.len();
        self.stats.metadata_count = self.metadata.len();
        Ok(())
    }

    fn append_text(&mut self, range: PageRange, payload: ArtifactPayload) {
        let text = match payload {
            ArtifactPayload::Text(text) => text,
            ArtifactPayload::Files(files) => {
                log::warn!("{}: text delivered as files, concatenating", range);
                files
                    .into_values()
                    .map(|data| String::from_utf8_lossy(&data).into_owned())
                    .collect()
            }
        };
        let start = self.text.len();
        self.text.push_str(&text);
        self.segments.push(TextSegment {
            range,
            span: start..self.text.len(),
        });
    }

    fn append_metadata(&mut self, range: PageRange, payload: ArtifactPayload) {
        match payload {
            ArtifactPayload::Text(content) => self.metadata.push(MetadataRecord { range, content }),
            ArtifactPayload::Files(files) => {
                for data in files.into_values() {
                    self.metadata.push(MetadataRecord {
                        range,
                        content: String::from_utf8_lossy(&data).into_owned(),
                    });
                }
            }
        }
    }

    fn note_rename(&mut self, range: PageRange, original: &str, final_name: &str) {
        if final_name != prefixed_name(range.start(), original) {
            log::debug!("{}: {} stored as {}", range, original, final_name);
            self.stats.renamed_count += 1;
        }
    }

    /// Requested artifact kinds.
    pub fn kinds(&self) -> &KindSet {
        &self.kinds
    }

    /// Merged text body, in plan order.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Per-batch spans of the text body.
    pub fn text_segments(&self) -> &[TextSegment] {
        &self.segments
    }

    /// Text contributed by the batch covering exactly `range`.
    pub fn text_for(&self, range: PageRange) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.range == range)
            .map(|s| &self.text[s.span.clone()])
    }

    /// Merged image files.
    pub fn images(&self) -> &FileCollection {
        &self.images
    }

    /// Merged table files.
    pub fn tables(&self) -> &FileCollection {
        &self.tables
    }

    /// File collection for `kind`, if it is a file-collection kind.
    pub fn files(&self, kind: ArtifactKind) -> Option<&FileCollection> {
        match kind {
            ArtifactKind::Image => Some(&self.images),
            ArtifactKind::Table => Some(&self.tables),
            _ => None,
        }
    }

    /// Metadata records in plan order.
    pub fn metadata(&self) -> &[MetadataRecord] {
        &self.metadata
    }

    /// Ranges merged so far, in plan order.
    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    /// Merge statistics.
    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    /// Check if no batch has been merged.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// A batch that could not be merged.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Page range of the batch
    pub range: PageRange,
    /// Why it failed
    pub cause: BatchError,
}

/// Result of a lenient run in which some batches failed.
///
/// `merged` covers only the successful batches; check `failures` before
/// treating it as complete.
#[derive(Debug, Clone)]
pub struct PartialResult {
    /// Artifacts from the batches that succeeded
    pub merged: MergedResult,
    /// Batches that failed, in plan order
    pub failures: Vec<BatchFailure>,
}

impl PartialResult {
    /// Page ranges of the failed batches.
    pub fn failed_ranges(&self) -> Vec<PageRange> {
        self.failures.iter().map(|f| f.range).collect()
    }
}
