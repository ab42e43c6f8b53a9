//! On-disk layout of a run's output.
//!
//! ```text
//! <root>/
//! ├── text.txt         merged text
//! ├── images/          image files, page-prefixed
//! ├── tables/          table files, page-prefixed
//! ├── metadata.json    [{start, end, content}, ...]
//! └── failures.json    [{start, end, reason}, ...]   (partial runs only)
//! ```
//!
//! Only the parts for requested kinds are written.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::sanitize_name;
use crate::error::Result;
use crate::model::{ArtifactKind, BatchFailure, FileCollection, MergedResult};
use crate::orchestrator::RunOutcome;

/// File name of the merged text.
pub const TEXT_FILE: &str = "text.txt";
/// Directory of image files.
pub const IMAGES_DIR: &str = "images";
/// Directory of table files.
pub const TABLES_DIR: &str = "tables";
/// File name of the metadata records.
pub const METADATA_FILE: &str = "metadata.json";
/// File name of the failure report.
pub const FAILURES_FILE: &str = "failures.json";

#[derive(Serialize)]
struct MetadataEntry<'a> {
    start: u32,
    end: u32,
    content: &'a str,
}

#[derive(Serialize)]
struct FailureEntry {
    start: u32,
    end: u32,
    reason: String,
}

/// Writes merged results under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Create a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout next to `source`, in a directory named after its stem
    /// (`scans/report.pdf` → `scans/report/`).
    pub fn beside(source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "output".into());
        let parent = source.parent().unwrap_or_else(|| Path::new(""));
        Self::new(parent.join(stem))
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the merged text file.
    pub fn text_path(&self) -> PathBuf {
        self.root.join(TEXT_FILE)
    }

    /// Directory holding image files.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// Directory holding table files.
    pub fn tables_dir(&self) -> PathBuf {
        self.root.join(TABLES_DIR)
    }

    /// Path of the metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Path of the failure report.
    pub fn failures_path(&self) -> PathBuf {
        self.root.join(FAILURES_FILE)
    }

    /// Write a run outcome and return every path created.
    ///
    /// A complete run removes a failure report left by an earlier run.
    pub fn write(&self, outcome: &RunOutcome) -> Result<Vec<PathBuf>> {
        let mut written = self.write_merged(outcome.merged())?;

        let failures_path = self.failures_path();
        if outcome.failures().is_empty() {
            if failures_path.exists() {
                fs::remove_file(&failures_path)?;
            }
        } else {
            self.write_failures(outcome.failures())?;
            written.push(failures_path);
        }

        Ok(written)
    }

    /// Write the parts of `merged` for its requested kinds.
    ///
    /// Existing image and table directories are replaced, not merged into.
    pub fn write_merged(&self, merged: &MergedResult) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.root)?;
        let mut written = Vec::new();

        for kind in merged.kinds() {
            match kind {
                ArtifactKind::Text => {
                    let path = self.text_path();
                    fs::write(&path, merged.text())?;
                    written.push(path);
                }
                ArtifactKind::Image => {
                    written.extend(write_collection(&self.images_dir(), merged.images())?);
                }
                ArtifactKind::Table => {
                    written.extend(write_collection(&self.tables_dir(), merged.tables())?);
                }
                ArtifactKind::Metadata => {
                    let entries: Vec<MetadataEntry<'_>> = merged
                        .metadata()
                        .iter()
                        .map(|record| MetadataEntry {
                            start: record.range.start(),
                            end: record.range.end(),
                            content: &record.content,
                        })
                        .collect();
                    let path = self.metadata_path();
                    fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
                    written.push(path);
                }
            }
        }

        log::debug!("wrote {} paths under {}", written.len(), self.root.display());
        Ok(written)
    }

    fn write_failures(&self, failures: &[BatchFailure]) -> Result<()> {
        let entries: Vec<FailureEntry> = failures
            .iter()
            .map(|failure| FailureEntry {
                start: failure.range.start(),
                end: failure.range.end(),
                reason: failure.cause.to_string(),
            })
            .collect();
        fs::write(self.failures_path(), serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

fn write_collection(dir: &Path, files: &FileCollection) -> Result<Vec<PathBuf>> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let mut written = vec![dir.to_path_buf()];
    for file in files {
        let Some(name) = sanitize_name(&file.name) else {
            log::warn!("Skipping file with unusable name: {}", file.name);
            continue;
        };
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.data)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use crate::model::{all_kinds, BatchResult, KindSet, PageRange, PartialResult};
    use tempfile::TempDir;

    fn range(start: u32, end: u32) -> PageRange {
        PageRange::new(start, end).unwrap()
    }

    fn sample_merged(kinds: KindSet) -> MergedResult {
        let mut merged = MergedResult::new(kinds);
        merged
            .merge(
                range(1, 100),
                BatchResult::new()
                    .with_text("first\n")
                    .with_file(ArtifactKind::Image, "fig1.png", vec![1])
                    .with_file(ArtifactKind::Table, "t1.csv", b"a,b".to_vec())
                    .with_metadata("{\"pages\":100}"),
            )
            .unwrap();
        merged
            .merge(
                range(101, 150),
                BatchResult::new()
                    .with_text("second\n")
                    .with_file(ArtifactKind::Image, "fig1.png", vec![2]),
            )
            .unwrap();
        merged
    }

    #[test]
    fn test_beside_source() {
        let layout = OutputLayout::beside(Path::new("scans/report.pdf"));
        assert_eq!(layout.root(), Path::new("scans/report"));
        assert_eq!(layout.text_path(), Path::new("scans/report/text.txt"));
    }

    #[test]
    fn test_write_complete_run() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));

        let outcome = RunOutcome::Complete(sample_merged(all_kinds()));
        let written = layout.write(&outcome).unwrap();

        assert_eq!(fs::read_to_string(layout.text_path()).unwrap(), "first\nsecond\n");
        assert_eq!(fs::read(layout.images_dir().join("p0001_fig1.png")).unwrap(), vec![1]);
        assert_eq!(fs::read(layout.images_dir().join("p0101_fig1.png")).unwrap(), vec![2]);
        assert_eq!(fs::read(layout.tables_dir().join("p0001_t1.csv")).unwrap(), b"a,b");

        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(layout.metadata_path()).unwrap()).unwrap();
        assert_eq!(metadata[0]["start"], 1);
        assert_eq!(metadata[0]["end"], 100);
        assert_eq!(metadata[0]["content"], "{\"pages\":100}");

        assert!(written.contains(&layout.text_path()));
        assert!(!layout.failures_path().exists());
    }

    #[test]
    fn test_only_requested_kinds_written() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path());
        let kinds: KindSet = [ArtifactKind::Text].into_iter().collect();

        layout.write_merged(&sample_merged(kinds)).unwrap();

        assert!(layout.text_path().exists());
        assert!(!layout.images_dir().exists());
        assert!(!layout.tables_dir().exists());
        assert!(!layout.metadata_path().exists());
    }

    #[test]
    fn test_existing_directories_replaced() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path());
        fs::create_dir_all(layout.images_dir()).unwrap();
        fs::write(layout.images_dir().join("stale.png"), b"old").unwrap();

        layout.write_merged(&sample_merged(all_kinds())).unwrap();

        assert!(!layout.images_dir().join("stale.png").exists());
        assert!(layout.images_dir().join("p0001_fig1.png").exists());
    }

    #[test]
    fn test_partial_run_writes_failures() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path());

        let outcome = RunOutcome::Partial(PartialResult {
            merged: sample_merged(all_kinds()),
            failures: vec![BatchFailure {
                range: range(151, 200),
                cause: BatchError::WorkerLost,
            }],
        });
        let written = layout.write(&outcome).unwrap();
        assert!(written.contains(&layout.failures_path()));

        let failures: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(layout.failures_path()).unwrap()).unwrap();
        assert_eq!(failures[0]["start"], 151);
        assert_eq!(failures[0]["end"], 200);
        assert_eq!(failures[0]["reason"], "extraction worker exited without a result");

        // A later complete run clears the report.
        layout
            .write(&RunOutcome::Complete(sample_merged(all_kinds())))
            .unwrap();
        assert!(!layout.failures_path().exists());
    }
}
