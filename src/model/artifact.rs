//! Artifact kinds and per-batch extraction results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Kind of artifact an extraction can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Plain text, merged into a single body
    Text,
    /// Figures, kept as a named file collection
    Image,
    /// Tables (CSV, XLSX, ...), kept as a named file collection
    Table,
    /// Per-batch metadata records
    Metadata,
}

impl ArtifactKind {
    /// All kinds in canonical order.
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Text,
        ArtifactKind::Image,
        ArtifactKind::Table,
        ArtifactKind::Metadata,
    ];

    /// Whether this kind is delivered as a named file collection.
    pub fn is_file_collection(&self) -> bool {
        matches!(self, ArtifactKind::Image | ArtifactKind::Table)
    }

    /// Lowercase identifier used on the command line and in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Text => "text",
            ArtifactKind::Image => "image",
            ArtifactKind::Table => "table",
            ArtifactKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(ArtifactKind::Text),
            "image" | "images" | "figures" => Ok(ArtifactKind::Image),
            "table" | "tables" => Ok(ArtifactKind::Table),
            "metadata" | "meta" => Ok(ArtifactKind::Metadata),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// Set of requested artifact kinds.
pub type KindSet = BTreeSet<ArtifactKind>;

/// Every artifact kind.
pub fn all_kinds() -> KindSet {
    ArtifactKind::ALL.into_iter().collect()
}

/// Parse a comma-separated kind list (e.g., "text,tables") or "all".
pub fn parse_kinds(s: &str) -> Result<KindSet, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("all") {
        return Ok(all_kinds());
    }

    let mut kinds = KindSet::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        kinds.insert(part.parse()?);
    }

    if kinds.is_empty() {
        return Err("no artifact kinds given".to_string());
    }
    Ok(kinds)
}

/// Payload returned for one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    /// A single text blob
    Text(String),
    /// Named files (name → content)
    Files(BTreeMap<String, Vec<u8>>),
}

/// Artifacts returned by the extraction service for one page range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    artifacts: BTreeMap<ArtifactKind, ArtifactPayload>,
}

impl BatchResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text payload.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.insert(ArtifactKind::Text, ArtifactPayload::Text(text.into()));
        self
    }

    /// Set the metadata payload.
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.insert(ArtifactKind::Metadata, ArtifactPayload::Text(metadata.into()));
        self
    }

    /// Add one named file under `kind`.
    ///
    /// A text payload already stored under `kind` is replaced by a file collection.
    pub fn with_file(mut self, kind: ArtifactKind, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.add_file(kind, name, data);
        self
    }

    /// Add one named file under `kind`.
    pub fn add_file(&mut self, kind: ArtifactKind, name: impl Into<String>, data: Vec<u8>) {
        let entry = self
            .artifacts
            .entry(kind)
            .or_insert_with(|| ArtifactPayload::Files(BTreeMap::new()));
        if matches!(entry, ArtifactPayload::Text(_)) {
            *entry = ArtifactPayload::Files(BTreeMap::new());
        }
        if let ArtifactPayload::Files(files) = entry {
            files.insert(name.into(), data);
        }
    }

    /// Set the payload for `kind`, replacing any previous one.
    pub fn insert(&mut self, kind: ArtifactKind, payload: ArtifactPayload) {
        self.artifacts.insert(kind, payload);
    }

    /// Payload for `kind`, if present.
    pub fn get(&self, kind: ArtifactKind) -> Option<&ArtifactPayload> {
        self.artifacts.get(&kind)
    }

    /// Text payload, if present.
    pub fn text(&self) -> Option<&str> {
        match self.artifacts.get(&ArtifactKind::Text) {
            Some(ArtifactPayload::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Kinds present in this result.
    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.artifacts.keys().copied()
    }

    /// Check if no artifacts were returned.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Consume the result, yielding payloads in kind order.
    pub fn into_artifacts(self) -> impl Iterator<Item = (ArtifactKind, ArtifactPayload)> {
        self.artifacts.into_iter()
    }
}
