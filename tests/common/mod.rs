//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

#[path = "../../src/testutil.rs"]
mod testutil;

pub use testutil::{page_contents, sample_pdf, tree_pdf};

/// Write a sample PDF named `name` into `dir` and return its path.
pub fn write_pdf(dir: &Path, name: &str, page_count: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sample_pdf(page_count)).unwrap();
    path
}
