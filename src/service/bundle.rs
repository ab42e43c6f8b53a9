//! Mapping of unpacked artifact bundles to batch results.
//!
//! Bundles follow the common structured-extraction layout:
//!
//! ```text
//! structuredData.json   elements[].Text → text, everything else → metadata
//! figures/<name>        image renditions
//! tables/<name>         table renditions (CSV, XLSX, PNG)
//! ```

use serde_json::Value;
use std::collections::BTreeMap;

use super::ServiceError;
use crate::archive::Bundle;
use crate::model::{ArtifactKind, ArtifactPayload, BatchResult, KindSet};

/// Name of the structured content document inside a bundle.
pub const STRUCTURED_DATA: &str = "structuredData.json";
/// Directory holding figure renditions.
pub const FIGURES_DIR: &str = "figures/";
/// Directory holding table renditions.
pub const TABLES_DIR: &str = "tables/";

/// Build a [`BatchResult`] for `kinds` from an unpacked bundle.
///
/// Kinds whose part is missing from the bundle come back empty rather than
/// failing; an unparseable structured document is reported as malformed.
pub fn batch_result_from_bundle(
    mut bundle: Bundle,
    kinds: &KindSet,
) -> Result<BatchResult, ServiceError> {
    let mut result = BatchResult::new();

    let structured = match bundle.remove(STRUCTURED_DATA) {
        Some(data) if kinds.contains(&ArtifactKind::Text) || kinds.contains(&ArtifactKind::Metadata) => {
            Some(serde_json::from_slice::<Value>(&data).map_err(|e| {
                ServiceError::malformed(format!("{} is not valid JSON: {}", STRUCTURED_DATA, e))
            })?)
        }
        _ => None,
    };

    if kinds.contains(&ArtifactKind::Text) {
        let text = structured.as_ref().map(text_from_structured).unwrap_or_default();
        result = result.with_text(text);
    }

    if kinds.contains(&ArtifactKind::Metadata) {
        if let Some(value) = structured {
            result = result.with_metadata(metadata_from_structured(value));
        }
    }

    for (kind, dir) in [
        (ArtifactKind::Image, FIGURES_DIR),
        (ArtifactKind::Table, TABLES_DIR),
    ] {
        if kinds.contains(&kind) {
            result.insert(kind, ArtifactPayload::Files(take_dir(&mut bundle, dir)));
        }
    }

    if !bundle.is_empty() {
        log::debug!(
            "bundle entries not mapped to any artifact: {:?}",
            bundle.keys().collect::<Vec<_>>()
        );
    }

    Ok(result)
}

/// Plain text of a structured document: every element's `Text`, one per line.
///
/// Non-empty output ends with a newline so that consecutive batches do not
/// run into each other when merged.
pub fn text_from_structured(value: &Value) -> String {
    let mut text = value
        .get("elements")
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(|e| e.get("Text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn metadata_from_structured(mut value: Value) -> String {
    if let Some(object) = value.as_object_mut() {
        object.remove("elements");
    }
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

fn take_dir(bundle: &mut Bundle, dir: &str) -> BTreeMap<String, Vec<u8>> {
    let names: Vec<String> = bundle
        .keys()
        .filter(|name| name.starts_with(dir) && name.len() > dir.len())
        .cloned()
        .collect();

    names
        .into_iter()
        .filter_map(|name| {
            let data = bundle.remove(&name)?;
            Some((name[dir.len()..].to_string(), data))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::all_kinds;
    use serde_json::json;

    fn sample_bundle() -> Bundle {
        let structured = json!({
            "version": {"json_export": "1.0"},
            "extended_metadata": {"page_count": 2},
            "elements": [
                {"Path": "//Document/H1", "Text": "Title"},
                {"Path": "//Document/Figure"},
                {"Path": "//Document/P", "Text": "Body text."}
            ]
        });

        let mut bundle = Bundle::new();
        bundle.insert(
            STRUCTURED_DATA.to_string(),
            serde_json::to_vec(&structured).unwrap(),
        );
        bundle.insert("figures/fileoutpart0.png".to_string(), vec![1]);
        bundle.insert("tables/fileoutpart1.csv".to_string(), b"a,b".to_vec());
        bundle.insert("tables/fileoutpart1.png".to_string(), vec![2]);
        bundle
    }

    #[test]
    fn test_text_from_elements() {
        let result = batch_result_from_bundle(sample_bundle(), &all_kinds()).unwrap();
        assert_eq!(result.text(), Some("Title\nBody text.\n"));
    }

    #[test]
    fn test_files_mapped_by_directory() {
        let result = batch_result_from_bundle(sample_bundle(), &all_kinds()).unwrap();

        match result.get(ArtifactKind::Image) {
            Some(ArtifactPayload::Files(files)) => {
                assert_eq!(files.keys().collect::<Vec<_>>(), vec!["fileoutpart0.png"]);
            }
            other => panic!("expected image files, got {:?}", other),
        }
        match result.get(ArtifactKind::Table) {
            Some(ArtifactPayload::Files(files)) => assert_eq!(files.len(), 2),
            other => panic!("expected table files, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata_excludes_elements() {
        let result = batch_result_from_bundle(sample_bundle(), &all_kinds()).unwrap();
        let Some(ArtifactPayload::Text(metadata)) = result.get(ArtifactKind::Metadata) else {
            panic!("expected metadata");
        };
        let value: Value = serde_json::from_str(metadata).unwrap();
        assert!(value.get("elements").is_none());
        assert_eq!(value["extended_metadata"]["page_count"], 2);
    }

    #[test]
    fn test_only_requested_kinds() {
        let kinds: KindSet = [ArtifactKind::Table].into_iter().collect();
        let result = batch_result_from_bundle(sample_bundle(), &kinds).unwrap();
        assert_eq!(result.kinds().collect::<Vec<_>>(), vec![ArtifactKind::Table]);
    }

    #[test]
    fn test_missing_parts_are_empty() {
        let result = batch_result_from_bundle(Bundle::new(), &all_kinds()).unwrap();
        assert_eq!(result.text(), Some(""));
        assert!(result.get(ArtifactKind::Metadata).is_none());
        assert_eq!(
            result.get(ArtifactKind::Image),
            Some(&ArtifactPayload::Files(BTreeMap::new()))
        );
    }

    #[test]
    fn test_invalid_structured_data() {
        let mut bundle = Bundle::new();
        bundle.insert(STRUCTURED_DATA.to_string(), b"{not json".to_vec());
        let err = batch_result_from_bundle(bundle, &all_kinds()).unwrap_err();
        assert_eq!(err.kind, crate::service::ServiceErrorKind::MalformedInput);
    }
}
