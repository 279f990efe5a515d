//! Format strategies.

mod annotation_only;
mod coco;
mod folder_labels;
mod pairs;

pub use annotation_only::AnnotationOnlyFormat;
pub use coco::CocoFormat;
pub use folder_labels::FolderLabelsFormat;
pub use pairs::PairsFormat;

use ldb_types::StorageUri;

/// Separator index of the last path component.
fn name_start(path: &str) -> usize {
    path.rfind(['/', std::path::MAIN_SEPARATOR])
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// The annotation file paired with a data object: `x.ext` → `x.json`.
pub fn annotation_uri_for(data: &StorageUri) -> StorageUri {
    let start = name_start(&data.path);
    let name = &data.path[start..];
    let stem_len = match name.rfind('.') {
        Some(dot) if dot > 0 => dot,
        _ => name.len(),
    };
    StorageUri {
        protocol: data.protocol.clone(),
        path: format!("{}.json", &data.path[..start + stem_len]),
    }
}

/// The directory holding `uri`.
pub fn parent_uri(uri: &StorageUri) -> StorageUri {
    let start = name_start(&uri.path);
    let mut path = uri.path[..start].to_string();
    while path.len() > 1 && (path.ends_with('/') || path.ends_with(std::path::MAIN_SEPARATOR)) {
        path.pop();
    }
    StorageUri {
        protocol: uri.protocol.clone(),
        path,
    }
}

/// `uri` relative to `root` as `/`-separated components, or `None` if it does
/// not lie beneath `root`.
pub fn relative_components(root: &StorageUri, uri: &StorageUri) -> Option<Vec<String>> {
    if !uri.is_within(root) {
        return None;
    }
    let rest = uri.path.get(root.path.len()..)?;
    Some(
        rest.split(['/', std::path::MAIN_SEPARATOR])
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Whether `uri` names a JSON file.
pub fn is_json(uri: &StorageUri) -> bool {
    uri.extension().as_deref() == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(p: &str) -> StorageUri {
        StorageUri::parse(p).unwrap()
    }

    #[test]
    fn annotation_path_replaces_extension() {
        assert_eq!(annotation_uri_for(&uri("/d/a.png")).path, "/d/a.json");
        assert_eq!(annotation_uri_for(&uri("/d/a.b.png")).path, "/d/a.b.json");
        assert_eq!(annotation_uri_for(&uri("/d/noext")).path, "/d/noext.json");
        assert_eq!(annotation_uri_for(&uri("/d.x/noext")).path, "/d.x/noext.json");
        let remote = annotation_uri_for(&uri("gs://b/k/a.jpg"));
        assert_eq!(remote.protocol, "gs");
        assert_eq!(remote.path, "b/k/a.json");
    }

    #[test]
    fn relative_components_below_root() {
        let root = uri("/data/train");
        assert_eq!(
            relative_components(&root, &uri("/data/train/cat/x/1.png")).unwrap(),
            vec!["cat", "x", "1.png"]
        );
        assert!(relative_components(&root, &uri("/data/training/1.png")).is_none());
    }

    #[test]
    fn parent_of_file() {
        assert_eq!(parent_uri(&uri("/data/coco.json")).path, "/data");
        assert_eq!(parent_uri(&uri("gs://b/c/coco.json")).path, "b/c");
    }
}
