use serde_json::{json, Value};

use super::relative_components;
use crate::error::IndexResult;
use crate::format::{AnnotationSource, FormatStrategy, IndexFormat, IndexItem, PlanInput};

/// Labels inferred from directory names, as in ImageNet-style trees.
///
/// A file at `<root>/cat/1.png` is annotated `{"label": "cat"}`. Deeper
/// directories nest: `<root>/animal/cat/1.png` gives
/// `{"label": {"animal": "cat"}}`. Files directly in `<root>` get an empty
/// label.
#[derive(Clone, Copy, Debug)]
pub struct FolderLabelsFormat;

/// Label for a file given its path components below the root.
pub(crate) fn infer_label(components: &[String]) -> Value {
    let dirs = match components.split_last() {
        Some((_, dirs)) => dirs,
        None => &[],
    };
    let mut label = Value::String(dirs.last().cloned().unwrap_or_default());
    if dirs.len() > 1 {
        for parent in dirs[..dirs.len() - 1].iter().rev() {
            label = json!({ parent.as_str(): label });
        }
    }
    json!({ "label": label })
}

impl FormatStrategy for FolderLabelsFormat {
    fn format(&self) -> IndexFormat {
        IndexFormat::FolderLabels
    }

    fn plan(&self, input: &PlanInput<'_>) -> IndexResult<Vec<IndexItem>> {
        if !input.root_is_dir {
            return Err(self.unsupported(format!("{} is not a directory", input.root)));
        }
        if let Some(first) = input.annotations.first() {
            return Err(self.unsupported(format!(
                "no annotation files may be present, found {} JSON files (first: {first})",
                input.annotations.len()
            )));
        }
        let mut items = Vec::with_capacity(input.data.len());
        for data in input.data {
            let components = relative_components(input.root, data).unwrap_or_default();
            items.push(IndexItem::Object {
                data: data.clone(),
                annotation: Some(AnnotationSource::Inline {
                    value: infer_label(&components),
                    origin: data.clone(),
                }),
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use ldb_storage::LocalAdapter;
    use ldb_types::StorageUri;

    fn parts(p: &str) -> Vec<String> {
        p.split('/').map(str::to_string).collect()
    }

    #[test]
    fn label_from_single_directory() {
        assert_eq!(infer_label(&parts("cat/1.png")), json!({"label": "cat"}));
    }

    #[test]
    fn nested_directories_nest_labels() {
        assert_eq!(
            infer_label(&parts("animal/feline/cat/1.png")),
            json!({"label": {"animal": {"feline": "cat"}}})
        );
    }

    #[test]
    fn top_level_file_has_empty_label() {
        assert_eq!(infer_label(&parts("1.png")), json!({"label": ""}));
    }

    #[test]
    fn json_files_are_rejected() {
        let root = StorageUri::parse("/d").unwrap();
        let data = [StorageUri::parse("/d/cat/1.png").unwrap()];
        let annotations = [StorageUri::parse("/d/cat/1.json").unwrap()];
        let adapter = LocalAdapter::new();
        let input = PlanInput {
            root: &root,
            root_is_dir: true,
            data: &data,
            annotations: &annotations,
            adapter: &adapter,
        };
        let err = FolderLabelsFormat.plan(&input).unwrap_err();
        assert!(matches!(
            err,
            IndexError::UnsupportedFormat {
                format: IndexFormat::FolderLabels,
                ..
            }
        ));
    }
}
