use crate::error::IndexResult;
use crate::format::{FormatStrategy, IndexFormat, IndexItem, PlanInput};

/// JSON files of the form
/// `{"ldb_meta": {"data_object_id": "<hash>"}, "annotation": …}`.
///
/// Each file attaches its `annotation` to an object that must already be
/// indexed. Data files next to them are ignored.
#[derive(Clone, Copy, Debug)]
pub struct AnnotationOnlyFormat;

impl FormatStrategy for AnnotationOnlyFormat {
    fn format(&self) -> IndexFormat {
        IndexFormat::AnnotationOnly
    }

    fn plan(&self, input: &PlanInput<'_>) -> IndexResult<Vec<IndexItem>> {
        Ok(input
            .annotations
            .iter()
            .cloned()
            .map(IndexItem::AnnotationFile)
            .collect())
    }
}
