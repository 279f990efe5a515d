use std::collections::HashSet;

use tracing::debug;

use super::annotation_uri_for;
use crate::error::IndexResult;
use crate::format::{AnnotationSource, FormatStrategy, IndexFormat, IndexItem, PlanInput};

/// `x.ext` / `x.json` pairs.
#[derive(Clone, Copy, Debug)]
pub struct PairsFormat {
    strict: bool,
}

impl PairsFormat {
    /// Objects without an annotation file are skipped.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Objects without an annotation file are indexed bare.
    pub fn bare() -> Self {
        Self { strict: false }
    }
}

impl FormatStrategy for PairsFormat {
    fn format(&self) -> IndexFormat {
        if self.strict {
            IndexFormat::StrictPairs
        } else {
            IndexFormat::BarePairs
        }
    }

    fn plan(&self, input: &PlanInput<'_>) -> IndexResult<Vec<IndexItem>> {
        let annotations: HashSet<_> = input.annotations.iter().collect();
        let mut items = Vec::with_capacity(input.data.len());
        for data in input.data {
            let pair = annotation_uri_for(data);
            let annotation = if annotations.contains(&pair) {
                Some(AnnotationSource::File(pair))
            } else if self.strict {
                debug!(object = %data, "skipping object without annotation");
                continue;
            } else {
                None
            };
            items.push(IndexItem::Object {
                data: data.clone(),
                annotation,
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_storage::LocalAdapter;
    use ldb_types::StorageUri;

    fn uri(p: &str) -> StorageUri {
        StorageUri::parse(p).unwrap()
    }

    fn plan(format: PairsFormat) -> Vec<IndexItem> {
        let root = uri("/d");
        let data = [uri("/d/a.png"), uri("/d/b.png")];
        let annotations = [uri("/d/a.json"), uri("/d/orphan.json")];
        let adapter = LocalAdapter::new();
        let input = PlanInput {
            root: &root,
            root_is_dir: true,
            data: &data,
            annotations: &annotations,
            adapter: &adapter,
        };
        format.plan(&input).unwrap()
    }

    #[test]
    fn strict_skips_unannotated() {
        let items = plan(PairsFormat::strict());
        assert_eq!(
            items,
            vec![IndexItem::Object {
                data: uri("/d/a.png"),
                annotation: Some(AnnotationSource::File(uri("/d/a.json"))),
            }]
        );
    }

    #[test]
    fn bare_keeps_unannotated() {
        let items = plan(PairsFormat::bare());
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1],
            IndexItem::Object {
                data: uri("/d/b.png"),
                annotation: None,
            }
        );
    }
}
