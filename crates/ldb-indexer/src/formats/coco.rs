use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use super::parent_uri;
use crate::error::IndexResult;
use crate::format::{AnnotationSource, FormatStrategy, IndexFormat, IndexItem, PlanInput};

/// One COCO JSON file plus the images it lists.
///
/// Every entry of `images` becomes a data object at `<dir>/<file_name>`,
/// where `<dir>` holds the COCO file. Its annotation is
/// `{"image": <entry>, "annotations": [...]}` with the entries of
/// `annotations` whose `image_id` matches. When `categories` is present each
/// annotation also gets a `category` field with the category name.
#[derive(Clone, Copy, Debug)]
pub struct CocoFormat;

impl CocoFormat {
    fn items(&self, doc: &Value, origin: &ldb_types::StorageUri) -> IndexResult<Vec<IndexItem>> {
        let images = doc
            .get("images")
            .and_then(Value::as_array)
            .ok_or_else(|| self.unsupported(format!("{origin}: missing \"images\" array")))?;

        let categories: BTreeMap<String, Value> = doc
            .get("categories")
            .and_then(Value::as_array)
            .map(|cats| {
                cats.iter()
                    .filter_map(|c| Some((c.get("id")?.to_string(), c.get("name")?.clone())))
                    .collect()
            })
            .unwrap_or_default();

        let mut by_image: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        if let Some(annotations) = doc.get("annotations").and_then(Value::as_array) {
            for ann in annotations {
                let image_id = ann.get("image_id").ok_or_else(|| {
                    self.unsupported(format!("{origin}: annotation without \"image_id\""))
                })?;
                let mut ann = ann.clone();
                let category = ann
                    .get("category_id")
                    .and_then(|id| categories.get(&id.to_string()))
                    .cloned();
                if let (Some(name), Some(obj)) = (category, ann.as_object_mut()) {
                    obj.insert("category".into(), name);
                }
                by_image.entry(image_id.to_string()).or_default().push(ann);
            }
        }

        let dir = parent_uri(origin);
        let mut items = Vec::with_capacity(images.len());
        for image in images {
            let (Some(id), Some(file_name)) = (
                image.get("id"),
                image.get("file_name").and_then(Value::as_str),
            ) else {
                return Err(self.unsupported(format!(
                    "{origin}: image entries need \"id\" and \"file_name\""
                )));
            };
            let annotations = by_image.remove(&id.to_string()).unwrap_or_default();
            items.push(IndexItem::Object {
                data: dir.join(file_name),
                annotation: Some(AnnotationSource::Inline {
                    value: json!({ "image": image, "annotations": annotations }),
                    origin: origin.clone(),
                }),
            });
        }
        if !by_image.is_empty() {
            debug!(
                images = by_image.len(),
                "COCO annotations reference unknown image ids"
            );
        }
        Ok(items)
    }
}

impl FormatStrategy for CocoFormat {
    fn format(&self) -> IndexFormat {
        IndexFormat::Coco
    }

    fn plan(&self, input: &PlanInput<'_>) -> IndexResult<Vec<IndexItem>> {
        let origin = match input.annotations {
            [one] => one,
            [] => return Err(self.unsupported("no COCO JSON file found")),
            many => {
                return Err(self.unsupported(format!(
                    "expected one COCO JSON file, found {}",
                    many.len()
                )))
            }
        };
        let bytes = input.adapter.read(origin)?;
        let doc: Value = serde_json::from_slice(&bytes)
            .map_err(|e| self.unsupported(format!("{origin}: {e}")))?;
        self.items(&doc, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use ldb_types::StorageUri;

    fn doc() -> Value {
        json!({
            "images": [
                {"id": 1, "file_name": "a.jpg"},
                {"id": 2, "file_name": "sub/b.jpg"}
            ],
            "annotations": [
                {"id": 10, "image_id": 1, "category_id": 7, "bbox": [0, 0, 1, 1]},
                {"id": 11, "image_id": 1, "category_id": 8, "bbox": [1, 1, 2, 2]}
            ],
            "categories": [{"id": 7, "name": "cat"}, {"id": 8, "name": "dog"}]
        })
    }

    #[test]
    fn groups_annotations_per_image() {
        let origin = StorageUri::parse("/d/coco.json").unwrap();
        let items = CocoFormat.items(&doc(), &origin).unwrap();
        assert_eq!(items.len(), 2);
        let IndexItem::Object { data, annotation } = &items[0] else {
            panic!("expected object item");
        };
        assert_eq!(data.path, StorageUri::parse("/d/a.jpg").unwrap().path);
        let Some(AnnotationSource::Inline { value, .. }) = annotation else {
            panic!("expected inline annotation");
        };
        assert_eq!(value["annotations"].as_array().unwrap().len(), 2);
        assert_eq!(value["annotations"][0]["category"], "cat");
        assert_eq!(value["annotations"][1]["category"], "dog");
        assert_eq!(value["image"]["file_name"], "a.jpg");

        let IndexItem::Object { annotation, .. } = &items[1] else {
            panic!("expected object item");
        };
        let Some(AnnotationSource::Inline { value, .. }) = annotation else {
            panic!("expected inline annotation");
        };
        assert_eq!(value["annotations"], json!([]));
    }

    #[test]
    fn missing_images_is_unsupported() {
        let origin = StorageUri::parse("/d/coco.json").unwrap();
        let err = CocoFormat.items(&json!({"annotations": []}), &origin).unwrap_err();
        assert!(matches!(
            err,
            IndexError::UnsupportedFormat {
                format: IndexFormat::Coco,
                ..
            }
        ));
    }
}
