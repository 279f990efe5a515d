//! Dataset name validation.
//!
//! Valid dataset names:
//! - Must be non-empty
//! - May only contain ASCII letters, digits, `_` and `-`
//! - Must not be the reserved name `root`

use crate::error::TypeError;
use crate::identifier::ROOT_DATASET;

/// Validate a dataset name, returning `Ok(())` if valid.
///
/// Names end up as file names under `datasets/` and in `ds:` references, so
/// anything outside `[A-Za-z0-9_-]` is rejected. In particular `.` is not
/// allowed, which keeps the `.vN` version suffix unambiguous.
///
/// # Examples
///
/// ```
/// use ldb_types::names::validate_dataset_name;
///
/// assert!(validate_dataset_name("numerals").is_ok());
/// assert!(validate_dataset_name("cats_v2-final").is_ok());
/// assert!(validate_dataset_name("").is_err());
/// assert!(validate_dataset_name("a.b").is_err());
/// assert!(validate_dataset_name("root").is_err());
/// ```
pub fn validate_dataset_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::InvalidDatasetName {
            name: name.to_string(),
            reason: "dataset name must not be empty".into(),
        });
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(TypeError::InvalidDatasetName {
            name: name.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }

    if name == ROOT_DATASET {
        return Err(TypeError::InvalidDatasetName {
            name: name.to_string(),
            reason: "'root' is reserved for the set of all indexed objects".into(),
        });
    }

    Ok(())
}
