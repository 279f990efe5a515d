use std::fmt;
use std::str::FromStr;

use ldb_storage::StorageAdapter;
use ldb_types::StorageUri;
use serde_json::Value;

use crate::error::{IndexError, IndexResult};
use crate::formats::{AnnotationOnlyFormat, CocoFormat, FolderLabelsFormat, PairsFormat};

// ---------------------------------------------------------------------------
// IndexFormat
// ---------------------------------------------------------------------------

/// Layout of data objects and annotations in indexed storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// `annotation-only` when only JSON files are present, else
    /// `bare-pairs`.
    #[default]
    Auto,
    /// `x.ext` paired with `x.json`; objects without annotation are skipped.
    StrictPairs,
    /// Like `StrictPairs` but the annotation is optional.
    BarePairs,
    /// JSON files naming an already indexed object by hash.
    AnnotationOnly,
    /// Label inferred from the directory holding each file.
    FolderLabels,
    /// A single COCO JSON file describing images next to it.
    Coco,
}

impl IndexFormat {
    /// Canonical name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::StrictPairs => "strict-pairs",
            Self::BarePairs => "bare-pairs",
            Self::AnnotationOnly => "annotation-only",
            Self::FolderLabels => "folder-labels",
            Self::Coco => "coco",
        }
    }

    /// Every accepted name, aliases included.
    pub const NAMES: &'static [&'static str] = &[
        "auto",
        "auto-detect",
        "strict",
        "strict-pairs",
        "bare",
        "bare-pairs",
        "annot",
        "annotation-only",
        "infer",
        "folder-labels",
        "tensorflow-inferred",
        "imagenet",
        "coco",
    ];

    /// Pick a concrete format for `Auto`.
    pub fn detect(self, data: &[StorageUri], annotations: &[StorageUri]) -> Self {
        match self {
            Self::Auto if data.is_empty() && !annotations.is_empty() => Self::AnnotationOnly,
            Self::Auto => Self::BarePairs,
            other => other,
        }
    }

    /// Strategy implementing a concrete format.
    ///
    /// `Auto` must be resolved with [`IndexFormat::detect`] first.
    pub fn strategy(self) -> Box<dyn FormatStrategy> {
        match self {
            Self::StrictPairs => Box::new(PairsFormat::strict()),
            Self::Auto | Self::BarePairs => Box::new(PairsFormat::bare()),
            Self::AnnotationOnly => Box::new(AnnotationOnlyFormat),
            Self::FolderLabels => Box::new(FolderLabelsFormat),
            Self::Coco => Box::new(CocoFormat),
        }
    }
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexFormat {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" | "auto-detect" => Ok(Self::Auto),
            "strict" | "strict-pairs" => Ok(Self::StrictPairs),
            "bare" | "bare-pairs" => Ok(Self::BarePairs),
            "annot" | "annotation-only" => Ok(Self::AnnotationOnly),
            "infer" | "folder-labels" | "tensorflow-inferred" | "imagenet" => {
                Ok(Self::FolderLabels)
            }
            "coco" => Ok(Self::Coco),
            other => Err(IndexError::UnknownFormat(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Where an item's annotation comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationSource {
    /// A JSON file read at prepare time.
    File(StorageUri),
    /// Content produced by the format itself, with the file it came from.
    Inline { value: Value, origin: StorageUri },
}

/// One unit of indexing work.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexItem {
    /// A data object with an optional annotation.
    Object {
        data: StorageUri,
        annotation: Option<AnnotationSource>,
    },
    /// An annotation file naming an already indexed object.
    AnnotationFile(StorageUri),
}

/// Files found under the indexing target, split by kind.
pub struct PlanInput<'a> {
    /// The URI passed to the indexer.
    pub root: &'a StorageUri,
    /// Whether `root` is a directory.
    pub root_is_dir: bool,
    /// Non-JSON files, in enumeration order.
    pub data: &'a [StorageUri],
    /// JSON files, in enumeration order.
    pub annotations: &'a [StorageUri],
    /// Adapter for `root`'s scheme.
    pub adapter: &'a dyn StorageAdapter,
}

/// Groups enumerated files into indexing items.
///
/// Implementations must not write anything. Shape errors that make the whole
/// input unusable return [`IndexError::UnsupportedFormat`]; problems with a
/// single file are left for the prepare phase to report.
pub trait FormatStrategy: Send + Sync {
    /// The concrete format implemented.
    fn format(&self) -> IndexFormat;

    /// Build the item list, in enumeration order.
    fn plan(&self, input: &PlanInput<'_>) -> IndexResult<Vec<IndexItem>>;

    /// Shorthand for an [`IndexError::UnsupportedFormat`] of this format.
    fn unsupported(&self, reason: impl Into<String>) -> IndexError
    where
        Self: Sized,
    {
        IndexError::UnsupportedFormat {
            format: self.format(),
            reason: reason.into(),
        }
    }
}
