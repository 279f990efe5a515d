use std::fs;
use std::path::Path;

use ldb_datasets::DatasetRepository;
use ldb_query::{FilterContext, SimilarityScorer};
use ldb_storage::{AdapterSet, StorageRegistry};
use ldb_store::{FileObjectStore, InstanceLayout, ObjectStore, StoreError};
use ldb_workspace::ConflictPolicy;
use tracing::{debug, info};

use crate::config::{current_user, InstanceConfig, InstanceSettings};
use crate::error::{LdbError, LdbResult};

/// An opened LDB instance: object store, dataset repository and storage
/// registry rooted at one directory.
///
/// Operations live in `impl Instance` blocks across this crate, grouped by
/// concern (storage, indexing, staging, commit, instantiate).
pub struct Instance {
    config: InstanceConfig,
    settings: InstanceSettings,
    layout: InstanceLayout,
    store: FileObjectStore,
    datasets: DatasetRepository,
    registry: StorageRegistry,
    scorer: Option<Box<dyn SimilarityScorer>>,
    user: String,
}

impl Instance {
    /// Create a new instance at `config.ldb_dir` with default settings.
    pub fn init(config: &InstanceConfig, force: bool) -> LdbResult<Self> {
        Self::init_with(config, InstanceSettings::default(), AdapterSet::new(), force)
    }

    /// Create a new instance.
    ///
    /// The directory must be missing or empty. With `force`, an existing
    /// instance is wiped and recreated; other non-empty directories are never
    /// touched.
    pub fn init_with(
        config: &InstanceConfig,
        settings: InstanceSettings,
        adapters: AdapterSet,
        force: bool,
    ) -> LdbResult<Self> {
        let dir = &config.ldb_dir;
        if !is_empty_dir(dir)? {
            if !(force && InstanceLayout::new(dir).is_instance()) {
                return Err(LdbError::DirectoryNotEmpty(dir.clone()));
            }
            info!(path = %dir.display(), "removing existing instance");
            fs::remove_dir_all(dir)?;
        }
        let layout = InstanceLayout::create(dir)?;
        settings.save(&layout.config_file())?;
        info!(path = %dir.display(), "initialized LDB instance");
        Self::load(config.clone(), layout, settings, adapters)
    }

    /// Open the instance named by `config`.
    pub fn open(config: &InstanceConfig) -> LdbResult<Self> {
        Self::open_with(config, AdapterSet::new())
    }

    /// Open with a custom set of storage adapters.
    pub fn open_with(config: &InstanceConfig, adapters: AdapterSet) -> LdbResult<Self> {
        let layout = InstanceLayout::open(&config.ldb_dir).map_err(|e| match e {
            StoreError::NotAnInstance(path) => LdbError::Configuration(format!(
                "no LDB instance at {} (from {}); run `ldb init` first",
                path.display(),
                config.source
            )),
            other => other.into(),
        })?;
        let settings = InstanceSettings::load(&layout.config_file())?;
        Self::load(config.clone(), layout, settings, adapters)
    }

    /// Open the instance, creating the quickstart instance when `config` is
    /// the default location and nothing is there yet.
    ///
    /// Quickstart instances run in relaxed mode: files outside registered
    /// storage are indexed in place. Only staging creates one; every other
    /// command goes through [`Instance::open`].
    pub fn open_or_quickstart(config: &InstanceConfig) -> LdbResult<Self> {
        if config.is_default() && !InstanceLayout::new(&config.ldb_dir).is_instance() {
            info!(path = %config.ldb_dir.display(), "creating quickstart instance");
            return Self::init_with(config, InstanceSettings::relaxed(), AdapterSet::new(), false);
        }
        Self::open(config)
    }

    fn load(
        config: InstanceConfig,
        layout: InstanceLayout,
        settings: InstanceSettings,
        adapters: AdapterSet,
    ) -> LdbResult<Self> {
        let timeout = settings.lock_timeout();
        let registry = StorageRegistry::load(layout.storage_file(), adapters)?;
        debug!(
            path = %layout.root().display(),
            locations = registry.locations().len(),
            relaxed = settings.core.read_any_location,
            "opened instance"
        );
        Ok(Self {
            store: FileObjectStore::new(layout.clone()).with_lock_timeout(timeout),
            datasets: DatasetRepository::new(layout.clone()).with_lock_timeout(timeout),
            registry,
            config,
            settings,
            layout,
            scorer: None,
            user: current_user(),
        })
    }

    /// Plug in the scorer used by the `similarity` filter.
    pub fn with_scorer(mut self, scorer: Box<dyn SimilarityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Override the name recorded in commits and index metadata.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    // ---- Accessors ----

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn settings(&self) -> &InstanceSettings {
        &self.settings
    }

    pub fn layout(&self) -> &InstanceLayout {
        &self.layout
    }

    pub fn store(&self) -> &dyn ObjectStore {
        &self.store
    }

    pub fn datasets(&self) -> &DatasetRepository {
        &self.datasets
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut StorageRegistry {
        &mut self.registry
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Whether files outside registered storage may be read in place.
    pub fn is_relaxed(&self) -> bool {
        self.settings.core.read_any_location
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.settings.add.annotation_conflict
    }

    pub(crate) fn filter_context(&self) -> FilterContext<'_> {
        let ctx = FilterContext::new(&self.store);
        match &self.scorer {
            Some(scorer) => ctx.with_scorer(scorer.as_ref()),
            None => ctx,
        }
    }
}

fn is_empty_dir(dir: &Path) -> LdbResult<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}
