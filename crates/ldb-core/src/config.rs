//! Instance location resolution and TOML configuration files.
//!
//! Two files are read:
//!
//! ```toml
//! # ~/.ldb/config (global)
//! [core]
//! ldb_dir = "~/datasets/ldb"
//!
//! # <instance>/config
//! [core]
//! read_any_location = false
//! lock_timeout_ms = 10000
//!
//! [add]
//! annotation_conflict = "newest"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ldb_store::fs::write_atomic;
use ldb_workspace::ConflictPolicy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LdbError, LdbResult};

/// Environment variable naming the instance directory.
pub const LDB_DIR_ENV: &str = "LDB_DIR";
/// Directory under the home directory holding the global config.
pub const GLOBAL_DIR: &str = ".ldb";
/// Name of the quickstart instance under [`GLOBAL_DIR`].
pub const DEFAULT_INSTANCE: &str = "private_instance";
const GLOBAL_CONFIG: &str = "config";

// ---------------------------------------------------------------------------
// Global config
// ---------------------------------------------------------------------------

/// `~/.ldb/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub core: GlobalCore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GlobalCore {
    /// Instance directory; a leading `~` expands to the home directory.
    #[serde(default)]
    pub ldb_dir: Option<String>,
}

impl GlobalConfig {
    /// Load the global config, or the default when the file is missing.
    pub fn load(path: &Path) -> LdbResult<Self> {
        load_toml(path)
    }

    /// `~/.ldb/config`.
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(GLOBAL_DIR).join(GLOBAL_CONFIG)
    }
}

// ---------------------------------------------------------------------------
// Instance settings
// ---------------------------------------------------------------------------

/// `<instance>/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceSettings {
    #[serde(default)]
    pub core: CoreSettings,
    #[serde(default)]
    pub add: AddSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoreSettings {
    /// Relaxed mode: index and add files outside registered storage in place.
    #[serde(default)]
    pub read_any_location: bool,

    /// Upper bound for acquiring any lock file, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            read_any_location: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddSettings {
    /// Which annotation wins when `add` meets an object already staged.
    #[serde(default)]
    pub annotation_conflict: ConflictPolicy,
}

fn default_lock_timeout_ms() -> u64 {
    10_000
}

impl InstanceSettings {
    /// Settings for a quickstart instance.
    pub fn relaxed() -> Self {
        let mut settings = Self::default();
        settings.core.read_any_location = true;
        settings
    }

    pub fn load(path: &Path) -> LdbResult<Self> {
        load_toml(path)
    }

    pub fn save(&self, path: &Path) -> LdbResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| LdbError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.core.lock_timeout_ms)
    }
}

fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> LdbResult<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&text).map_err(|e| LdbError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// InstanceConfig
// ---------------------------------------------------------------------------

/// Where the instance location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceSource {
    /// Passed by the caller.
    Explicit,
    /// The `LDB_DIR` environment variable.
    Env,
    /// `core.ldb_dir` in the global config.
    GlobalConfig,
    /// `~/.ldb/private_instance`.
    Default,
}

impl fmt::Display for InstanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Env => LDB_DIR_ENV,
            Self::GlobalConfig => "global config",
            Self::Default => "default",
        })
    }
}

/// The active instance location, resolved once per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub ldb_dir: PathBuf,
    pub source: InstanceSource,
}

impl InstanceConfig {
    /// An explicitly chosen instance directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            ldb_dir: dir.into(),
            source: InstanceSource::Explicit,
        }
    }

    /// Resolve from the process environment and the user's home directory.
    pub fn resolve(explicit: Option<&Path>) -> LdbResult<Self> {
        let env = std::env::var_os(LDB_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let home = dirs::home_dir();
        let global = match &home {
            Some(h) => GlobalConfig::load(&GlobalConfig::default_path(h))?,
            None => GlobalConfig::default(),
        };
        Self::resolve_with(explicit, env, &global, home.as_deref())
    }

    /// Explicit directory > `LDB_DIR` > `core.ldb_dir` > quickstart default.
    pub fn resolve_with(
        explicit: Option<&Path>,
        env: Option<PathBuf>,
        global: &GlobalConfig,
        home: Option<&Path>,
    ) -> LdbResult<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::at(dir));
        }
        if let Some(dir) = env {
            return Ok(Self {
                ldb_dir: dir,
                source: InstanceSource::Env,
            });
        }
        if let Some(dir) = &global.core.ldb_dir {
            return Ok(Self {
                ldb_dir: expand_home(dir, home)?,
                source: InstanceSource::GlobalConfig,
            });
        }
        let home = home.ok_or_else(|| {
            LdbError::Configuration("cannot locate the home directory for the default instance".into())
        })?;
        Ok(Self {
            ldb_dir: home.join(GLOBAL_DIR).join(DEFAULT_INSTANCE),
            source: InstanceSource::Default,
        })
    }

    /// Whether this is the quickstart location.
    pub fn is_default(&self) -> bool {
        self.source == InstanceSource::Default
    }
}

fn expand_home(dir: &str, home: Option<&Path>) -> LdbResult<PathBuf> {
    let rest = match dir.strip_prefix('~') {
        None => return Ok(PathBuf::from(dir)),
        Some(rest) => rest.trim_start_matches(['/', '\\']),
    };
    let home = home.ok_or_else(|| {
        LdbError::Configuration(format!("cannot expand {dir}: no home directory"))
    })?;
    Ok(home.join(rest))
}

/// Name recorded as `created_by` / `last_indexed_by`.
pub fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
