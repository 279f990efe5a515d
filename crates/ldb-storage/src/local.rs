use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use ldb_types::StorageUri;
use tracing::debug;
use walkdir::WalkDir;

use crate::adapter::{CapabilitySet, FileStat, StorageAdapter, DEFAULT_TIMEOUT};
use crate::error::{StorageError, StorageResult};

/// Adapter for `file` URIs.
#[derive(Clone, Debug)]
pub struct LocalAdapter {
    timeout: Duration,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LocalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn local_path(uri: &StorageUri) -> StorageResult<PathBuf> {
    uri.as_local_path()
        .ok_or_else(|| StorageError::UnsupportedScheme(uri.protocol.clone()))
}

fn not_found(uri: &StorageUri, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(uri.clone())
    } else {
        StorageError::Io(e)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn mtime_secs(meta: &fs::Metadata) -> Option<f64> {
    meta.modified()
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

/// Whether a file can be created in `dir`.
fn dir_writable(dir: &Path) -> bool {
    tempfile::NamedTempFile::new_in(dir).is_ok()
}

impl StorageAdapter for LocalAdapter {
    fn protocol(&self) -> &str {
        ldb_types::FILE_PROTOCOL
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn list(&self, uri: &StorageUri) -> StorageResult<Vec<StorageUri>> {
        let root = local_path(uri)?;
        let meta = fs::metadata(&root).map_err(|e| not_found(uri, e))?;
        if meta.is_file() {
            return Ok(vec![uri.clone()]);
        }
        let mut out = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for entry in walker {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => StorageError::Io(io),
                None => StorageError::Io(std::io::Error::other("filesystem loop")),
            })?;
            if entry.file_type().is_file() {
                out.push(StorageUri::local(entry.path())?);
            }
        }
        debug!(root = %root.display(), files = out.len(), "listed local storage");
        Ok(out)
    }

    fn stat(&self, uri: &StorageUri) -> StorageResult<FileStat> {
        let path = local_path(uri)?;
        let meta = fs::metadata(&path).map_err(|e| not_found(uri, e))?;
        Ok(FileStat {
            uri: uri.clone(),
            size: meta.len(),
            mtime: mtime_secs(&meta),
            is_dir: meta.is_dir(),
        })
    }

    fn read(&self, uri: &StorageUri) -> StorageResult<Vec<u8>> {
        let path = local_path(uri)?;
        fs::read(&path).map_err(|e| not_found(uri, e))
    }

    fn open(&self, uri: &StorageUri) -> StorageResult<Box<dyn Read + Send>> {
        let path = local_path(uri)?;
        let file = File::open(&path).map_err(|e| not_found(uri, e))?;
        Ok(Box::new(file))
    }

    fn write(&self, uri: &StorageUri, data: &[u8]) -> StorageResult<()> {
        let path = local_path(uri)?;
        ldb_store::fs::write_atomic(&path, data)?;
        Ok(())
    }

    fn probe(&self, uri: &StorageUri) -> StorageResult<CapabilitySet> {
        let path = local_path(uri)?;
        let meta = fs::metadata(&path).map_err(|e| not_found(uri, e))?;
        let caps = if meta.is_dir() {
            let listable = fs::read_dir(&path).is_ok();
            CapabilitySet {
                list: listable,
                stat: true,
                read: listable,
                write: dir_writable(&path),
            }
        } else {
            CapabilitySet {
                list: true,
                stat: true,
                read: File::open(&path).is_ok(),
                write: fs::OpenOptions::new().append(true).open(&path).is_ok(),
            }
        };
        Ok(caps)
    }

    fn copy_to_local(&self, uri: &StorageUri, dest: &Path) -> StorageResult<()> {
        let src = local_path(uri)?;
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        fs::copy(&src, tmp.path()).map_err(|e| not_found(uri, e))?;
        tmp.persist(dest).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(p: &Path) -> StorageUri {
        StorageUri::local(p).unwrap()
    }

    #[test]
    fn list_is_recursive_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join(".hidden_dir")).unwrap();
        fs::write(root.join("b.txt"), b"b").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("sub/c.txt"), b"c").unwrap();
        fs::write(root.join(".dotfile"), b"x").unwrap();
        fs::write(root.join(".hidden_dir/d.txt"), b"d").unwrap();

        let adapter = LocalAdapter::new();
        let names: Vec<String> = adapter
            .list(&uri(root))
            .unwrap()
            .iter()
            .map(|u| u.path.strip_prefix(&uri(root).path).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["/a.txt", "/b.txt", "/sub/c.txt"]);
    }

    #[test]
    fn list_of_single_file_is_itself() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("x.png");
        fs::write(&f, b"x").unwrap();
        assert_eq!(LocalAdapter::new().list(&uri(&f)).unwrap(), vec![uri(&f)]);
    }

    #[test]
    fn stat_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let target = uri(&dir.path().join("nested/out.bin"));
        adapter.write(&target, b"hello").unwrap();
        assert_eq!(adapter.read(&target).unwrap(), b"hello");
        let st = adapter.stat(&target).unwrap();
        assert_eq!(st.size, 5);
        assert!(!st.is_dir);
        let mut buf = String::new();
        adapter.open(&target).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = uri(&dir.path().join("missing"));
        let adapter = LocalAdapter::new();
        assert!(matches!(adapter.stat(&missing), Err(StorageError::NotFound(_))));
        assert!(matches!(adapter.probe(&missing), Err(StorageError::NotFound(_))));
        assert!(!adapter.exists(&missing));
    }

    #[test]
    fn probe_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let caps = LocalAdapter::new().probe(&uri(dir.path())).unwrap();
        assert!(caps.list && caps.stat && caps.read && caps.write);
        // Probing leaves nothing behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn copy_to_local_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("out/dest.txt");
        fs::write(&src, b"new").unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old").unwrap();
        LocalAdapter::new().copy_to_local(&uri(&src), &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }
}
