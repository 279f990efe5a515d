//! Adapter operations bounded by the adapter's timeout.
//!
//! Every call runs on a worker thread; the caller stops waiting once
//! [`StorageAdapter::timeout`] elapses and gets [`StorageError::Timeout`].
//! A worker that overruns is left to finish on its own.

use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ldb_types::StorageUri;

use crate::adapter::{CapabilitySet, FileStat, StorageAdapter};
use crate::error::{StorageError, StorageResult};

/// Size of the chunks a bounded reader hands over.
const CHUNK_SIZE: usize = 64 * 1024;

/// Wraps an adapter so no single operation blocks past its timeout.
#[derive(Clone)]
pub struct BoundedAdapter {
    inner: Arc<dyn StorageAdapter>,
}

impl BoundedAdapter {
    pub fn new(inner: Arc<dyn StorageAdapter>) -> Self {
        Self { inner }
    }

    fn run<T, F>(&self, uri: &StorageUri, operation: &'static str, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StorageAdapter, &StorageUri) -> StorageResult<T> + Send + 'static,
    {
        let adapter = Arc::clone(&self.inner);
        let target = uri.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver may already be gone after a timeout.
            let _ = tx.send(op(adapter.as_ref(), &target));
        });
        rx.recv_timeout(self.inner.timeout())
            .map_err(|_| StorageError::Timeout {
                uri: uri.to_string(),
                operation,
            })?
    }
}

impl StorageAdapter for BoundedAdapter {
    fn protocol(&self) -> &str {
        self.inner.protocol()
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn list(&self, uri: &StorageUri) -> StorageResult<Vec<StorageUri>> {
        self.run(uri, "list", |a, u| a.list(u))
    }

    fn stat(&self, uri: &StorageUri) -> StorageResult<FileStat> {
        self.run(uri, "stat", |a, u| a.stat(u))
    }

    fn read(&self, uri: &StorageUri) -> StorageResult<Vec<u8>> {
        self.run(uri, "read", |a, u| a.read(u))
    }

    fn write(&self, uri: &StorageUri, data: &[u8]) -> StorageResult<()> {
        let data = data.to_vec();
        self.run(uri, "write", move |a, u| a.write(u, &data))
    }

    fn probe(&self, uri: &StorageUri) -> StorageResult<CapabilitySet> {
        self.run(uri, "probe", |a, u| a.probe(u))
    }

    /// Opening is bounded as a whole, then every chunk read from the stream
    /// is bounded separately.
    fn open(&self, uri: &StorageUri) -> StorageResult<Box<dyn Read + Send>> {
        let reader = self.run(uri, "open", |a, u| a.open(u))?;
        Ok(Box::new(BoundedReader::spawn(reader, uri, self.timeout())))
    }

    fn copy_to_local(&self, uri: &StorageUri, dest: &Path) -> StorageResult<()> {
        let dest = dest.to_path_buf();
        self.run(uri, "copy", move |a, u| a.copy_to_local(u, &dest))
    }
}

impl std::fmt::Debug for BoundedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedAdapter")
            .field("protocol", &self.inner.protocol())
            .field("timeout", &self.inner.timeout())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Reader fed by a worker thread; each chunk must arrive within `timeout`.
struct BoundedReader {
    chunks: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
    uri: String,
    timeout: Duration,
}

impl BoundedReader {
    fn spawn(mut reader: Box<dyn Read + Send>, uri: &StorageUri, timeout: Duration) -> Self {
        // One chunk of lookahead.
        let (tx, rx) = mpsc::sync_channel(1);
        thread::spawn(move || loop {
            let mut chunk = vec![0u8; CHUNK_SIZE];
            match reader.read(&mut chunk) {
                Ok(n) => {
                    chunk.truncate(n);
                    if tx.send(Ok(chunk)).is_err() || n == 0 {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        });
        Self {
            chunks: rx,
            pending: Vec::new(),
            pos: 0,
            done: false,
            uri: uri.to_string(),
            timeout,
        }
    }
}

impl Read for BoundedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() && !self.done {
            match self.chunks.recv_timeout(self.timeout) {
                Ok(Ok(chunk)) => {
                    self.done = chunk.is_empty();
                    self.pending = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("read timed out for {}", self.uri),
                    ))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        format!("reader for {} stopped", self.uri),
                    ))
                }
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
