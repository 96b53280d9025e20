//! Byte sources: where manifests, hierarchy fragments and node payloads come from
//!
//! Paths are `/`-separated and relative to the source root, e.g.
//! `ept-data/2-1-0-3.bin`.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Abstract byte fetch
pub trait ByteSource: Send + Sync + 'static {
    /// Fetch the whole object at `path`
    fn fetch(&self, path: &str) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// Files under a root directory, read with tokio's async fs
#[derive(Clone, Debug)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an object
    pub fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl ByteSource for FsSource {
    async fn fetch(&self, path: &str) -> io::Result<Vec<u8>> {
        let file = self.resolve(path);
        tokio::fs::read(&file).await
    }
}

/// In-memory path → blob table for offline operation and tests
#[derive(Clone, Debug, Default)]
pub struct BlobMap {
    blobs: HashMap<String, Vec<u8>>,
}

impl BlobMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.blobs.insert(path.into(), bytes.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.blobs.remove(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl FromIterator<(String, Vec<u8>)> for BlobMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self { blobs: iter.into_iter().collect() }
    }
}

impl ByteSource for BlobMap {
    async fn fetch(&self, path: &str) -> io::Result<Vec<u8>> {
        self.blobs.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no offline blob for {path}"))
        })
    }
}
