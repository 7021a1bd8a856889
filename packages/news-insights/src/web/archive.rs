//! Raw HTML archives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{PipelineError, Result};
use crate::traits::web::{PageArchive, PageKind};

/// Writes pages to `<root>/<ticker>/<ticker>_<kind>_<timestamp>_<id>.html`.
pub struct FsArchive {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn file_name(&self, ticker: &str, kind: PageKind) -> String {
        let stamp = self.clock.now().format("%Y-%m-%d_T_%H-%M-%S");
        let id = Uuid::new_v4().simple().to_string();
        format!("{ticker}_{}_{stamp}_{}.html", kind.tag(), &id[..8])
    }
}

#[async_trait]
impl PageArchive for FsArchive {
    async fn save(&self, ticker: &str, kind: PageKind, html: &str) -> Result<String> {
        let dir = self.root.join(ticker);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(self.file_name(ticker, kind));
        tokio::fs::write(&path, html).await?;
        debug!(path = %path.display(), bytes = html.len(), "page archived");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn load(&self, path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Keeps pages in memory under `mem://<ticker>/<n>` paths.
#[derive(Default)]
pub struct MemoryArchive {
    pages: RwLock<HashMap<String, String>>,
    counter: AtomicU64,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a page, as if the file had been deleted.
    pub fn remove(&self, path: &str) -> Option<String> {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }
}

#[async_trait]
impl PageArchive for MemoryArchive {
    async fn save(&self, ticker: &str, kind: PageKind, html: &str) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = format!("mem://{ticker}/{}/{n}", kind.tag());
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), html.to_string());
        Ok(path)
    }

    async fn load(&self, path: &str) -> Result<String> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::ContentUnavailable {
                url: path.to_string(),
            })
    }
}
