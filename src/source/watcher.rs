use crate::config::types::SourceConfig;
use crate::source::event::{Batch, LoadError};
use glob::Pattern;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Polls a directory for new event files and delivers each one once.
///
/// Every file that is picked up is remembered for the lifetime of the watcher,
/// including files that failed to load, so nothing is ever read twice.
#[derive(Debug)]
pub struct DirectoryWatcher {
    path: PathBuf,
    pattern: Pattern,
    poll_interval: Duration,
    seen: HashSet<PathBuf>,
}

impl DirectoryWatcher {
    pub fn new(config: &SourceConfig) -> Result<Self, WatchError> {
        let pattern = Pattern::new(&config.pattern).map_err(|e| WatchError::InvalidPattern {
            pattern: config.pattern.clone(),
            source: e,
        })?;

        Ok(Self {
            path: config.path.clone(),
            pattern,
            poll_interval: config.poll_interval,
            seen: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of files consumed so far, successfully or not
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    /// List files matching the pattern that have not been consumed yet.
    ///
    /// Only regular files directly inside the directory are considered, either
    /// directly or through a symlink.
    /// Results are sorted by file name.
    pub async fn scan(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.seen.contains(&path) {
                continue;
            }

            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.pattern.matches(name));
            if !matches {
                continue;
            }

            // Symlinks are followed. The file may vanish between listing and stat;
            // it will simply not show up next time.
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => found.push(path),
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }

        found.sort();
        Ok(found)
    }

    /// Mark a file as consumed and load it.
    ///
    /// Returns `None` when the file cannot be read or parsed. The file stays
    /// marked either way.
    pub async fn load(&mut self, path: &Path) -> Option<Batch> {
        if !self.seen.insert(path.to_path_buf()) {
            return None;
        }

        match Batch::load(path).await {
            Ok(batch) => {
                debug!(
                    batch_id = %batch.id,
                    path = %path.display(),
                    events = batch.len(),
                    "Loaded event file"
                );
                Some(batch)
            }
            Err(e @ LoadError::Parse { .. }) => {
                warn!(error = %e, "Skipping malformed event file");
                None
            }
            Err(e @ LoadError::Io { .. }) => {
                warn!(error = %e, "Skipping unreadable event file");
                None
            }
        }
    }

    /// Run the watch loop until cancelled or until the receiver is dropped.
    ///
    /// Sending waits for channel capacity, so a slow consumer slows the watcher
    /// down instead of losing batches.
    pub async fn run(mut self, output: mpsc::Sender<Batch>, cancel: CancellationToken) {
        info!(
            path = %self.path.display(),
            pattern = %self.pattern,
            "Directory watcher started"
        );

        while !cancel.is_cancelled() {
            if output.is_closed() {
                info!(seen = self.seen.len(), "Batch receiver dropped, stopping watcher");
                return;
            }

            let candidates = match self.scan().await {
                Ok(candidates) => candidates,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = %self.path.display(), "Source directory not found, retrying");
                    Vec::new()
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to list source directory");
                    Vec::new()
                }
            };

            let found_new = !candidates.is_empty();

            for path in candidates {
                if cancel.is_cancelled() {
                    break;
                }

                let Some(batch) = self.load(&path).await else {
                    continue;
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = output.send(batch) => {
                        if sent.is_err() {
                            info!(seen = self.seen.len(), "Batch receiver dropped, stopping watcher");
                            return;
                        }
                    }
                }
            }

            if !found_new {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        info!(seen = self.seen.len(), "Directory watcher stopped");
    }
}
