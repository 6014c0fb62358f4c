//! Availability Waiter
//!
//! Watches one directory and lets callers block until a named artifact exists
//! in it. Waits register a [`PendingLock`] per base name; the watch loop
//! releases it a short settle delay after a matching filesystem event.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{WaitError, WaiterError};
use crate::locks::{LockTable, PendingLock};

/// Grace period between a filesystem event and releasing its waiters.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// An artifact resolved from a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Artifact {
    /// Base name, the lock table key.
    name: String,
    /// Location inside the watched directory.
    path: PathBuf,
}

/// Blocks callers until artifacts show up in a watched directory.
pub struct Waiter {
    dir: PathBuf,
    pattern: Regex,
    settle_delay: Duration,
    request_timeout: Option<Duration>,
    locks: Arc<LockTable>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    serving: AtomicBool,
    releases: TaskTracker,
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("dir", &self.dir)
            .field("pattern", &self.pattern.as_str())
            .field("settle_delay", &self.settle_delay)
            .field("request_timeout", &self.request_timeout)
            .field("pending", &self.locks.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Waiter {
    /// Create a waiter for `dir`, matching artifact base names against `pattern`.
    ///
    /// The directory does not need to exist yet; [`serve`](Self::serve) fails if
    /// it still doesn't when watching starts.
    pub fn new(dir: impl AsRef<Path>, pattern: &str) -> Result<Self, WaiterError> {
        let pattern = Regex::new(pattern)?;
        let dir = std::path::absolute(dir.as_ref())?;

        Ok(Self {
            dir,
            pattern,
            settle_delay: DEFAULT_SETTLE_DELAY,
            request_timeout: None,
            locks: Arc::new(LockTable::new()),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            releases: TaskTracker::new(),
        })
    }

    /// Set the delay between a matching event and releasing waiters.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the deadline the HTTP adapter gives each request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Number of artifact names that currently have waiters registered.
    pub fn pending(&self) -> usize {
        self.locks.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Watch the directory until [`close`](Self::close) is called.
    ///
    /// Failing to create the watcher or to register the directory is fatal and
    /// returned immediately. Errors reported later by the watcher are logged.
    pub async fn serve(&self) -> Result<(), WaiterError> {
        if self.serving.swap(true, Ordering::SeqCst) {
            return Err(WaiterError::AlreadyServing);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(|source| WaiterError::Watch {
            path: self.dir.clone(),
            source,
        })?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|source| WaiterError::Watch {
                path: self.dir.clone(),
                source,
            })?;

        info!(
            dir = %self.dir.display(),
            pattern = %self.pattern,
            settle_delay = ?self.settle_delay,
            "Starting waiter"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = rx.recv() => match message {
                    Some(Ok(event)) => self.dispatch(event),
                    Some(Err(e)) => error!(error = %e, "Got watcher error"),
                    None => {
                        warn!("Watcher event stream ended");
                        self.shutdown.cancelled().await;
                        break;
                    }
                },
            }
        }

        drop(watcher);
        self.releases.close();
        self.releases.wait().await;

        info!(dir = %self.dir.display(), "Waiter stopped");
        Ok(())
    }

    /// Wait for the artifact behind `name` until `cancel` fires.
    pub async fn wait(&self, name: &str, cancel: &CancellationToken) -> Result<(), WaitError> {
        self.wait_until(name, cancel, None).await
    }

    /// Wait for the artifact behind `name`, giving up after `timeout`.
    pub async fn wait_timeout(&self, name: &str, timeout: Duration) -> Result<(), WaitError> {
        let cancel = CancellationToken::new();
        self.wait_until(name, &cancel, Some(Instant::now() + timeout))
            .await
    }

    /// Wait for the artifact behind `name`.
    ///
    /// `name` is a path relative to the watched directory (a leading `/` is
    /// ignored). Returns `Ok` right away when the base name doesn't match the
    /// pattern, the waiter is closed, or the file already exists. Otherwise
    /// suspends until the artifact's lock is released, the waiter shuts down,
    /// `cancel` fires, or `deadline` passes.
    pub async fn wait_until(
        &self,
        name: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<(), WaitError> {
        let Some(artifact) = self.artifact(name) else {
            return Ok(());
        };
        if self.is_closed() || self.available(&artifact.path).await {
            return Ok(());
        }

        let lock = self.locks.get_or_create(&artifact.name);
        info!(name = %artifact.name, path = %artifact.path.display(), "Add request lock");

        // The file may have landed between the first probe and registering.
        if self.available(&artifact.path).await {
            debug!(name = %artifact.name, "Artifact appeared while registering");
            return Ok(());
        }

        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = lock.unlocked() => Ok(()),
            _ = self.shutdown.cancelled() => Err(WaitError::Closed),
            _ = cancel.cancelled() => Err(WaitError::Cancelled),
            _ = expired => Err(WaitError::DeadlineExceeded),
        }
    }

    /// Release everyone waiting on `name` without waiting for a filesystem event.
    ///
    /// Returns false when nobody was waiting.
    pub fn release(&self, name: &str) -> bool {
        let Some(base) = base_name(Path::new(name)) else {
            return false;
        };
        let released = self.locks.release(base);
        if released {
            info!(name = %base, "Released lock on request");
        }
        released
    }

    /// Shut the waiter down. Safe to call more than once.
    ///
    /// Suspended waits resolve with [`WaitError::Closed`], new waits pass
    /// through, and [`serve`](Self::serve) drops the watcher and returns.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(dir = %self.dir.display(), pending = self.locks.len(), "Closing waiter");
        self.shutdown.cancel();
        self.releases.close();
    }

    fn dispatch(&self, event: Event) {
        if matches!(event.kind, EventKind::Remove(_)) {
            return;
        }
        for path in &event.paths {
            let Some(name) = base_name(path) else {
                continue;
            };
            if !self.pattern.is_match(name) {
                continue;
            }
            if let Some(lock) = self.locks.get(name) {
                debug!(name = %name, kind = ?event.kind, "Got watcher event");
                self.schedule_release(name.to_string(), lock);
            }
        }
    }

    fn schedule_release(&self, name: String, lock: PendingLock) {
        let locks = Arc::clone(&self.locks);
        let shutdown = self.shutdown.clone();
        let delay = self.settle_delay;

        self.releases.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    info!(name = %name, "Release lock");
                    lock.unlock();
                    locks.remove_if_unlocked(&name);
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    fn artifact(&self, request_path: &str) -> Option<Artifact> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }

        let name = base_name(relative)?;
        if !self.pattern.is_match(name) {
            return None;
        }

        Some(Artifact {
            name: name.to_string(),
            path: self.dir.join(relative),
        })
    }

    async fn available(&self, path: &Path) -> bool {
        match tokio::fs::try_exists(path).await {
            Ok(exists) => exists,
            Err(e) => {
                // Only a definite "not found" blocks; anything else lets the request through.
                warn!(path = %path.display(), error = %e, "Failed to probe artifact");
                true
            }
        }
    }
}

fn base_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
