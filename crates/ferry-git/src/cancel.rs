//! Cooperative cancellation for a running upload-pack.

use crate::{GitError, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag checked between service phases.
///
/// Clones observe the same flag: whoever embeds the service keeps one and
/// cancels it from another thread while `upload_pack` checks its own.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with an `Interrupted` I/O error if cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(GitError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "upload-pack cancelled",
            )));
        }
        Ok(())
    }
}
