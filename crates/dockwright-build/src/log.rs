//! Build log
//!
//! Append-only buffer collecting archive diagnostics, daemon build output and
//! push progress for one request. Clones share the same buffer, so the
//! archive stderr drain and the build stream can both append to it.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct BuildLog {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panicked writer can only have appended whole chunks.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, bytes: &[u8]) {
        self.buffer().extend_from_slice(bytes);
    }

    /// Append `line`, adding a newline if it lacks one
    pub fn append_line(&self, line: &str) {
        let mut buffer = self.buffer();
        buffer.extend_from_slice(line.as_bytes());
        if !line.ends_with('\n') {
            buffer.push(b'\n');
        }
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    /// Copy of the bytes appended so far
    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer()).into_owned()
    }
}
