//! Local preview references for selected files.
//!
//! These work like browser object URLs: the registry hands out a
//! `blob:<uuid>` reference for a file, which can be resolved back to the file
//! until it is revoked. A [`PreviewUrl`] revokes itself when dropped, so a
//! preview can never outlive the entry that owns it.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use uuid::Uuid;

use super::SelectedFile;

/// Issues and resolves preview references. Cheap to clone.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashMap<String, Arc<SelectedFile>>>>,
}

impl PreviewRegistry {
    /// Create a fresh preview reference for `file`.
    pub fn create(&self, file: Arc<SelectedFile>) -> PreviewUrl {
        let url = format!("blob:{}", Uuid::new_v4());
        self.lock().insert(url.clone(), file);
        PreviewUrl {
            url,
            registry: self.clone(),
        }
    }

    /// Look up the file behind a preview reference, if it is still live.
    #[cfg(test)]
    pub fn resolve(&self, url: &str) -> Option<Arc<SelectedFile>> {
        self.lock().get(url).cloned()
    }

    /// How many preview references are currently live?
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, url: &str) {
        self.lock().remove(url);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SelectedFile>>> {
        // A panic while holding this lock can't leave the map half-updated.
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live_count", &self.live_count())
            .finish()
    }
}

/// A live preview reference. Revoked on drop.
pub struct PreviewUrl {
    url: String,
    registry: PreviewRegistry,
}

impl PreviewUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

impl fmt::Debug for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewUrl").field(&self.url).finish()
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
