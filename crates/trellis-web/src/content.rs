use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How long a stored blob stays servable when nobody fetches it.
pub const CONTENT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct StoredEntry {
    body: String,
    stored_at: Instant,
}

/// Ephemeral blob store for generated bundles. Entries live until they are
/// served once or their TTL elapses, whichever comes first; there is no
/// capacity bound, no renewal, and no re-store under an existing key.
///
/// Expiry is checked on access, so no per-entry timer exists; a sweep of an
/// already-served key is a harmless no-op.
#[derive(Debug)]
pub struct ContentServer {
    entries: HashMap<String, StoredEntry>,
    ttl: Duration,
}

impl Default for ContentServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentServer {
    pub fn new() -> Self {
        Self::with_ttl(CONTENT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Inserts a blob under a fresh `{uuid}.{extension}` key and returns the
    /// key. Generated keys never collide in practice, so concurrent stores
    /// are safe without coordination.
    pub fn store(&mut self, body: impl Into<String>, extension: &str) -> String {
        self.sweep();
        let key = format!("{}.{extension}", Uuid::new_v4());
        self.entries.insert(
            key.clone(),
            StoredEntry {
                body: body.into(),
                stored_at: Instant::now(),
            },
        );
        key
    }

    /// Exact-key lookup with read-once semantics: a hit removes the entry
    /// immediately. Expired entries are dropped, never served.
    pub fn serve(&mut self, key: &str) -> Option<String> {
        let entry = self.entries.remove(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.body)
    }

    /// Drops every expired entry.
    pub fn sweep(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
