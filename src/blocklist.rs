//! Domain blocklist with whole-subtree semantics.
//!
//! Blocked domains are stored as their DNS labels reversed, so one entry
//! blocks the name itself and every name beneath it: blocking `example.com`
//! also blocks `foo.example.com`, while blocking `foo.example.com` does not
//! block `example.com`.

use crate::error::{StoreError, StoreResult};

/// Reversed-label suffix matcher over blocked domain names.
///
/// The blocklist has no lock of its own: it lives inside the store's index
/// struct and is guarded by the store lock like every other index.
#[derive(Debug, Default)]
pub(crate) struct DomainBlocklist {
    /// Each entry is a domain's labels in reverse order
    /// (`example.com` → `["com", "example"]`).
    entries: Vec<Vec<String>>,
}

/// Splits a name on `.` and reverses the label order.
fn reversed_labels(name: &str) -> Vec<String> {
    name.split('.').rev().map(str::to_owned).collect()
}

impl DomainBlocklist {
    /// Adds a domain to the blocklist.
    pub(crate) fn insert(&mut self, name: &str) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::validation("domain name must not be empty"));
        }
        self.entries.push(reversed_labels(name));
        Ok(())
    }

    /// Whether the name, or any ancestor of it, is blocked.
    ///
    /// Matching iterates over the stored entry's labels only, so an entry
    /// with more labels than the query can never match and never reads past
    /// the end of the query.
    pub(crate) fn contains(&self, name: &str) -> bool {
        let query = reversed_labels(name);
        self.entries.iter().any(|entry| {
            entry.len() <= query.len() && entry.iter().zip(&query).all(|(a, b)| a == b)
        })
    }
}
