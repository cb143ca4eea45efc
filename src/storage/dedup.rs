//! Persistent set of committed identifiers for one dedup scope

use crate::state::Identifier;
use crate::storage::traits::{DedupBackend, StoreResult};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Repository over a `DedupBackend`
///
/// The full history is loaded at run start, grows in memory as records are
/// committed, and is written back once at run end. Membership means the item
/// was durably committed to output by this or an earlier run.
///
/// When the stored history could not be read in full, the store is
/// *degraded*: flushing then appends only the identifiers added since the
/// last flush, so what is already stored is never replaced.
pub struct DedupStore {
    scope: String,
    backend: Box<dyn DedupBackend>,
    members: HashSet<Identifier>,
    order: Vec<Identifier>,
    /// Added since the last load or successful flush
    pending: Vec<Identifier>,
    degraded: bool,
}

impl DedupStore {
    pub fn new(scope: impl Into<String>, backend: Box<dyn DedupBackend>) -> Self {
        Self {
            scope: scope.into(),
            backend,
            members: HashSet::new(),
            order: Vec::new(),
            pending: Vec::new(),
            degraded: false,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Replaces the in-memory set with the persisted history
    ///
    /// A backend read failure is logged and treated as an empty history; the
    /// store is then degraded so a later flush only appends.
    ///
    /// # Returns
    ///
    /// The number of identifiers loaded.
    pub fn load(&mut self) -> usize {
        match self.try_load() {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    scope = %self.scope,
                    "Could not read identifier history, starting empty: {}", e
                );
                self.members.clear();
                self.order.clear();
                self.pending.clear();
                0
            }
        }
    }

    /// Like `load`, but surfaces backend errors
    pub fn try_load(&mut self) -> StoreResult<usize> {
        let persisted = match self.backend.read_all() {
            Ok(persisted) => persisted,
            Err(e) => {
                self.degraded = true;
                return Err(e);
            }
        };

        self.members.clear();
        self.order.clear();
        self.pending.clear();
        for raw in persisted.identifiers {
            let id = Identifier::from(raw);
            if self.members.insert(id.clone()) {
                self.order.push(id);
            }
        }

        self.degraded = persisted.unreadable > 0;
        if self.degraded {
            warn!(
                scope = %self.scope,
                "{} unreadable history entries, new identifiers will be appended",
                persisted.unreadable
            );
        }

        info!(
            scope = %self.scope,
            "Loaded {} known identifiers from {}",
            self.order.len(),
            self.backend.location()
        );
        Ok(self.order.len())
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.members.contains(id)
    }

    /// Records an identifier in memory
    ///
    /// Returns false if it was already a member.
    pub fn add(&mut self, id: Identifier) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push(id.clone());
        self.pending.push(id);
        true
    }

    /// Persists what was added since the last load or flush
    ///
    /// Normally the full set replaces the stored history. A degraded store
    /// appends only the new identifiers instead.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The history was written
    /// * `Ok(false)` - Nothing changed, the backend was not touched
    /// * `Err(StoreError)` - The write failed; the set stays dirty
    pub fn flush(&mut self) -> StoreResult<bool> {
        if self.pending.is_empty() {
            debug!(scope = %self.scope, "Identifier history unchanged, not flushing");
            return Ok(false);
        }

        if self.degraded {
            let fresh: Vec<String> = self.pending.iter().map(|id| id.to_string()).collect();
            self.backend.append(&fresh)?;
            info!(
                scope = %self.scope,
                "Appended {} identifiers to {}",
                fresh.len(),
                self.backend.location()
            );
        } else {
            let snapshot: Vec<String> = self.order.iter().map(|id| id.to_string()).collect();
            self.backend.write_all(&snapshot)?;
            info!(
                scope = %self.scope,
                "Flushed {} identifiers to {}",
                snapshot.len(),
                self.backend.location()
            );
        }

        self.pending.clear();
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether the stored history could not be read in full
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Identifiers in first-seen order
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.order.iter()
    }
}
