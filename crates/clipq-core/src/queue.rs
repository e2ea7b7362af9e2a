//! Ordered queue of items; insertion order is download order.
//!
//! Every structural mutation (append, remove, clear) rewrites the session
//! snapshot when the store is backed by a session file. Status and progress
//! changes made by the orchestrator are not persisted.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::item::{Item, ItemStatus};
use crate::session::{self, SessionEntry};

#[derive(Debug, Default)]
pub struct QueueStore {
    items: Vec<Item>,
    session_path: Option<PathBuf>,
}

impl QueueStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store persisting to `session_path` on every mutation.
    pub fn with_session(session_path: impl Into<PathBuf>) -> Self {
        Self {
            items: Vec::new(),
            session_path: Some(session_path.into()),
        }
    }

    pub fn session_path(&self) -> Option<&Path> {
        self.session_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn statuses(&self) -> Vec<ItemStatus> {
        self.items.iter().map(Item::status).collect()
    }

    /// Paths claimed by queued items; new submissions must not reuse them.
    pub fn reserved_paths(&self) -> Vec<PathBuf> {
        self.items
            .iter()
            .flat_map(|i| {
                std::iter::once(i.final_path().to_path_buf()).chain(i.temp_path().map(Path::to_path_buf))
            })
            .collect()
    }

    pub fn append(&mut self, item: Item) -> Result<()> {
        tracing::debug!(url = item.url(), index = self.items.len(), "queue append");
        self.items.push(item);
        self.persist()
    }

    /// Removes the items at `indices` (duplicates ignored). Any out-of-range
    /// index fails the whole call and leaves the queue unchanged.
    pub fn remove(&mut self, indices: &[usize]) -> Result<()> {
        let unique: BTreeSet<usize> = indices.iter().copied().collect();
        if let Some(&bad) = unique.iter().find(|&&i| i >= self.items.len()) {
            anyhow::bail!(
                "index {} out of range (queue has {} item(s))",
                bad,
                self.items.len()
            );
        }
        // Highest first so earlier indices stay valid.
        for &index in unique.iter().rev() {
            let removed = self.items.remove(index);
            tracing::debug!(url = removed.url(), index, "queue remove");
        }
        self.persist()
    }

    pub fn clear(&mut self) -> Result<()> {
        tracing::debug!(count = self.items.len(), "queue clear");
        self.items.clear();
        self.persist()
    }

    /// Ordered `{url, chosen_format, start_time, end_time}` for every item.
    pub fn snapshot(&self) -> Vec<SessionEntry> {
        self.items.iter().map(SessionEntry::from_item).collect()
    }

    /// Recomputes titles and paths of still-queued items against the disk and
    /// against each other, so files that appeared since submission are not overwritten.
    pub fn refresh_paths(&mut self, download_dir: &Path) {
        let mut reserved: Vec<PathBuf> = Vec::new();
        for item in self.items.iter().filter(|i| i.status() != ItemStatus::Queued) {
            reserved.push(item.final_path().to_path_buf());
        }
        for item in self.items.iter_mut().filter(|i| i.status() == ItemStatus::Queued) {
            item.refresh_paths(download_dir, &reserved);
            reserved.push(item.final_path().to_path_buf());
            if let Some(t) = item.temp_path() {
                reserved.push(t.to_path_buf());
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.session_path else {
            return Ok(());
        };
        session::save(path, &self.snapshot())
    }

    pub(crate) fn item_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.items.get_mut(index)
    }

    /// Applies a status change if it is a valid lifecycle transition.
    /// Returns false (and changes nothing) otherwise.
    pub(crate) fn set_status(&mut self, index: usize, next: ItemStatus) -> bool {
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };
        if !item.status.can_advance_to(next) {
            tracing::warn!(index, from = %item.status, to = %next, "ignored invalid status transition");
            return false;
        }
        item.status = next;
        if next == ItemStatus::Cancelling || next == ItemStatus::Cancelled {
            item.progress = None;
        }
        true
    }

    pub(crate) fn set_progress(&mut self, index: usize, percent: u8) {
        if let Some(item) = self.items.get_mut(index) {
            item.progress = Some(percent.min(100));
        }
    }
}
