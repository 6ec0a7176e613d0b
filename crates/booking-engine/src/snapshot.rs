//! Busy-interval snapshots with owners resolved once at ingestion.
//!
//! Upstream calendar data names an interval's owner inconsistently (id, display
//! name or email). [`BusySnapshot::ingest`] resolves each tag against the
//! registry exactly once, so the rules only ever compare resource ids.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::interval::BusyInterval;
use crate::registry::ResourceRegistry;

/// A busy interval plus the id of the resource it was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub interval: BusyInterval,
    /// `None` when the owner tag was missing or matched no resource.
    pub owner: Option<String>,
}

impl SnapshotEntry {
    pub fn is_owned_by(&self, resource_id: &str) -> bool {
        self.owner.as_deref() == Some(resource_id)
    }
}

/// Immutable view of every busy interval for one validation or generation pass.
#[derive(Debug, Clone, Default)]
pub struct BusySnapshot {
    entries: Vec<SnapshotEntry>,
}

type DedupKey = (DateTime<Utc>, DateTime<Utc>, Option<String>, Option<String>);

impl BusySnapshot {
    /// Resolve owners, drop empty intervals and collapse exact duplicates.
    ///
    /// Entries are kept sorted by `(start, end)`. Intervals whose owner cannot
    /// be resolved are kept (they still count for the office rule) but belong
    /// to no resource.
    pub fn ingest<I>(registry: &ResourceRegistry, intervals: I) -> Self
    where
        I: IntoIterator<Item = BusyInterval>,
    {
        let mut seen: HashSet<DedupKey> = HashSet::new();
        let mut entries = Vec::new();

        for interval in intervals {
            if interval.end <= interval.start {
                tracing::warn!(
                    start = %interval.start,
                    end = %interval.end,
                    "ignoring busy interval that ends before it starts"
                );
                continue;
            }

            let owner = match interval.owner_tag.as_deref() {
                Some(tag) => match registry.resolve_owner(tag) {
                    Some(resource) => Some(resource.id.clone()),
                    None => {
                        tracing::warn!(tag, start = %interval.start, "busy interval owner matches no resource");
                        None
                    }
                },
                None => {
                    tracing::warn!(start = %interval.start, "busy interval has no owner tag");
                    None
                }
            };

            let key = (
                interval.start,
                interval.end,
                interval.location.clone(),
                owner.clone(),
            );
            if !seen.insert(key) {
                continue;
            }
            entries.push(SnapshotEntry { interval, owner });
        }

        entries.sort_by_key(|e| (e.interval.start, e.interval.end));
        Self { entries }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// Intervals belonging to `resource_id`, ascending by start.
    pub fn owned_by<'a>(&'a self, resource_id: &'a str) -> impl Iterator<Item = &'a BusyInterval> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.is_owned_by(resource_id))
            .map(|e| &e.interval)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
