use std::collections::HashSet;

use tracing::{debug, warn};

use crate::descriptors::PlaylistDescriptor;
use crate::library::{Album, Record};

/// Tracks which smart playlist families need regeneration during one session.
///
/// Every change notification tests the still-pending families against the changed album. A family
/// that matches moves to the matched set and is never tested again in this session, so the
/// expensive regeneration runs once at the end no matter how many changes arrive.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    pending: HashSet<PlaylistDescriptor>,
    matched: HashSet<PlaylistDescriptor>,
    exit_hook_registered: bool,
}

impl DirtyTracker {
    pub fn new(descriptors: impl IntoIterator<Item = PlaylistDescriptor>) -> Self {
        DirtyTracker {
            pending: descriptors.into_iter().collect(),
            matched: HashSet::new(),
            exit_hook_registered: false,
        }
    }

    /// Handle a "record changed" notification. Returns true when this change is the first match of
    /// the session, i.e. when the session-end regeneration has just been scheduled.
    pub fn record_changed(&mut self, record: &Record) -> bool {
        match record {
            Record::Album(album) => self.album_changed(album),
            Record::Item(_) => false,
        }
    }

    pub fn album_changed(&mut self, album: &Album) -> bool {
        let mut newly_matched = Vec::new();
        for descriptor in &self.pending {
            let query = match descriptor.query() {
                Ok(query) => query,
                Err(e) => {
                    warn!("Cannot evaluate playlist family {}: {}", descriptor.name, e);
                    continue;
                }
            };
            if query.matches(album) {
                debug!("{} will be updated because of {}", descriptor.name, album.logtext());
                newly_matched.push(descriptor.clone());
            }
        }

        for descriptor in &newly_matched {
            self.pending.remove(descriptor);
        }
        self.matched.extend(newly_matched);

        if !self.matched.is_empty() && !self.exit_hook_registered {
            self.exit_hook_registered = true;
            return true;
        }
        false
    }

    /// Mark `descriptors` as up to date, as when they have been regenerated by hand. Later changes
    /// can schedule them again.
    pub fn forget(&mut self, descriptors: &[PlaylistDescriptor]) {
        for descriptor in descriptors {
            if self.matched.remove(descriptor) {
                self.pending.insert(descriptor.clone());
            }
        }
    }

    pub fn needs_regeneration(&self) -> bool {
        self.exit_hook_registered && !self.matched.is_empty()
    }

    pub fn pending(&self) -> &HashSet<PlaylistDescriptor> {
        &self.pending
    }

    pub fn matched(&self) -> &HashSet<PlaylistDescriptor> {
        &self.matched
    }

    /// Take the matched families, ordered by name. A second call returns nothing.
    pub fn drain(&mut self) -> Vec<PlaylistDescriptor> {
        let mut drained: Vec<_> = std::mem::take(&mut self.matched).into_iter().collect();
        drained.sort();
        drained
    }
}
