//! Presence tracker
//!
//! Presence is inferred from the local party's own channel lifecycle: `true`
//! means "I can currently reach them over my channel", not a global online
//! status. Only the connection manager writes to it.

use std::collections::HashMap;

use crate::common::PartyId;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: HashMap<PartyId, bool>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a presence value. Returns `true` when it changed.
    pub(crate) fn set(&mut self, counterpart: &PartyId, online: bool) -> bool {
        let previous = self.online.insert(counterpart.clone(), online);
        previous != Some(online)
    }

    /// Unknown counterparts read as offline.
    pub fn is_online(&self, counterpart: &PartyId) -> bool {
        self.online.get(counterpart).copied().unwrap_or(false)
    }

    pub fn online_counterparts(&self) -> impl Iterator<Item = &PartyId> {
        self.online
            .iter()
            .filter_map(|(party, online)| online.then_some(party))
    }

    pub fn clear(&mut self) {
        self.online.clear();
    }
}
