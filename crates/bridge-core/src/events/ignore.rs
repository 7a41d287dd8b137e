//! Ignore filter
//!
//! Event names configured at startup whose notifications are dropped before
//! serialization.

use std::collections::HashSet;

/// A set of event names to drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    events: HashSet<String>,
}

impl IgnoreSet {
    /// Create an empty ignore set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated list of event names
    ///
    /// Entries are trimmed and empty entries are discarded.
    #[must_use]
    pub fn from_list(list: &str) -> Self {
        list.split(',').collect()
    }

    /// Check whether an event name is ignored
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.events.contains(event_type)
    }

    /// Number of ignored event names
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing is ignored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over the ignored event names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let events = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { events }
    }
}
