//! Ordered frame headers.

/// Header names used by the client
pub mod names {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const HOST: &str = "host";
    pub const LOGIN: &str = "login";
    pub const PASSCODE: &str = "passcode";
    pub const VERSION: &str = "version";
    pub const SESSION: &str = "session";
    pub const SERVER: &str = "server";
    pub const DESTINATION: &str = "destination";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const TRANSACTION: &str = "transaction";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const MESSAGE: &str = "message";
    pub const PERSISTENT: &str = "persistent";
    pub const PRIORITY: &str = "priority";
    pub const EXPIRES: &str = "expires";
}

/// Frame headers in wire order
///
/// Repeated keys are allowed on the wire; lookups return the first value,
/// which is the one a broker honours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Headers::add`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// Append a header
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Append every default whose key is not present yet
    pub fn merge_defaults(&mut self, defaults: &Headers) {
        for (key, value) in &defaults.entries {
            if !self.contains(key) {
                self.entries.push((key.clone(), value.clone()));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
