//! Key namespacing.
//!
//! Every key sent to the store gets the configured prefix prepended, so several
//! tenants or environments can share one Redis without colliding.

use std::fmt;

/// Namespace prepended to outgoing keys.
///
/// # Example
/// ```
/// use guarded_redis::KeyPrefix;
///
/// let prefix = KeyPrefix::new("billing:");
/// assert_eq!(prefix.apply("invoices"), "billing:invoices");
/// assert_eq!(prefix.apply_all(&["a", "b"]), vec!["billing:a", "billing:b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Create a prefix. An empty prefix leaves keys untouched.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// The raw prefix string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when no prefix is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix a single key.
    pub fn apply(&self, key: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + key.len());
        out.push_str(&self.0);
        out.push_str(key);
        out
    }

    /// Prefix each key of a multi-key command.
    pub fn apply_all<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        keys.iter().map(|k| self.apply(k.as_ref())).collect()
    }

    /// Strip the prefix from a key returned by the store, e.g. from `SCAN`.
    ///
    /// Returns `None` for keys outside this namespace.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.0.as_str())
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyPrefix {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for KeyPrefix {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prefix_is_identity() {
        let prefix = KeyPrefix::default();
        assert!(prefix.is_empty());
        assert_eq!(prefix.apply("counter"), "counter");
    }

    #[test]
    fn test_apply_all_preserves_order() {
        let prefix = KeyPrefix::new("app:");
        let keys = prefix.apply_all(&["z", "a", "m"]);
        assert_eq!(keys, vec!["app:z", "app:a", "app:m"]);
    }

    #[test]
    fn test_apply_all_empty() {
        let prefix = KeyPrefix::new("app:");
        assert!(prefix.apply_all::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_strip() {
        let prefix = KeyPrefix::new("app:");
        assert_eq!(prefix.strip("app:users"), Some("users"));
        assert_eq!(prefix.strip("other:users"), None);
    }

    #[test]
    fn test_prefix_is_not_separator_aware() {
        // Plain concatenation: the caller owns the separator.
        let prefix = KeyPrefix::new("app");
        assert_eq!(prefix.apply("users"), "appusers");
    }
}
