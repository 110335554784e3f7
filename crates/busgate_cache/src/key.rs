use std::fmt;

/// Namespace tag prefixed to every key.
pub const KEY_NAMESPACE: &str = "__busgate__";

/// Cache key derived from the original request target (path + raw query).
///
/// The query string is used verbatim: `?a=1&b=2` and `?b=2&a=1` are distinct keys.
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(original_url: &str) -> Self {
        Self(format!("{KEY_NAMESPACE}{original_url}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
