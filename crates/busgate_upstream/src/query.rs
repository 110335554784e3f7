use std::collections::HashSet;

use url::Url;

/// One feed call: `command=<command>` followed by `params` in insertion order.
///
/// Keys may repeat (`stops=a&stops=b`); nothing here collapses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery {
    command: String,
    params: Vec<(String, String)>,
}

impl UpstreamQuery {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Appends `key=value` once per value.
    pub fn repeated<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for value in values {
            self.params.push((key.to_string(), value.into()));
        }
        self
    }

    /// Appends client supplied pairs after the route's own parameters.
    ///
    /// Pairs naming `command` or a key already set by the route are dropped.
    pub fn passthrough<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let reserved: HashSet<String> = self.params.iter().map(|(k, _)| k.clone()).collect();
        for (key, value) in pairs {
            if key == "command" || reserved.contains(&key) {
                continue;
            }
            self.params.push((key, value));
        }
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// All values for `key`, in order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once(("command", self.command.as_str()))
            .chain(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Form-encoded query string, `command` first.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }

    /// `base` with this query appended to whatever query it already carries.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut().extend_pairs(self.pairs());
        url
    }
}
