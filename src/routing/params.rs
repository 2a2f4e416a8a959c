//! Path parameter captures.

/// Ordered `(name, value)` pairs captured while matching one request path.
///
/// A capture set lives for exactly one request and is never shared between
/// requests. Lookup is a linear scan; routes rarely declare more than a
/// handful of parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    items: Vec<(String, String)>,
}

impl Params {
    /// Value captured for `name`, if the matched route declared it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of captured parameters.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the matched route was fully static.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate captures in the order they appear in the route pattern.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub(crate) fn from_captures(captures: &[(&str, &str)]) -> Self {
        Self {
            items: captures
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        }
    }
}
