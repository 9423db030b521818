//! Grouping of traversal results for threshold rules

use std::collections::BTreeMap;

/// How a group of required names is counted against a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountPolicy {
    /// Number of required names that have at least one member
    #[default]
    Distinct,

    /// Total members across all required names
    Sum,
}

impl std::str::FromStr for CountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distinct" => Ok(Self::Distinct),
            "sum" => Ok(Self::Sum),
            other => Err(format!("unknown count policy '{other}', expected 'distinct' or 'sum'")),
        }
    }
}

/// Items grouped by a string key, keys in sorted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Groups<T> {
    groups: BTreeMap<String, Vec<T>>,
}

impl<T> Default for Groups<T> {
    fn default() -> Self {
        Self { groups: BTreeMap::new() }
    }
}

/// Group `items` by `key`
///
/// Items are sorted by key first (stable, so equal keys keep encounter order)
/// and then split into runs, which makes the result independent of the
/// order the walker produced them in.
pub fn group_by<T, I, F, K>(items: I, key: F) -> Groups<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> K,
    K: AsRef<str>,
{
    let mut keyed: Vec<(String, T)> = items
        .into_iter()
        .map(|item| (key(&item).as_ref().to_string(), item))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for (key, item) in keyed {
        groups.entry(key).or_default().push(item);
    }

    Groups { groups }
}

impl<T> Groups<T> {
    pub fn get(&self, key: &str) -> &[T] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Size of one group, 0 when absent
    pub fn count(&self, key: &str) -> usize {
        self.get(key).len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.count(key) > 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Count `names` against this grouping under `policy`
    pub fn count_required<S: AsRef<str>>(&self, names: &[S], policy: CountPolicy) -> usize {
        match policy {
            CountPolicy::Distinct => names.iter().filter(|name| self.contains(name.as_ref())).count(),
            CountPolicy::Sum => names.iter().map(|name| self.count(name.as_ref())).sum(),
        }
    }
}
