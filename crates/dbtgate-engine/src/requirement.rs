//! `NAME=COUNT` requirement parsing
//!
//! Requirements are parsed while the command line is read, so a bad value
//! aborts the hook before the manifest is touched.

/// Minimum counts keyed by column name or test kind, in the order given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    entries: Vec<(String, usize)>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the minimum for `name`
    pub fn insert(&mut self, name: impl Into<String>, minimum: usize) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = minimum,
            None => self.entries.push((name, minimum)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(name, min)| (name.as_str(), *min))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, usize)> for Requirements {
    fn from_iter<I: IntoIterator<Item = (String, usize)>>(iter: I) -> Self {
        let mut requirements = Self::new();
        for (name, minimum) in iter {
            requirements.insert(name, minimum);
        }
        requirements
    }
}

/// Requirement parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementParseError {
    #[error("expected KEY=VALUE, got '{0}'")]
    MissingSeparator(String),

    #[error("empty key in '{0}'")]
    EmptyKey(String),

    #[error("Unable to cast {value} to int.")]
    InvalidCount { key: String, value: String },
}

/// Parse one `NAME=COUNT` argument
pub fn parse_requirement(raw: &str) -> Result<(String, usize), RequirementParseError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| RequirementParseError::MissingSeparator(raw.to_string()))?;

    if key.is_empty() {
        return Err(RequirementParseError::EmptyKey(raw.to_string()));
    }

    let minimum = value
        .parse::<usize>()
        .map_err(|_| RequirementParseError::InvalidCount {
            key: key.to_string(),
            value: value.to_string(),
        })?;

    Ok((key.to_string(), minimum))
}
