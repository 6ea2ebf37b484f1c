//! Query keys: a query name plus ordered parameters, compared structurally.

use std::fmt;

/// One parameter of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyParam {
  Int(i64),
  Str(String),
}

impl From<i64> for KeyParam {
  fn from(v: i64) -> Self {
    KeyParam::Int(v)
  }
}

impl From<i32> for KeyParam {
  fn from(v: i32) -> Self {
    KeyParam::Int(i64::from(v))
  }
}

impl From<&str> for KeyParam {
  fn from(v: &str) -> Self {
    KeyParam::Str(v.to_string())
  }
}

impl From<String> for KeyParam {
  fn from(v: String) -> Self {
    KeyParam::Str(v)
  }
}

impl fmt::Display for KeyParam {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyParam::Int(v) => write!(f, "{}", v),
      KeyParam::Str(v) => write!(f, "{}", v),
    }
  }
}

/// Identifier of one cached query, e.g. `("lead", 42)` or `("leads")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  name: String,
  params: Vec<KeyParam>,
}

impl QueryKey {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      params: Vec::new(),
    }
  }

  /// Append a parameter.
  pub fn with(mut self, param: impl Into<KeyParam>) -> Self {
    self.params.push(param.into());
    self
  }

  /// Query name, used to look up the fetcher.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn params(&self) -> &[KeyParam] {
    &self.params
  }

  /// Integer parameter at `index`, if present and an integer.
  pub fn int_param(&self, index: usize) -> Option<i64> {
    match self.params.get(index) {
      Some(KeyParam::Int(v)) => Some(*v),
      _ => None,
    }
  }

  /// True when `self` has the same name as `prefix` and starts with all of its params.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.name == prefix.name && self.params.starts_with(&prefix.params)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)?;
    for param in &self.params {
      write!(f, "/{}", param)?;
    }
    Ok(())
  }
}

/// Which keys an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
  /// Exactly this key. Creates the entry if it does not exist yet.
  Exact(QueryKey),
  /// Every existing key that starts with this one.
  Prefix(QueryKey),
}

impl KeyPattern {
  /// All keys with the given query name.
  pub fn all(name: impl Into<String>) -> Self {
    KeyPattern::Prefix(QueryKey::new(name))
  }

  pub fn matches(&self, key: &QueryKey) -> bool {
    match self {
      KeyPattern::Exact(k) => k == key,
      KeyPattern::Prefix(prefix) => key.starts_with(prefix),
    }
  }
}

impl From<QueryKey> for KeyPattern {
  fn from(key: QueryKey) -> Self {
    KeyPattern::Exact(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_structural_equality() {
    assert_eq!(QueryKey::new("lead").with(42), QueryKey::new("lead").with(42));
    assert_ne!(QueryKey::new("lead").with(42), QueryKey::new("lead").with(43));
    assert_ne!(
      QueryKey::new("lead").with(42),
      QueryKey::new("lead").with("42")
    );
  }

  #[test]
  fn test_display() {
    assert_eq!(QueryKey::new("leads").to_string(), "leads");
    assert_eq!(
      QueryKey::new("pitches").with(7).with("draft").to_string(),
      "pitches/7/draft"
    );
  }

  #[test]
  fn test_prefix_pattern() {
    let pattern = KeyPattern::all("lead");
    assert!(pattern.matches(&QueryKey::new("lead")));
    assert!(pattern.matches(&QueryKey::new("lead").with(1)));
    assert!(!pattern.matches(&QueryKey::new("leads")));

    let scoped = KeyPattern::Prefix(QueryKey::new("pitches").with(3));
    assert!(scoped.matches(&QueryKey::new("pitches").with(3).with(1)));
    assert!(!scoped.matches(&QueryKey::new("pitches").with(4)));
    assert!(!scoped.matches(&QueryKey::new("pitches")));
  }

  #[test]
  fn test_int_param() {
    let key = QueryKey::new("lead").with(5).with("x");
    assert_eq!(key.int_param(0), Some(5));
    assert_eq!(key.int_param(1), None);
    assert_eq!(key.int_param(2), None);
  }
}
