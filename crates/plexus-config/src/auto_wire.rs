use std::fmt;

use serde::{Deserialize, Serialize};

/// A type (optionally qualified) used to match consumers to providers when no
/// explicit link is configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AutoWire {
  /// Qualifier distinguishing providers of the same type, e.g. "primary"
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub qualifier: Option<String>,

  /// Type name, e.g. "db.Connection"
  #[serde(rename = "type")]
  pub type_name: String,
}

impl AutoWire {
  /// Unqualified auto-wire for the type.
  pub fn new(type_name: impl Into<String>) -> Self {
    Self {
      qualifier: None,
      type_name: type_name.into(),
    }
  }

  /// Qualified auto-wire for the type.
  pub fn qualified(qualifier: impl Into<String>, type_name: impl Into<String>) -> Self {
    Self {
      qualifier: Some(qualifier.into()),
      type_name: type_name.into(),
    }
  }
}

impl fmt::Display for AutoWire {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.qualifier {
      Some(qualifier) => write!(f, "{}:{}", qualifier, self.type_name),
      None => write!(f, "{}", self.type_name),
    }
  }
}
