//! Ordered property lists.
//!
//! Properties configure the types behind functions, teams, resource sources,
//! governances and administrations. Order is preserved so that the hosting
//! runtime sees them as declared. The office may override the properties of
//! any node by its qualified name:
//!
//! ```json
//! { "qualified_name": "billing.charge", "properties": [{ "name": "retries", "value": "3" }] }
//! ```

use serde::{Deserialize, Serialize};

/// A single name/value property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
  pub name: String,
  pub value: String,
}

/// Ordered list of properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyList(Vec<Property>);

impl PropertyList {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a property, replacing the value of an existing property of the same name.
  pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
    let name = name.into();
    let value = value.into();
    match self.0.iter_mut().find(|p| p.name == name) {
      Some(existing) => existing.value = value,
      None => self.0.push(Property { name, value }),
    }
    self
  }

  /// Value of the named property.
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|p| p.name == name)
      .map(|p| p.value.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = &Property> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// New list with the overrides applied.
  ///
  /// Overridden properties keep their original position; new properties are
  /// appended in override order.
  pub fn override_with(&self, overrides: &PropertyList) -> PropertyList {
    let mut merged = self.clone();
    for property in overrides.iter() {
      merged.add(property.name.clone(), property.value.clone());
    }
    merged
  }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for PropertyList {
  fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
    let mut list = PropertyList::new();
    for (name, value) in iter {
      list.add(name, value);
    }
    list
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_add_replaces_existing() {
    let mut list = PropertyList::new();
    list.add("a", "1").add("b", "2").add("a", "3");

    assert_eq!(list.len(), 2);
    assert_eq!(list.get("a"), Some("3"));
    assert_eq!(list.get("missing"), None);
  }

  #[test]
  fn test_override_keeps_order() {
    let base: PropertyList = [("host", "localhost"), ("port", "80")].into_iter().collect();
    let overrides: PropertyList = [("timeout", "5"), ("port", "8080")].into_iter().collect();

    let merged = base.override_with(&overrides);
    let names: Vec<&str> = merged.iter().map(|p| p.name.as_str()).collect();

    assert_eq!(names, vec!["host", "port", "timeout"]);
    assert_eq!(merged.get("port"), Some("8080"));
    // original untouched
    assert_eq!(base.get("port"), Some("80"));
  }

  #[test]
  fn test_serializes_as_list() {
    let list: PropertyList = [("a", "1")].into_iter().collect();
    let json = serde_json::to_value(&list).unwrap();
    assert_eq!(json, serde_json::json!([{ "name": "a", "value": "1" }]));
  }
}
