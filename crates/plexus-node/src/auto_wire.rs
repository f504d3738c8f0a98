use plexus_config::AutoWire;

/// Outcome of matching a consumer against the candidate providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoWireMatch<T> {
  /// No provider offers any of the required capabilities.
  None,
  Single(T),
  /// Several providers qualify. Never resolved by picking one.
  Ambiguous(Vec<T>),
}

impl<T> AutoWireMatch<T> {
  pub fn single(self) -> Option<T> {
    match self {
      AutoWireMatch::Single(provider) => Some(provider),
      _ => None,
    }
  }
}

/// Matches consumers to providers by type and qualifier.
///
/// A provider qualifies when any of its capabilities equals any of the
/// consumer's required capabilities. A match is only accepted when exactly one
/// provider qualifies.
#[derive(Debug, Clone)]
pub struct AutoWirer<T> {
  candidates: Vec<(T, Vec<AutoWire>)>,
}

impl<T> Default for AutoWirer<T> {
  fn default() -> Self {
    Self {
      candidates: Vec::new(),
    }
  }
}

impl<T: Clone> AutoWirer<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_candidate(&mut self, provider: T, capabilities: impl IntoIterator<Item = AutoWire>) {
    self
      .candidates
      .push((provider, capabilities.into_iter().collect()));
  }

  pub fn is_empty(&self) -> bool {
    self.candidates.is_empty()
  }

  pub fn find_match(&self, required: &[AutoWire]) -> AutoWireMatch<T> {
    let mut matched: Vec<T> = self
      .candidates
      .iter()
      .filter(|(_, capabilities)| capabilities.iter().any(|c| required.contains(c)))
      .map(|(provider, _)| provider.clone())
      .collect();

    match matched.len() {
      0 => AutoWireMatch::None,
      1 => AutoWireMatch::Single(matched.remove(0)),
      _ => AutoWireMatch::Ambiguous(matched),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn wirer() -> AutoWirer<&'static str> {
    let mut wirer = AutoWirer::new();
    wirer.add_candidate("primary_db", [AutoWire::qualified("primary", "db.Connection")]);
    wirer.add_candidate("replica_db", [AutoWire::qualified("replica", "db.Connection")]);
    wirer.add_candidate("cache", [AutoWire::new("cache.Client"), AutoWire::new("kv.Store")]);
    wirer.add_candidate("kv", [AutoWire::new("kv.Store")]);
    wirer
  }

  #[test]
  fn test_single_match() {
    let found = wirer().find_match(&[AutoWire::qualified("primary", "db.Connection")]);
    assert_eq!(found, AutoWireMatch::Single("primary_db"));
  }

  #[test]
  fn test_provider_matching_several_capabilities_counts_once() {
    let mut wirer = AutoWirer::new();
    wirer.add_candidate("cache", [AutoWire::new("cache.Client"), AutoWire::new("kv.Store")]);

    let found = wirer.find_match(&[AutoWire::new("cache.Client"), AutoWire::new("kv.Store")]);
    assert_eq!(found, AutoWireMatch::Single("cache"));
  }

  #[test]
  fn test_no_match() {
    assert_eq!(
      wirer().find_match(&[AutoWire::new("db.Connection")]),
      AutoWireMatch::None
    );
    assert_eq!(wirer().find_match(&[]), AutoWireMatch::None);
  }

  #[test]
  fn test_ambiguous_match_is_not_resolved() {
    let found = wirer().find_match(&[AutoWire::new("kv.Store")]);
    assert_eq!(found, AutoWireMatch::Ambiguous(vec!["cache", "kv"]));
    assert_eq!(found.single(), None);
  }
}
