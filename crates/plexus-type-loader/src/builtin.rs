use crate::manifest::{TeamType, TypeManifest};

/// Parameter type accepting any argument.
pub const ANY_TYPE: &str = "plexus.Any";

/// Parameter type of a function able to recycle resources.
pub const RECYCLE_PARAMETER_TYPE: &str = "plexus.RecycleParameter";

/// Team with a fixed number of workers. Must be sized.
pub const FIXED_TEAM: &str = "plexus.team.fixed";

/// Team spawning a worker per job.
pub const SPAWN_TEAM: &str = "plexus.team.spawn";

/// Team running jobs on the thread of control that assigns them.
pub const PASSIVE_TEAM: &str = "plexus.team.passive";

/// Manifest of a type provided by plexus itself.
pub fn builtin_type(type_name: &str) -> Option<TypeManifest> {
  let requires_size = match type_name {
    FIXED_TEAM => true,
    SPAWN_TEAM | PASSIVE_TEAM => false,
    _ => return None,
  };
  Some(TypeManifest::Team(TeamType {
    requires_size,
    required_properties: Vec::new(),
  }))
}

/// Whether a value of the argument type may be passed to the parameter type.
///
/// A missing argument is always accepted. A missing parameter accepts anything
/// (the argument is dropped).
pub fn is_assignable(argument: Option<&str>, parameter: Option<&str>) -> bool {
  match (argument, parameter) {
    (None, _) | (_, None) => true,
    (Some(_), Some(ANY_TYPE)) => true,
    (Some(argument), Some(parameter)) => argument == parameter,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_teams() {
    match builtin_type(FIXED_TEAM) {
      Some(TypeManifest::Team(team)) => assert!(team.requires_size),
      other => panic!("unexpected manifest: {:?}", other),
    }
    match builtin_type(PASSIVE_TEAM) {
      Some(TypeManifest::Team(team)) => assert!(!team.requires_size),
      other => panic!("unexpected manifest: {:?}", other),
    }
    assert!(builtin_type("shop.Charge").is_none());
  }

  #[test]
  fn test_is_assignable() {
    assert!(is_assignable(Some("shop.Order"), Some("shop.Order")));
    assert!(is_assignable(Some("shop.Order"), Some(ANY_TYPE)));
    assert!(is_assignable(None, Some("shop.Order")));
    assert!(is_assignable(Some("shop.Order"), None));
    assert!(!is_assignable(Some("shop.Order"), Some("shop.Receipt")));
  }
}
