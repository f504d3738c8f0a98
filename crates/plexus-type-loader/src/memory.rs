use std::collections::HashMap;

use async_trait::async_trait;

use crate::builtin::builtin_type;
use crate::error::LoadError;
use crate::loader::TypeLoader;
use crate::manifest::TypeManifest;

/// Type loader over manifests registered in code.
///
/// Used by hosts that register their logic programmatically, and by tests.
/// Built-in types are always available.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTypeLoader {
  types: HashMap<String, TypeManifest>,
}

impl InMemoryTypeLoader {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a manifest, replacing any previous manifest of the type.
  pub fn register(&mut self, type_name: impl Into<String>, manifest: TypeManifest) -> &mut Self {
    self.types.insert(type_name.into(), manifest);
    self
  }

  pub fn with(mut self, type_name: impl Into<String>, manifest: TypeManifest) -> Self {
    self.register(type_name, manifest);
    self
  }
}

#[async_trait]
impl TypeLoader for InMemoryTypeLoader {
  async fn load(&self, type_name: &str) -> Result<Option<TypeManifest>, LoadError> {
    Ok(
      self
        .types
        .get(type_name)
        .cloned()
        .or_else(|| builtin_type(type_name)),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtin::SPAWN_TEAM;
  use crate::manifest::{FunctionType, GovernanceType};

  #[tokio::test]
  async fn test_load_registered_and_builtin() {
    let loader = InMemoryTypeLoader::new()
      .with("shop.Charge", TypeManifest::Function(FunctionType::default()))
      .with(
        "tx.Transaction",
        TypeManifest::Governance(GovernanceType::default()),
      );

    assert!(matches!(
      loader.load("shop.Charge").await.unwrap(),
      Some(TypeManifest::Function(_))
    ));
    assert!(matches!(
      loader.load(SPAWN_TEAM).await.unwrap(),
      Some(TypeManifest::Team(_))
    ));
    assert!(loader.load("shop.Missing").await.unwrap().is_none());
  }
}
