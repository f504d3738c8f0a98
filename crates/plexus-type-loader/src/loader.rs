use async_trait::async_trait;

use crate::error::LoadError;
use crate::manifest::TypeManifest;

/// Loads the declared capabilities of a type by name.
#[async_trait]
pub trait TypeLoader: Send + Sync {
  /// Load the manifest of the type. Returns None if the type is unknown.
  async fn load(&self, type_name: &str) -> Result<Option<TypeManifest>, LoadError>;
}
