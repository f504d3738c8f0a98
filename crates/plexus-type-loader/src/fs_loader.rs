use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::builtin::builtin_type;
use crate::error::LoadError;
use crate::loader::TypeLoader;
use crate::manifest::TypeManifest;

/// Filesystem-based type loader.
///
/// Each type is described by a JSON manifest named after the type:
/// ```text
/// {root}/
/// ├── shop.Charge.json
/// └── db.Pool.json
/// ```
pub struct FsTypeLoader {
  root: PathBuf,
}

impl FsTypeLoader {
  /// Create a new filesystem loader at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the loader.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Path of the manifest for the type.
  /// Example: "shop.Charge" -> "{root}/shop.Charge.json"
  fn manifest_path(&self, type_name: &str) -> Result<PathBuf, LoadError> {
    let valid = !type_name.is_empty()
      && !type_name.starts_with('.')
      && type_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
      return Err(LoadError::InvalidTypeName {
        type_name: type_name.to_string(),
      });
    }
    Ok(self.root.join(format!("{}.json", type_name)))
  }
}

#[async_trait]
impl TypeLoader for FsTypeLoader {
  async fn load(&self, type_name: &str) -> Result<Option<TypeManifest>, LoadError> {
    if let Some(manifest) = builtin_type(type_name) {
      return Ok(Some(manifest));
    }

    let path = self.manifest_path(type_name)?;
    let content = match fs::read_to_string(&path).await {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let manifest = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
      type_name: type_name.to_string(),
      source,
    })?;
    Ok(Some(manifest))
  }
}
