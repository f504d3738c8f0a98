use thiserror::Error;

/// Errors that can occur while loading a type.
#[derive(Debug, Error)]
pub enum LoadError {
  /// Type name can not be mapped to a manifest location.
  #[error("invalid type name: {type_name}")]
  InvalidTypeName { type_name: String },

  #[error("failed to parse manifest for type '{type_name}': {source}")]
  Parse {
    type_name: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
