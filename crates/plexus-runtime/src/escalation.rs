use std::fmt;

/// Failure raised by function logic, handled along the escalation chain
/// compiled for the function.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
  /// Type name, matched against the escalation types of the function.
  pub error_type: String,
  pub message: String,
  pub payload: serde_json::Value,
}

impl Escalation {
  pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      error_type: error_type.into(),
      message: message.into(),
      payload: serde_json::Value::Null,
    }
  }

  pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
    self.payload = payload;
    self
  }

  /// Parameter passed to a handling function.
  pub fn to_parameter(&self) -> serde_json::Value {
    serde_json::json!({
      "error_type": self.error_type,
      "message": self.message,
      "payload": self.payload,
    })
  }
}

impl fmt::Display for Escalation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.error_type, self.message)
  }
}

impl std::error::Error for Escalation {}
