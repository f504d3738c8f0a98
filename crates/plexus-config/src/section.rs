use serde::{Deserialize, Serialize};

use crate::function::FunctionDef;
use crate::link::LinkRef;

/// A namespace of functions with inputs and outputs at its boundary.
///
/// Sections nest. Functions are addressed by qualified name, e.g.
/// `billing.payment.charge` for function `charge` of sub-section `payment` of
/// top-level section `billing`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionDef {
  pub name: String,
  #[serde(default)]
  pub functions: Vec<FunctionDef>,
  #[serde(default)]
  pub inputs: Vec<SectionInputDef>,
  #[serde(default)]
  pub outputs: Vec<SectionOutputDef>,
  #[serde(default)]
  pub subsections: Vec<SectionDef>,
  /// Governances applied to every function of this section and its sub-sections.
  #[serde(default)]
  pub governances: Vec<String>,
}

impl SectionDef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }
}

/// An entry into the section, linked to one of its functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInputDef {
  pub name: String,
  pub function: String,
}

/// An exit from the section.
///
/// The target resolves in the parent scope. An unlinked output of a top-level
/// section is a boundary of the office: flows reaching it leave the office and
/// escalations reaching it are handled by the office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutputDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<LinkRef>,
  /// Output only carries escalations.
  #[serde(default)]
  pub escalation_only: bool,
}
