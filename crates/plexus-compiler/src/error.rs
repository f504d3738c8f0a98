use plexus_node::Issue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
  /// Office compiled with issues.
  #[error("office '{office}' has {} issue(s)", .issues.len())]
  Issues { office: String, issues: Vec<Issue> },
}

impl CompileError {
  pub fn issues(&self) -> &[Issue] {
    match self {
      CompileError::Issues { issues, .. } => issues,
    }
  }
}
