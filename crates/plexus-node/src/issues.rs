use std::fmt;

use tracing::warn;

use crate::node::NodeKind;

/// Node an issue is reported against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueTarget {
  pub kind: NodeKind,
  /// Qualified name of the node, e.g. "checkout.charge"
  pub name: String,
}

impl IssueTarget {
  pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
    Self {
      kind,
      name: name.into(),
    }
  }
}

impl fmt::Display for IssueTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.kind, self.name)
  }
}

/// A build-time problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
  pub target: IssueTarget,
  pub message: String,
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.target, self.message)
  }
}

/// Sink for build-time issues.
///
/// The only channel through which linking and compiling report failures.
pub trait CompilerIssues {
  fn add_issue(&mut self, target: IssueTarget, message: String);
}

/// Collects issues for later inspection.
#[derive(Debug, Default)]
pub struct RecordingIssues {
  issues: Vec<Issue>,
}

impl RecordingIssues {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn issues(&self) -> &[Issue] {
    &self.issues
  }

  pub fn into_issues(self) -> Vec<Issue> {
    self.issues
  }

  pub fn is_empty(&self) -> bool {
    self.issues.is_empty()
  }

  /// Whether any issue message contains the text.
  pub fn contains(&self, text: &str) -> bool {
    self.issues.iter().any(|i| i.message.contains(text))
  }
}

impl CompilerIssues for RecordingIssues {
  fn add_issue(&mut self, target: IssueTarget, message: String) {
    self.issues.push(Issue { target, message });
  }
}

/// Logs issues as warnings and counts them.
#[derive(Debug, Default)]
pub struct TracingIssues {
  count: usize,
}

impl TracingIssues {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn count(&self) -> usize {
    self.count
  }
}

impl CompilerIssues for TracingIssues {
  fn add_issue(&mut self, target: IssueTarget, message: String) {
    self.count += 1;
    warn!(kind = %target.kind, node = %target.name, "{}", message);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_recording_issues() {
    let mut issues = RecordingIssues::new();
    issues.add_issue(
      IssueTarget::new(NodeKind::Team, "payments"),
      "Team size must be specified".to_string(),
    );

    assert!(issues.contains("size must be specified"));
    assert_eq!(
      issues.issues()[0].to_string(),
      "Team payments: Team size must be specified"
    );
  }
}
