use crate::issues::{CompilerIssues, IssueTarget};
use crate::node::{Node, NodeId, NodeKind};

/// Arena of nodes together with the issue sink they report to.
///
/// The context is passed explicitly to everything that creates, links or
/// queries nodes. `S` is the state a node is bound with once declared.
pub struct NodeContext<'i, S> {
  pub(crate) nodes: Vec<Node<S>>,
  issues: &'i mut dyn CompilerIssues,
}

impl<'i, S> NodeContext<'i, S> {
  pub fn new(issues: &'i mut dyn CompilerIssues) -> Self {
    Self {
      nodes: Vec::new(),
      issues,
    }
  }

  /// Create a node without a parent.
  pub fn root(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
    self.push(Node::new(kind, name.into(), None))
  }

  /// The child of the kind and name, created on first access.
  pub fn child(&mut self, parent: NodeId, kind: NodeKind, name: &str) -> NodeId {
    if let Some(existing) = self.find_child(parent, kind, name) {
      return existing;
    }
    let id = self.push(Node::new(kind, name.to_string(), Some(parent)));
    self.nodes[parent.0]
      .children
      .insert((kind, name.to_string()), id);
    id
  }

  /// The child of the kind and name, if it has been created.
  pub fn find_child(&self, parent: NodeId, kind: NodeKind, name: &str) -> Option<NodeId> {
    self.nodes[parent.0]
      .children
      .get(&(kind, name.to_string()))
      .copied()
  }

  /// Created children of the kind, in creation order.
  pub fn children(&self, parent: NodeId, kind: NodeKind) -> Vec<NodeId> {
    self.nodes[parent.0]
      .children
      .iter()
      .filter(|((child_kind, _), _)| *child_kind == kind)
      .map(|(_, id)| *id)
      .collect()
  }

  pub fn node(&self, id: NodeId) -> &Node<S> {
    &self.nodes[id.0]
  }

  pub fn name(&self, id: NodeId) -> &str {
    &self.nodes[id.0].name
  }

  pub fn kind(&self, id: NodeId) -> NodeKind {
    self.nodes[id.0].kind
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.nodes[id.0].parent
  }

  /// Dot separated names from below the root down to the node.
  pub fn qualified_name(&self, id: NodeId) -> String {
    let mut names = Vec::new();
    let mut current = Some(id);
    while let Some(node_id) = current {
      let node = &self.nodes[node_id.0];
      if node.parent.is_none() {
        break;
      }
      names.push(node.name.as_str());
      current = node.parent;
    }
    names.reverse();
    names.join(".")
  }

  /// Bind the node's state if unbound. The first state bound always wins.
  pub fn initialise(&mut self, id: NodeId, init: impl FnOnce() -> S) -> &S {
    self.nodes[id.0].state.initialise(init)
  }

  pub fn is_initialised(&self, id: NodeId) -> bool {
    self.nodes[id.0].state.is_initialised()
  }

  pub fn state(&self, id: NodeId) -> Option<&S> {
    self.nodes[id.0].state.get()
  }

  pub fn issue_target(&self, id: NodeId) -> IssueTarget {
    IssueTarget::new(self.kind(id), self.qualified_name(id))
  }

  /// Report an issue against the node.
  pub fn add_issue(&mut self, id: NodeId, message: impl Into<String>) {
    let target = self.issue_target(id);
    self.issues.add_issue(target, message.into());
  }

  pub fn issues(&mut self) -> &mut dyn CompilerIssues {
    &mut *self.issues
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  fn push(&mut self, node: Node<S>) -> NodeId {
    let id = NodeId(self.nodes.len());
    self.nodes.push(node);
    id
  }
}
