use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::link::LinkSlot;

/// Index of a node within its [`NodeContext`](crate::NodeContext) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
  pub fn index(&self) -> usize {
    self.0
  }
}

/// Kind of configuration element a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
  Office,
  Section,
  SectionInput,
  SectionOutput,
  Function,
  Flow,
  Object,
  Escalation,
  Team,
  Oversight,
  Governance,
  Administration,
  ResourceSource,
  Resource,
  SourceFlow,
  ExecutionStrategy,
  OfficeEscalation,
}

impl NodeKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      NodeKind::Office => "Office",
      NodeKind::Section => "Section",
      NodeKind::SectionInput => "Section Input",
      NodeKind::SectionOutput => "Section Output",
      NodeKind::Function => "Function",
      NodeKind::Flow => "Flow",
      NodeKind::Object => "Object",
      NodeKind::Escalation => "Escalation",
      NodeKind::Team => "Team",
      NodeKind::Oversight => "Oversight",
      NodeKind::Governance => "Governance",
      NodeKind::Administration => "Administration",
      NodeKind::ResourceSource => "Resource Source",
      NodeKind::Resource => "Resource",
      NodeKind::SourceFlow => "Source Flow",
      NodeKind::ExecutionStrategy => "Execution Strategy",
      NodeKind::OfficeEscalation => "Office Escalation",
    }
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Lazily bound state of a node.
///
/// A node starts `Unbound`. The first [`initialise`](NodeState::initialise)
/// binds it; every later call returns the bound state untouched, so a node may
/// be referenced before it is declared and declared before it is referenced.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeState<T> {
  #[default]
  Unbound,
  Bound(T),
}

impl<T> NodeState<T> {
  /// Bind the state if unbound and return the bound state.
  pub fn initialise(&mut self, init: impl FnOnce() -> T) -> &T {
    if let NodeState::Unbound = self {
      *self = NodeState::Bound(init());
    }
    match self {
      NodeState::Bound(state) => state,
      NodeState::Unbound => unreachable!("node state bound above"),
    }
  }

  pub fn is_initialised(&self) -> bool {
    matches!(self, NodeState::Bound(_))
  }

  pub fn get(&self) -> Option<&T> {
    match self {
      NodeState::Bound(state) => Some(state),
      NodeState::Unbound => None,
    }
  }
}

/// A configuration element within the node graph.
#[derive(Debug)]
pub struct Node<S> {
  pub(crate) name: String,
  pub(crate) kind: NodeKind,
  pub(crate) parent: Option<NodeId>,
  pub(crate) children: IndexMap<(NodeKind, String), NodeId>,
  pub(crate) links: HashMap<LinkSlot, NodeId>,
  pub(crate) state: NodeState<S>,
}

impl<S> Node<S> {
  pub(crate) fn new(kind: NodeKind, name: String, parent: Option<NodeId>) -> Self {
    Self {
      name,
      kind,
      parent,
      children: IndexMap::new(),
      links: HashMap::new(),
      state: NodeState::Unbound,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> NodeKind {
    self.kind
  }

  pub fn parent(&self) -> Option<NodeId> {
    self.parent
  }

  pub fn state(&self) -> Option<&S> {
    self.state.get()
  }

  pub fn link(&self, slot: LinkSlot) -> Option<NodeId> {
    self.links.get(&slot).copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_initialise_twice_keeps_first_state() {
    let mut state = NodeState::Unbound;
    assert!(!state.is_initialised());
    assert_eq!(state.get(), None);

    assert_eq!(*state.initialise(|| "first"), "first");
    assert!(state.is_initialised());

    assert_eq!(*state.initialise(|| "second"), "first");
    assert!(state.is_initialised());
    assert_eq!(state.get(), Some(&"first"));
  }

  #[test]
  fn test_initialise_runs_init_once() {
    let mut calls = 0;
    let mut state = NodeState::Unbound;
    state.initialise(|| {
      calls += 1;
      1
    });
    state.initialise(|| {
      calls += 1;
      2
    });
    assert_eq!(calls, 1);
  }
}
