use std::collections::HashSet;

use tracing::debug;

use crate::context::NodeContext;
use crate::node::{NodeId, NodeKind};

/// Single outgoing reference slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSlot {
  /// Flows, escalations, section inputs/outputs and source flows.
  Flow,
  /// Responsible team of a function.
  Team,
  /// Resource bound to an object or dependency.
  Object,
  /// Oversight of a team.
  Oversight,
}

/// Result of following a chain of links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FurthestTarget {
  /// Last node reached.
  pub target: NodeId,
  /// Nodes passed through, from the first link target up to (and including) `target`.
  pub path: Vec<NodeId>,
}

impl<S> NodeContext<'_, S> {
  /// Link the source's slot to the target.
  ///
  /// Linking to the already linked target is a no-op success. Linking to a
  /// different target reports an issue against the source and leaves the
  /// existing link in place.
  pub fn link(&mut self, source: NodeId, slot: LinkSlot, target: NodeId) -> bool {
    match self.node(source).link(slot) {
      Some(existing) if existing == target => true,
      Some(_) => {
        let message = format!("{} {} already linked", self.kind(source), self.name(source));
        self.add_issue(source, message);
        false
      }
      None => {
        debug!(
          source = %self.qualified_name(source),
          target = %self.qualified_name(target),
          slot = ?slot,
          "linked"
        );
        self.nodes[source.0].links.insert(slot, target);
        true
      }
    }
  }

  /// The target of the source's slot, if linked. Reports nothing.
  pub fn linked(&self, source: NodeId, slot: LinkSlot) -> Option<NodeId> {
    self.node(source).link(slot)
  }

  /// One hop along the source's slot. Reports an issue when not linked.
  pub fn find_target(&mut self, source: NodeId, slot: LinkSlot) -> Option<NodeId> {
    let target = self.linked(source, slot);
    if target.is_none() {
      let message = format!("{} {} is not linked", self.kind(source), self.name(source));
      self.add_issue(source, message);
    }
    target
  }

  /// Follow the source's slot while the node reached is of a kind in `through`
  /// and is itself linked.
  ///
  /// The walk stops at the first node that is not of a pass-through kind or
  /// that has no link, so the first unlinked boundary reached is the result.
  /// Reports an issue when the source is not linked or the links form a cycle.
  pub fn find_furthest_target(
    &mut self,
    source: NodeId,
    slot: LinkSlot,
    through: &[NodeKind],
  ) -> Option<FurthestTarget> {
    let mut current = self.find_target(source, slot)?;
    let mut visited = HashSet::from([source]);
    let mut path = Vec::new();

    loop {
      if !visited.insert(current) {
        let message = format!(
          "{} {} has a cyclic link through {} {}",
          self.kind(source),
          self.name(source),
          self.kind(current),
          self.qualified_name(current)
        );
        self.add_issue(source, message);
        return None;
      }
      path.push(current);

      if !through.contains(&self.kind(current)) {
        break;
      }
      match self.linked(current, slot) {
        Some(next) => current = next,
        None => break,
      }
    }

    Some(FurthestTarget {
      target: current,
      path,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::issues::RecordingIssues;

  const THROUGH: &[NodeKind] = &[
    NodeKind::Escalation,
    NodeKind::SectionOutput,
    NodeKind::SectionInput,
  ];

  #[test]
  fn test_link_same_target_twice_is_noop() {
    let mut issues = RecordingIssues::new();
    {
      let mut ctx: NodeContext<'_, ()> = NodeContext::new(&mut issues);
      let office = ctx.root(NodeKind::Office, "shop");
      let flow = ctx.child(office, NodeKind::Flow, "next");
      let target = ctx.child(office, NodeKind::Function, "charge");

      assert!(ctx.link(flow, LinkSlot::Flow, target));
      assert!(ctx.link(flow, LinkSlot::Flow, target));
      assert_eq!(ctx.linked(flow, LinkSlot::Flow), Some(target));
    }
    assert!(issues.is_empty());
  }

  #[test]
  fn test_link_different_target_fails() {
    let mut issues = RecordingIssues::new();
    {
      let mut ctx: NodeContext<'_, ()> = NodeContext::new(&mut issues);
      let office = ctx.root(NodeKind::Office, "shop");
      let flow = ctx.child(office, NodeKind::Flow, "next");
      let first = ctx.child(office, NodeKind::Function, "charge");
      let second = ctx.child(office, NodeKind::Function, "refund");

      assert!(ctx.link(flow, LinkSlot::Flow, first));
      assert!(!ctx.link(flow, LinkSlot::Flow, second));
      // existing link kept
      assert_eq!(ctx.linked(flow, LinkSlot::Flow), Some(first));
      // slots are independent
      assert!(ctx.link(flow, LinkSlot::Team, second));
    }
    assert_eq!(issues.issues().len(), 1);
    assert_eq!(issues.issues()[0].message, "Flow next already linked");
  }

  #[test]
  fn test_find_target_not_linked() {
    let mut issues = RecordingIssues::new();
    {
      let mut ctx: NodeContext<'_, ()> = NodeContext::new(&mut issues);
      let office = ctx.root(NodeKind::Office, "shop");
      let flow = ctx.child(office, NodeKind::Flow, "next");
      assert_eq!(ctx.find_target(flow, LinkSlot::Flow), None);
    }
    assert!(issues.contains("is not linked"));
  }

  #[test]
  fn test_find_furthest_target_follows_chain() {
    let mut issues = RecordingIssues::new();
    {
      let mut ctx: NodeContext<'_, ()> = NodeContext::new(&mut issues);
      let office = ctx.root(NodeKind::Office, "shop");
      let section = ctx.child(office, NodeKind::Section, "checkout");
      let escalation = ctx.child(section, NodeKind::Escalation, "shop.Declined");
      let output = ctx.child(section, NodeKind::SectionOutput, "failed");
      let input = ctx.child(section, NodeKind::SectionInput, "retry");
      let handler = ctx.child(section, NodeKind::Function, "handle");

      ctx.link(escalation, LinkSlot::Flow, output);
      ctx.link(output, LinkSlot::Flow, input);
      ctx.link(input, LinkSlot::Flow, handler);

      let furthest = ctx
        .find_furthest_target(escalation, LinkSlot::Flow, THROUGH)
        .unwrap();
      assert_eq!(furthest.target, handler);
      assert_eq!(furthest.path, vec![output, input, handler]);
    }
    assert!(issues.is_empty());
  }

  #[test]
  fn test_find_furthest_target_stops_at_first_unlinked() {
    let mut issues = RecordingIssues::new();
    let mut ctx: NodeContext<'_, ()> = NodeContext::new(&mut issues);
    let office = ctx.root(NodeKind::Office, "shop");
    let outer = ctx.child(office, NodeKind::Section, "checkout");
    let inner = ctx.child(outer, NodeKind::Section, "payment");
    let escalation = ctx.child(inner, NodeKind::Escalation, "shop.Declined");
    let inner_output = ctx.child(inner, NodeKind::SectionOutput, "failed");
    // outer output exists but the inner output is not linked to it
    let _outer_output = ctx.child(outer, NodeKind::SectionOutput, "failed");

    ctx.link(escalation, LinkSlot::Flow, inner_output);
    let furthest = ctx
      .find_furthest_target(escalation, LinkSlot::Flow, THROUGH)
      .unwrap();
    assert_eq!(furthest.target, inner_output);
  }

  #[test]
  fn test_find_furthest_target_cycle() {
    let mut issues = RecordingIssues::new();
    {
      let mut ctx: NodeContext<'_, ()> = NodeContext::new(&mut issues);
      let office = ctx.root(NodeKind::Office, "shop");
      let section = ctx.child(office, NodeKind::Section, "checkout");
      let escalation = ctx.child(section, NodeKind::Escalation, "shop.Declined");
      let a = ctx.child(section, NodeKind::SectionOutput, "a");
      let b = ctx.child(section, NodeKind::SectionOutput, "b");

      ctx.link(escalation, LinkSlot::Flow, a);
      ctx.link(a, LinkSlot::Flow, b);
      ctx.link(b, LinkSlot::Flow, a);

      assert_eq!(
        ctx.find_furthest_target(escalation, LinkSlot::Flow, THROUGH),
        None
      );
    }
    assert_eq!(issues.issues().len(), 1);
    assert!(issues.contains("cyclic link"));
  }
}
