use crate::node::NodeState;

type Pending<'a, C, R> = Box<dyn FnOnce(&C) -> R + 'a>;

/// Deferred completion of work that needs a context not yet available.
///
/// Work registered through [`on_bound`](Binder::on_bound) before the context
/// is bound is queued and run, in registration order, by
/// [`bind`](Binder::bind). Work registered after binding runs immediately.
pub struct Binder<'a, C, R> {
  context: NodeState<C>,
  pending: Vec<Pending<'a, C, R>>,
  completed: Vec<R>,
}

impl<'a, C, R> Default for Binder<'a, C, R> {
  fn default() -> Self {
    Self {
      context: NodeState::Unbound,
      pending: Vec::new(),
      completed: Vec::new(),
    }
  }
}

impl<'a, C, R> Binder<'a, C, R> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on_bound(&mut self, callback: impl FnOnce(&C) -> R + 'a) {
    match self.context.get() {
      Some(context) => {
        let result = callback(context);
        self.completed.push(result);
      }
      None => self.pending.push(Box::new(callback)),
    }
  }

  /// Bind the context and drain the pending work. Binding again is ignored.
  pub fn bind(&mut self, context: C) {
    if self.context.is_initialised() {
      return;
    }
    let context = self.context.initialise(|| context);
    for callback in self.pending.drain(..) {
      self.completed.push(callback(context));
    }
  }

  pub fn is_bound(&self) -> bool {
    self.context.is_initialised()
  }

  pub fn context(&self) -> Option<&C> {
    self.context.get()
  }

  pub fn pending(&self) -> usize {
    self.pending.len()
  }

  pub fn completed(&self) -> &[R] {
    &self.completed
  }

  pub fn into_completed(self) -> Vec<R> {
    self.completed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pending_until_bound() {
    let mut binder: Binder<'_, String, String> = Binder::new();
    binder.on_bound(|office| format!("{}.db", office));
    binder.on_bound(|office| format!("{}.cache", office));

    assert!(!binder.is_bound());
    assert_eq!(binder.pending(), 2);
    assert!(binder.completed().is_empty());

    binder.bind("shop".to_string());
    assert_eq!(binder.pending(), 0);
    assert_eq!(binder.completed(), &["shop.db", "shop.cache"]);
  }

  #[test]
  fn test_registration_after_bind_completes_immediately() {
    let mut binder: Binder<'_, String, String> = Binder::new();
    binder.bind("shop".to_string());
    binder.on_bound(|office| format!("{}.db", office));

    assert_eq!(binder.pending(), 0);
    assert_eq!(binder.completed(), &["shop.db"]);
  }

  #[test]
  fn test_bind_twice_keeps_first_context() {
    let mut binder: Binder<'_, &str, usize> = Binder::new();
    binder.bind("first");
    binder.bind("second");
    assert_eq!(binder.context(), Some(&"first"));
  }
}
