//! Persistent, prepend-only lists used as binder contexts.
//!
//! Pushing shares the tail, so a context extended in one branch of a
//! traversal is invisible to its siblings. Index 0 is the most recently
//! pushed element, which is exactly de Bruijn indexing.

use std::sync::Arc;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConsList<T> {
  Nil,
  Cons(T, Arc<ConsList<T>>, usize),
}

impl<T> Default for ConsList<T> {
  fn default() -> Self {
    ConsList::Nil
  }
}

struct ConsListIter<'a, T>(&'a ConsList<T>);

impl<'a, T> Iterator for ConsListIter<'a, T> {
  type Item = &'a T;
  fn next(&mut self) -> Option<Self::Item> {
    match self.0 {
      ConsList::Nil => None,
      ConsList::Cons(t, tail, _) => {
        self.0 = tail;
        Some(t)
      },
    }
  }
}

impl<T> ConsList<T> {
  pub fn new() -> Self {
    ConsList::Nil
  }

  /// Returns a new list with `t` in front; `self` is unchanged.
  #[inline]
  pub fn cons(&self, t: T) -> Self
  where
    T: Clone,
  {
    ConsList::Cons(t, Arc::new(self.clone()), self.len() + 1)
  }

  #[inline]
  pub fn len(&self) -> usize {
    match self {
      ConsList::Nil => 0,
      ConsList::Cons(.., len) => *len,
    }
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    matches!(self, ConsList::Nil)
  }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    ConsListIter(self)
  }

  /// The element `idx` positions from the front.
  pub fn get(&self, idx: u64) -> Option<&T> {
    let idx = usize::try_from(idx).ok()?;
    if idx >= self.len() {
      return None;
    }
    self.iter().nth(idx)
  }

  /// The first element satisfying `pred`, with its distance from the front.
  pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<(u64, &T)> {
    self.iter().enumerate().find(|(_, t)| pred(t)).map(|(i, t)| (i as u64, t))
  }
}
