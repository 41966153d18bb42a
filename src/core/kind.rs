//! Kinds: `*` and function kinds over kinds.

use std::fmt;
use std::sync::Arc;

/// A kind. The only constant is `*`, the kind of inhabited types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
  /// `*`
  Star,
  /// `left -> right`
  Fun(Arc<Kind>, Arc<Kind>),
}

impl Kind {
  pub fn star() -> Self {
    Kind::Star
  }

  pub fn fun(left: Kind, right: Kind) -> Self {
    Kind::Fun(Arc::new(left), Arc::new(right))
  }

  /// Right-folds `[k1, k2, ..., kn]` into `k1 -> k2 -> ... -> kn`.
  /// An empty slice yields `*`.
  pub fn fun_from(kinds: &[Kind]) -> Self {
    let mut iter = kinds.iter().rev();
    match iter.next() {
      None => Kind::Star,
      Some(last) => {
        iter.fold(last.clone(), |acc, k| Kind::fun(k.clone(), acc))
      },
    }
  }

  /// Splits `k1 -> ... -> kn -> r` into `([k1, ..., kn], r)`.
  pub fn spine(&self) -> (Vec<&Kind>, &Kind) {
    let mut args = vec![];
    let mut curr = self;
    while let Kind::Fun(l, r) = curr {
      args.push(l.as_ref());
      curr = r.as_ref();
    }
    (args, curr)
  }

  /// Number of arguments before reaching the result kind.
  pub fn arity(&self) -> usize {
    match self {
      Kind::Star => 0,
      Kind::Fun(_, r) => 1 + r.arity(),
    }
  }

  pub fn is_fun(&self) -> bool {
    matches!(self, Kind::Fun(..))
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Kind::Star => write!(f, "*"),
      Kind::Fun(..) => {
        let (args, res) = self.spine();
        for arg in args {
          if arg.is_fun() {
            write!(f, "({arg}) -> ")?;
          } else {
            write!(f, "{arg} -> ")?;
          }
        }
        write!(f, "{res}")
      },
    }
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;
  use crate::core::tests::next_case;
  use quickcheck::{Arbitrary, Gen};

  #[derive(Clone, Copy)]
  enum Case {
    Star,
    Fun,
  }

  pub fn arbitrary_kind(g: &mut Gen, depth: usize) -> Kind {
    let fun_weight = if depth == 0 { 0 } else { 30 };
    match next_case(g, &[(70, Case::Star), (fun_weight, Case::Fun)]) {
      Case::Star => Kind::Star,
      Case::Fun => Kind::fun(
        arbitrary_kind(g, depth - 1),
        arbitrary_kind(g, depth - 1),
      ),
    }
  }

  impl Arbitrary for Kind {
    fn arbitrary(g: &mut Gen) -> Self {
      arbitrary_kind(g, 4)
    }
  }

  #[test]
  fn fun_from_is_right_nested() {
    let k = Kind::fun_from(&[Kind::star(), Kind::star(), Kind::star()]);
    assert_eq!(
      k,
      Kind::fun(Kind::star(), Kind::fun(Kind::star(), Kind::star()))
    );
    assert_eq!(Kind::fun_from(&[]), Kind::star());
    assert_eq!(k.arity(), 2);
    assert_eq!(Kind::star().arity(), 0);
  }

  #[test]
  fn display() {
    let hk = Kind::fun(Kind::fun(Kind::star(), Kind::star()), Kind::star());
    assert_eq!(hk.to_string(), "(* -> *) -> *");
    let k = Kind::fun_from(&[Kind::star(), Kind::star(), Kind::star()]);
    assert_eq!(k.to_string(), "* -> * -> *");
  }
}
