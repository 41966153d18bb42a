//! De Bruijn indexed types and type definitions.

use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

use super::address::Address;
use super::kind::Kind;

/// Type constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TCon {
  /// The function type constructor `->`, of kind `* -> * -> *`.
  Fun,
  /// Bytes, of kind `*`.
  Byte,
}

impl fmt::Display for TCon {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TCon::Fun => write!(f, "->"),
      TCon::Byte => write!(f, "Byte"),
    }
  }
}

/// A core type.
///
/// Variables count binders outward from the innermost `Forall`. Function
/// types have no constructor of their own: `a -> b` is
/// `App(App(Con(Fun), a), b)`, see [`Type::fun`] and [`Type::as_fun`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
  Con(TCon),
  Var(u64),
  App(Arc<Type>, Arc<Type>),
  Forall(Kind, Arc<Type>),
  /// Reference to a stored type definition.
  Hash(Address),
}

impl Type {
  pub fn var(idx: u64) -> Self {
    Type::Var(idx)
  }

  pub fn byte() -> Self {
    Type::Con(TCon::Byte)
  }

  pub fn app(f: Type, a: Type) -> Self {
    Type::App(Arc::new(f), Arc::new(a))
  }

  pub fn forall(kind: Kind, body: Type) -> Self {
    Type::Forall(kind, Arc::new(body))
  }

  pub fn fun(a: Type, b: Type) -> Self {
    Type::app(Type::app(Type::Con(TCon::Fun), a), b)
  }

  /// `[t1, ..., tn]` into `t1 -> ... -> tn`, `None` for an empty slice.
  pub fn fun_from(ts: &[Type]) -> Option<Self> {
    let mut iter = ts.iter().rev();
    let last = iter.next()?.clone();
    Some(iter.fold(last, |acc, t| Type::fun(t.clone(), acc)))
  }

  /// Left-folds `head t1 ... tn`.
  pub fn app_from(head: Type, args: impl IntoIterator<Item = Type>) -> Self {
    args.into_iter().fold(head, Type::app)
  }

  /// Wraps `body` in one `Forall` per kind, the first kind outermost.
  pub fn foralls(kinds: &[Kind], body: Type) -> Self {
    kinds.iter().rev().fold(body, |acc, k| Type::forall(k.clone(), acc))
  }

  /// Decomposes `a -> b` into `(a, b)`.
  pub fn as_fun(&self) -> Option<(&Type, &Type)> {
    match self {
      Type::App(l, b) => match l.as_ref() {
        Type::App(c, a) if matches!(c.as_ref(), Type::Con(TCon::Fun)) => {
          Some((a.as_ref(), b.as_ref()))
        },
        _ => None,
      },
      _ => None,
    }
  }

  pub fn is_fun(&self) -> bool {
    self.as_fun().is_some()
  }

  /// Splits `head a1 ... an` into `(head, [a1, ..., an])`.
  pub fn app_spine(&self) -> (&Type, Vec<&Type>) {
    let mut args = vec![];
    let mut curr = self;
    while let Type::App(f, a) = curr {
      args.push(a.as_ref());
      curr = f.as_ref();
    }
    args.reverse();
    (curr, args)
  }

  /// Splits `a1 -> ... -> an -> r` into `([a1, ..., an], r)`.
  pub fn fun_spine(&self) -> (Vec<&Type>, &Type) {
    let mut args = vec![];
    let mut curr = self;
    while let Some((a, b)) = curr.as_fun() {
      args.push(a);
      curr = b;
    }
    (args, curr)
  }

  /// Peels leading quantifiers.
  pub fn forall_spine(&self) -> (Vec<&Kind>, &Type) {
    let mut kinds = vec![];
    let mut curr = self;
    while let Type::Forall(k, b) = curr {
      kinds.push(k);
      curr = b.as_ref();
    }
    (kinds, curr)
  }

  /// Adds `delta` to every variable at or above `cutoff`.
  pub fn shift(&self, delta: i64, cutoff: u64) -> Type {
    match self {
      Type::Var(i) if *i >= cutoff => Type::Var(i.saturating_add_signed(delta)),
      Type::App(f, a) => {
        Type::app(f.shift(delta, cutoff), a.shift(delta, cutoff))
      },
      Type::Forall(k, b) => Type::forall(k.clone(), b.shift(delta, cutoff + 1)),
      _ => self.clone(),
    }
  }

  /// Replaces variable `idx` with `s`. `s` is shifted as binders are
  /// crossed.
  pub fn subst(&self, idx: u64, s: &Type) -> Type {
    match self {
      Type::Var(i) if *i == idx => s.clone(),
      Type::App(f, a) => Type::app(f.subst(idx, s), a.subst(idx, s)),
      Type::Forall(k, b) => {
        Type::forall(k.clone(), b.subst(idx + 1, &s.shift(1, 0)))
      },
      _ => self.clone(),
    }
  }

  /// Instantiates the outermost bound variable of a `Forall` body with `arg`.
  pub fn subst_in(&self, arg: &Type) -> Type {
    self.subst(0, &arg.shift(1, 0)).shift(-1, 0)
  }

  /// Collects every type-definition address referenced in this type.
  pub fn references(&self, out: &mut FxHashSet<Address>) {
    match self {
      Type::Hash(h) => {
        out.insert(*h);
      },
      Type::App(f, a) => {
        f.references(out);
        a.references(out);
      },
      Type::Forall(_, b) => b.references(out),
      Type::Con(_) | Type::Var(_) => (),
    }
  }

  fn fmt_atom(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::App(..) | Type::Forall(..) => write!(f, "({self})"),
      _ => write!(f, "{self}"),
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::Con(c) => write!(f, "{c}"),
      Type::Var(i) => write!(f, "{i}"),
      Type::Hash(h) => write!(f, "#{h}"),
      Type::App(..) if self.is_fun() => {
        let (args, res) = self.fun_spine();
        for arg in args {
          if arg.is_fun() || matches!(arg, Type::Forall(..)) {
            write!(f, "({arg}) -> ")?;
          } else {
            write!(f, "{arg} -> ")?;
          }
        }
        write!(f, "{res}")
      },
      Type::App(..) => {
        let (head, args) = self.app_spine();
        head.fmt_atom(f)?;
        for arg in args {
          write!(f, " ")?;
          arg.fmt_atom(f)?;
        }
        Ok(())
      },
      Type::Forall(..) => {
        let (kinds, body) = self.forall_spine();
        write!(f, "∀")?;
        for (i, k) in kinds.iter().enumerate() {
          if i > 0 {
            write!(f, " ")?;
          }
          if k.is_fun() { write!(f, "({k})")? } else { write!(f, "{k}")? }
        }
        write!(f, ". {body}")
      },
    }
  }
}

/// A type definition `∀k1 ... kn. body`. Parameter `k1` is the outermost
/// binder, so inside `body` it has index `n - 1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TDef {
  pub kinds: Vec<Kind>,
  pub body: Type,
}

impl TDef {
  pub fn new(kinds: Vec<Kind>, body: Type) -> Self {
    TDef { kinds, body }
  }

  /// `k1 -> ... -> kn -> *`
  pub fn kind(&self) -> Kind {
    let mut ks = self.kinds.clone();
    ks.push(Kind::Star);
    Kind::fun_from(&ks)
  }

  pub fn references(&self, out: &mut FxHashSet<Address>) {
    self.body.references(out)
  }
}

impl fmt::Display for TDef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "type")?;
    for k in &self.kinds {
      if k.is_fun() { write!(f, " ({k})")? } else { write!(f, " {k}")? }
    }
    write!(f, " = {}", self.body)
  }
}
