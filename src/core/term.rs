//! De Bruijn indexed core terms.

use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

use super::address::Address;
use super::kind::Kind;
use super::typ::Type;

/// A core term. The core has no term constants; byte constants only appear
/// after erasure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
  Var(u64),
  /// Reference to a stored term.
  Hash(Address),
  App(Arc<Term>, Arc<Term>),
  /// `λ(_ : ty). body`
  Abs(Type, Arc<Term>),
  /// `term @ty`
  AppT(Arc<Term>, Type),
  /// `Λ(_ : kind). body`
  AbsT(Kind, Arc<Term>),
  /// Wraps a representation into the opaque type defined at the address.
  Pack(Address),
  /// Reveals the representation of the opaque type defined at the address.
  Unpack(Address),
}

impl Term {
  pub fn var(idx: u64) -> Self {
    Term::Var(idx)
  }

  pub fn app(f: Term, a: Term) -> Self {
    Term::App(Arc::new(f), Arc::new(a))
  }

  pub fn abs(ty: Type, body: Term) -> Self {
    Term::Abs(ty, Arc::new(body))
  }

  pub fn app_t(f: Term, ty: Type) -> Self {
    Term::AppT(Arc::new(f), ty)
  }

  pub fn abs_t(kind: Kind, body: Term) -> Self {
    Term::AbsT(kind, Arc::new(body))
  }

  pub fn app_from(head: Term, args: impl IntoIterator<Item = Term>) -> Self {
    args.into_iter().fold(head, Term::app)
  }

  pub fn app_t_from(head: Term, args: impl IntoIterator<Item = Type>) -> Self {
    args.into_iter().fold(head, Term::app_t)
  }

  /// One `Abs` per parameter type, the first outermost.
  pub fn abs_from(tys: &[Type], body: Term) -> Self {
    tys.iter().rev().fold(body, |acc, t| Term::abs(t.clone(), acc))
  }

  /// One `AbsT` per kind, the first outermost.
  pub fn abs_t_from(kinds: &[Kind], body: Term) -> Self {
    kinds.iter().rev().fold(body, |acc, k| Term::abs_t(k.clone(), acc))
  }

  /// Collects the term addresses and type-definition addresses referenced
  /// anywhere inside this term.
  pub fn references(
    &self,
    terms: &mut FxHashSet<Address>,
    types: &mut FxHashSet<Address>,
  ) {
    match self {
      Term::Var(_) => (),
      Term::Hash(h) => {
        terms.insert(*h);
      },
      Term::Pack(h) | Term::Unpack(h) => {
        types.insert(*h);
      },
      Term::App(f, a) => {
        f.references(terms, types);
        a.references(terms, types);
      },
      Term::Abs(ty, b) => {
        ty.references(types);
        b.references(terms, types);
      },
      Term::AppT(f, ty) => {
        f.references(terms, types);
        ty.references(types);
      },
      Term::AbsT(_, b) => b.references(terms, types),
    }
  }

  fn fmt_arg(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Term::App(..) | Term::AppT(..) | Term::Abs(..) | Term::AbsT(..) => {
        write!(f, "({self})")
      },
      _ => write!(f, "{self}"),
    }
  }

  fn fmt_head(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Term::Abs(..) | Term::AbsT(..) => write!(f, "({self})"),
      _ => write!(f, "{self}"),
    }
  }
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Term::Var(i) => write!(f, "{i}"),
      Term::Hash(h) => write!(f, "#{h}"),
      Term::Pack(h) => write!(f, ">#{h}"),
      Term::Unpack(h) => write!(f, "<#{h}"),
      Term::App(fun, arg) => {
        fun.fmt_head(f)?;
        write!(f, " ")?;
        arg.fmt_arg(f)
      },
      Term::AppT(fun, ty) => {
        fun.fmt_head(f)?;
        match ty {
          Type::App(..) | Type::Forall(..) => write!(f, " @({ty})"),
          _ => write!(f, " @{ty}"),
        }
      },
      Term::Abs(ty, body) => match ty {
        Type::App(..) | Type::Forall(..) => write!(f, "λ({ty}). {body}"),
        _ => write!(f, "λ{ty}. {body}"),
      },
      Term::AbsT(k, body) => {
        if k.is_fun() {
          write!(f, "Λ({k}). {body}")
        } else {
          write!(f, "Λ{k}. {body}")
        }
      },
    }
  }
}
