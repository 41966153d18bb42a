//! Named terms.

use std::fmt;
use std::sync::Arc;

use crate::core::address::Address;
use crate::core::kind::Kind;

use super::typ::Type;

/// A term with named variables. Lambda parameters may omit their type when
/// the lambda is checked against a known function type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
  Hash(Address),
  Var(String),
  App(Arc<Term>, Arc<Term>),
  Abs(String, Option<Type>, Arc<Term>),
  AppT(Arc<Term>, Type),
  AbsT(String, Kind, Arc<Term>),
  Pack(Address),
  Unpack(Address),
  /// `(term : type)`
  Ann(Arc<Term>, Type),
}

impl Term {
  pub fn var(name: impl Into<String>) -> Self {
    Term::Var(name.into())
  }

  pub fn app(f: Term, a: Term) -> Self {
    Term::App(Arc::new(f), Arc::new(a))
  }

  pub fn app_from(head: Term, args: impl IntoIterator<Item = Term>) -> Self {
    args.into_iter().fold(head, Term::app)
  }

  /// `λ(name : ty). body`
  pub fn abs(name: impl Into<String>, ty: Type, body: Term) -> Self {
    Term::Abs(name.into(), Some(ty), Arc::new(body))
  }

  /// `λname. body`, with the parameter type left to checking.
  pub fn lam(name: impl Into<String>, body: Term) -> Self {
    Term::Abs(name.into(), None, Arc::new(body))
  }

  pub fn app_t(f: Term, ty: Type) -> Self {
    Term::AppT(Arc::new(f), ty)
  }

  pub fn abs_t(name: impl Into<String>, kind: Kind, body: Term) -> Self {
    Term::AbsT(name.into(), kind, Arc::new(body))
  }

  pub fn ann(term: Term, ty: Type) -> Self {
    Term::Ann(Arc::new(term), ty)
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
      Term::Hash(h) => write!(f, "#{h}"),
      Term::Var(n) => write!(f, "{n}"),
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
      Term::Abs(name, None, body) => write!(f, "λ{name}. {body}"),
      Term::Abs(name, Some(ty), body) => write!(f, "λ({name} : {ty}). {body}"),
      Term::AbsT(name, kind, body) => write!(f, "Λ({name} : {kind}). {body}"),
      Term::Ann(term, ty) => write!(f, "({term} : {ty})"),
    }
  }
}
