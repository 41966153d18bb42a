//! Named types and type definitions.

use std::fmt;
use std::sync::Arc;

use crate::core::address::Address;
use crate::core::kind::Kind;
use crate::core::typ::TCon;

/// A type with named variables.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
  Con(TCon),
  Hash(Address),
  Var(String),
  App(Arc<Type>, Arc<Type>),
  Forall(String, Kind, Arc<Type>),
}

impl Type {
  pub fn var(name: impl Into<String>) -> Self {
    Type::Var(name.into())
  }

  pub fn byte() -> Self {
    Type::Con(TCon::Byte)
  }

  pub fn app(f: Type, a: Type) -> Self {
    Type::App(Arc::new(f), Arc::new(a))
  }

  pub fn app_from(head: Type, args: impl IntoIterator<Item = Type>) -> Self {
    args.into_iter().fold(head, Type::app)
  }

  pub fn forall(name: impl Into<String>, kind: Kind, body: Type) -> Self {
    Type::Forall(name.into(), kind, Arc::new(body))
  }

  pub fn fun(a: Type, b: Type) -> Self {
    Type::app(Type::app(Type::Con(TCon::Fun), a), b)
  }

  /// `[t1, ..., tn]` into `t1 -> ... -> tn`, `None` for an empty slice.
  pub fn fun_from(ts: &[Type]) -> Option<Self> {
    let (last, init) = ts.split_last()?;
    Some(init.iter().rev().fold(last.clone(), |acc, t| Type::fun(t.clone(), acc)))
  }

  pub fn as_fun(&self) -> Option<(&Type, &Type)> {
    match self {
      Type::App(f, b) => match f.as_ref() {
        Type::App(c, a) if c.as_ref() == &Type::Con(TCon::Fun) => {
          Some((a.as_ref(), b.as_ref()))
        },
        _ => None,
      },
      _ => None,
    }
  }

  fn fmt_atom(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::App(..) | Type::Forall(..) => write!(f, "({self})"),
      _ => write!(f, "{self}"),
    }
  }
}

fn fmt_binder(f: &mut fmt::Formatter<'_>, name: &str, kind: &Kind) -> fmt::Result {
  write!(f, "({name} : {kind})")
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some((a, b)) = self.as_fun() {
      if a.as_fun().is_some() || matches!(a, Type::Forall(..)) {
        write!(f, "({a}) -> {b}")
      } else {
        write!(f, "{a} -> {b}")
      }
    } else {
      match self {
        Type::Con(c) => write!(f, "{c}"),
        Type::Hash(h) => write!(f, "#{h}"),
        Type::Var(n) => write!(f, "{n}"),
        Type::App(fun, arg) => {
          match fun.as_ref() {
            Type::App(..) => write!(f, "{fun}")?,
            _ => fun.fmt_atom(f)?,
          }
          write!(f, " ")?;
          arg.fmt_atom(f)
        },
        Type::Forall(name, kind, body) => {
          write!(f, "∀")?;
          fmt_binder(f, name, kind)?;
          write!(f, ". {body}")
        },
      }
    }
  }
}

/// A type definition with named parameters, the first outermost.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TDef {
  pub params: Vec<(String, Kind)>,
  pub body: Type,
}

impl TDef {
  pub fn new(params: Vec<(String, Kind)>, body: Type) -> Self {
    TDef { params, body }
  }
}

impl fmt::Display for TDef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "type")?;
    for (name, kind) in &self.params {
      write!(f, " ")?;
      fmt_binder(f, name, kind)?;
    }
    write!(f, " = {}", self.body)
  }
}
