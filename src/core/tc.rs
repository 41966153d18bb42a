//! Bidirectional kind and type checker for the core calculus.

use crate::cons_list::ConsList;

use super::address::Address;
use super::env::Env;
use super::error::TcError;
use super::kind::Kind;
use super::term::Term;
use super::typ::{TCon, TDef, Type};

pub type TcResult<T> = Result<T, TcError>;

/// A term variable's type, together with the number of type binders that
/// were in scope where it was bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bound {
  pub typ: Type,
  pub depth: usize,
}

/// Kind context for type variables and type context for term variables.
#[derive(Clone, Debug, Default)]
pub struct Ctx {
  pub kinds: ConsList<Kind>,
  pub types: ConsList<Bound>,
}

impl Ctx {
  pub fn new() -> Self {
    Ctx::default()
  }

  pub fn push_kind(&self, kind: Kind) -> Ctx {
    Ctx { kinds: self.kinds.cons(kind), types: self.types.clone() }
  }

  pub fn push_type(&self, typ: Type) -> Ctx {
    let depth = self.kinds.len();
    let types = self.types.cons(Bound { typ, depth });
    Ctx { kinds: self.kinds.clone(), types }
  }

  /// The type of term variable `idx`, expressed in the current kind context.
  pub fn lookup_type(&self, idx: u64) -> Option<Type> {
    let bound = self.types.get(idx)?;
    let delta = (self.kinds.len() - bound.depth) as i64;
    if delta == 0 {
      Some(bound.typ.clone())
    } else {
      Some(bound.typ.shift(delta, 0))
    }
  }
}

/// Kind of a type constant.
pub fn kind_of_con(c: TCon) -> Kind {
  match c {
    TCon::Fun => Kind::fun_from(&[Kind::Star, Kind::Star, Kind::Star]),
    TCon::Byte => Kind::Star,
  }
}

/// The core checker, reading hash definitions from an [`Env`].
pub struct TypeChecker<'env> {
  pub env: &'env Env,
}

impl<'env> TypeChecker<'env> {
  pub fn new(env: &'env Env) -> Self {
    TypeChecker { env }
  }

  // ==========================================================================
  // Kind checking
  // ==========================================================================

  pub fn check_kind(
    &self,
    kinds: &ConsList<Kind>,
    ty: &Type,
    expected: &Kind,
  ) -> TcResult<()> {
    let found = self.synth_kind(kinds, ty)?;
    if &found == expected {
      Ok(())
    } else {
      Err(TcError::KindMismatch {
        ty: ty.clone(),
        expected: expected.clone(),
        found,
      })
    }
  }

  pub fn synth_kind(&self, kinds: &ConsList<Kind>, ty: &Type) -> TcResult<Kind> {
    match ty {
      Type::Con(c) => Ok(kind_of_con(*c)),
      Type::Hash(h) => self
        .env
        .type_kind(h)
        .ok_or(TcError::UndefinedTypeHash { hash: *h }),
      Type::Var(idx) => kinds
        .get(*idx)
        .cloned()
        .ok_or(TcError::UndefinedTypeVar { idx: *idx }),
      Type::Forall(k, body) => {
        self.check_kind(&kinds.cons(k.clone()), body, &Kind::Star)?;
        Ok(Kind::Star)
      },
      Type::App(f, a) => match self.synth_kind(kinds, f)? {
        Kind::Fun(dom, cod) => {
          self.check_kind(kinds, a, &dom)?;
          Ok(cod.as_ref().clone())
        },
        kind => Err(TcError::NotAKindFunction { ty: ty.clone(), kind }),
      },
    }
  }

  /// Checks the body of a definition under its parameters (the first
  /// parameter outermost) and returns `k1 -> ... -> kn -> *`.
  pub fn kindcheck_tdef(&self, tdef: &TDef) -> TcResult<Kind> {
    let kinds = tdef
      .kinds
      .iter()
      .fold(ConsList::new(), |acc, k| acc.cons(k.clone()));
    self.check_kind(&kinds, &tdef.body, &Kind::Star)?;
    Ok(tdef.kind())
  }

  // ==========================================================================
  // Opaque types
  // ==========================================================================

  fn opaque(&self, h: &Address) -> TcResult<(TDef, Type)> {
    let entry = self
      .env
      .get_type(h)
      .ok_or(TcError::UndefinedTypeHash { hash: *h })?;
    let n = entry.tdef.kinds.len() as u64;
    let abstract_ty = Type::app_from(Type::Hash(*h), (0..n).rev().map(Type::Var));
    Ok((entry.tdef, abstract_ty))
  }

  /// `∀kinds. body -> #h v1 ... vn`
  pub fn pack_type(&self, h: &Address) -> TcResult<Type> {
    let (tdef, abstract_ty) = self.opaque(h)?;
    Ok(Type::foralls(&tdef.kinds, Type::fun(tdef.body, abstract_ty)))
  }

  /// `∀kinds. #h v1 ... vn -> body`
  pub fn unpack_type(&self, h: &Address) -> TcResult<Type> {
    let (tdef, abstract_ty) = self.opaque(h)?;
    Ok(Type::foralls(&tdef.kinds, Type::fun(abstract_ty, tdef.body)))
  }

  // ==========================================================================
  // Type checking
  // ==========================================================================

  pub fn check(&self, ctx: &Ctx, term: &Term, expected: &Type) -> TcResult<()> {
    let found = self.synth_type(ctx, term)?;
    if &found == expected {
      Ok(())
    } else {
      Err(TcError::TypeMismatch {
        term: term.clone(),
        expected: expected.clone(),
        found,
      })
    }
  }

  pub fn synth_type(&self, ctx: &Ctx, term: &Term) -> TcResult<Type> {
    match term {
      Term::Var(idx) => {
        ctx.lookup_type(*idx).ok_or(TcError::UndefinedVar { idx: *idx })
      },
      Term::Hash(h) => {
        self.env.term_type(h).ok_or(TcError::UndefinedHash { hash: *h })
      },
      Term::Abs(ty, body) => {
        self.check_kind(&ctx.kinds, ty, &Kind::Star)?;
        let body_ty = self.synth_type(&ctx.push_type(ty.clone()), body)?;
        Ok(Type::fun(ty.clone(), body_ty))
      },
      Term::AbsT(k, body) => {
        let body_ty = self.synth_type(&ctx.push_kind(k.clone()), body)?;
        Ok(Type::forall(k.clone(), body_ty))
      },
      Term::App(f, a) => {
        let fun_ty = self.synth_type(ctx, f)?;
        match fun_ty.as_fun() {
          Some((dom, cod)) => {
            self.check(ctx, a, dom)?;
            Ok(cod.clone())
          },
          None => Err(TcError::NotAFunction { term: term.clone(), ty: fun_ty }),
        }
      },
      Term::AppT(f, arg) => match self.synth_type(ctx, f)? {
        Type::Forall(k, body) => {
          self.check_kind(&ctx.kinds, arg, &k)?;
          Ok(body.subst_in(arg))
        },
        ty => Err(TcError::NotAForall { term: term.clone(), ty }),
      },
      Term::Pack(h) => self.pack_type(h),
      Term::Unpack(h) => self.unpack_type(h),
    }
  }
}

/// Synthesizes the kind of a closed type.
pub fn kindcheck(env: &Env, ty: &Type) -> TcResult<Kind> {
  TypeChecker::new(env).synth_kind(&ConsList::new(), ty)
}

pub fn kindcheck_tdef(env: &Env, tdef: &TDef) -> TcResult<Kind> {
  TypeChecker::new(env).kindcheck_tdef(tdef)
}

/// Synthesizes the type of a closed term.
pub fn typecheck(env: &Env, term: &Term) -> TcResult<Type> {
  TypeChecker::new(env).synth_type(&Ctx::new(), term)
}
