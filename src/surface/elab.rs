//! Elaboration of named terms into the core calculus.
//!
//! The elaborator runs the same bidirectional algorithm as the core checker
//! but over named contexts, resolving every name to its distance from the
//! front of its context while building the core tree. Synthesized types are
//! core types, so comparing them ignores binder names.

use std::fmt;

use crate::cons_list::ConsList;
use crate::core::env::Env;
use crate::core::error::TcError;
use crate::core::kind::Kind;
use crate::core::tc::{Bound, TypeChecker, kind_of_con};
use crate::core::{term as core_term, typ as core_typ};

use super::term::Term;
use super::typ::{TDef, Type};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElabError {
  /// A failure of the underlying core rules.
  Tc(TcError),
  UndefinedVar { name: String },
  UndefinedTypeVar { name: String },
  /// An unannotated lambda where no expected type is known.
  CannotSynth { term: Term },
  /// An unannotated lambda checked against a non-function type.
  UnexpectedLambda { term: Term, expected: core_typ::Type },
}

impl fmt::Display for ElabError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ElabError::Tc(e) => write!(f, "{e}"),
      ElabError::UndefinedVar { name } => write!(f, "undefined var {name}"),
      ElabError::UndefinedTypeVar { name } => {
        write!(f, "undefined tvar {name}")
      },
      ElabError::CannotSynth { term } => {
        write!(f, "cannot synthesize a type for {term}, add an annotation")
      },
      ElabError::UnexpectedLambda { term, expected } => {
        write!(f, "lambda {term} checked against non-function type {expected}")
      },
    }
  }
}

impl std::error::Error for ElabError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ElabError::Tc(e) => Some(e),
      _ => None,
    }
  }
}

impl From<TcError> for ElabError {
  fn from(e: TcError) -> Self {
    ElabError::Tc(e)
  }
}

pub type ElabResult<T> = Result<T, ElabError>;

/// Named kind and type contexts. The most recent binder is at the front.
#[derive(Clone, Debug, Default)]
pub struct Scope {
  pub kinds: ConsList<(String, Kind)>,
  pub types: ConsList<(String, Bound)>,
}

impl Scope {
  pub fn new() -> Self {
    Scope::default()
  }

  pub fn push_kind(&self, name: &str, kind: Kind) -> Scope {
    Scope {
      kinds: self.kinds.cons((name.to_string(), kind)),
      types: self.types.clone(),
    }
  }

  pub fn push_type(&self, name: &str, typ: core_typ::Type) -> Scope {
    let bound = Bound { typ, depth: self.kinds.len() };
    Scope {
      kinds: self.kinds.clone(),
      types: self.types.cons((name.to_string(), bound)),
    }
  }

  pub fn lookup_kind(&self, name: &str) -> Option<(u64, Kind)> {
    self.kinds.find(|(n, _)| n == name).map(|(i, (_, k))| (i, k.clone()))
  }

  /// Index and type of term variable `name`, with the type expressed in
  /// the current kind context.
  pub fn lookup_type(&self, name: &str) -> Option<(u64, core_typ::Type)> {
    let (idx, (_, bound)) = self.types.find(|(n, _)| n == name)?;
    let delta = (self.kinds.len() - bound.depth) as i64;
    Some((idx, bound.typ.shift(delta, 0)))
  }
}

pub struct Elaborator<'env> {
  pub env: &'env Env,
}

impl<'env> Elaborator<'env> {
  pub fn new(env: &'env Env) -> Self {
    Elaborator { env }
  }

  fn core(&self) -> TypeChecker<'env> {
    TypeChecker::new(self.env)
  }

  // ==========================================================================
  // Types
  // ==========================================================================

  pub fn synth_type(
    &self,
    scope: &Scope,
    ty: &Type,
  ) -> ElabResult<(core_typ::Type, Kind)> {
    match ty {
      Type::Con(c) => Ok((core_typ::Type::Con(*c), kind_of_con(*c))),
      Type::Hash(h) => {
        let kind = self
          .env
          .type_kind(h)
          .ok_or(TcError::UndefinedTypeHash { hash: *h })?;
        Ok((core_typ::Type::Hash(*h), kind))
      },
      Type::Var(name) => scope
        .lookup_kind(name)
        .map(|(idx, kind)| (core_typ::Type::Var(idx), kind))
        .ok_or_else(|| ElabError::UndefinedTypeVar { name: name.clone() }),
      Type::App(f, a) => {
        let (f, fk) = self.synth_type(scope, f)?;
        match fk {
          Kind::Fun(dom, cod) => {
            let a = self.check_type(scope, a, &dom)?;
            Ok((core_typ::Type::app(f, a), cod.as_ref().clone()))
          },
          // the argument's own errors never take precedence
          kind => {
            let ty = match self.synth_type(scope, a) {
              Ok((a, _)) => core_typ::Type::app(f, a),
              Err(_) => f,
            };
            Err(TcError::NotAKindFunction { ty, kind }.into())
          },
        }
      },
      Type::Forall(name, kind, body) => {
        let inner = scope.push_kind(name, kind.clone());
        let body = self.check_type(&inner, body, &Kind::Star)?;
        Ok((core_typ::Type::forall(kind.clone(), body), Kind::Star))
      },
    }
  }

  pub fn check_type(
    &self,
    scope: &Scope,
    ty: &Type,
    expected: &Kind,
  ) -> ElabResult<core_typ::Type> {
    let (ty, found) = self.synth_type(scope, ty)?;
    if &found == expected {
      Ok(ty)
    } else {
      Err(TcError::KindMismatch { ty, expected: expected.clone(), found }.into())
    }
  }

  /// Checks the body under the named parameters and returns the positional
  /// definition with its kind.
  pub fn elab_tdef(&self, tdef: &TDef) -> ElabResult<(core_typ::TDef, Kind)> {
    let scope = tdef
      .params
      .iter()
      .fold(Scope::new(), |acc, (name, kind)| acc.push_kind(name, kind.clone()));
    let body = self.check_type(&scope, &tdef.body, &Kind::Star)?;
    let kinds = tdef.params.iter().map(|(_, k)| k.clone()).collect();
    let def = core_typ::TDef::new(kinds, body);
    let kind = def.kind();
    Ok((def, kind))
  }

  // ==========================================================================
  // Terms
  // ==========================================================================

  pub fn synth(
    &self,
    scope: &Scope,
    term: &Term,
  ) -> ElabResult<(core_term::Term, core_typ::Type)> {
    match term {
      Term::Hash(h) => {
        let ty =
          self.env.term_type(h).ok_or(TcError::UndefinedHash { hash: *h })?;
        Ok((core_term::Term::Hash(*h), ty))
      },
      Term::Var(name) => scope
        .lookup_type(name)
        .map(|(idx, ty)| (core_term::Term::Var(idx), ty))
        .ok_or_else(|| ElabError::UndefinedVar { name: name.clone() }),
      Term::App(f, a) => {
        let (f, fun_ty) = self.synth(scope, f)?;
        match fun_ty.as_fun() {
          Some((dom, cod)) => {
            let a = self.check(scope, a, dom)?;
            Ok((core_term::Term::app(f, a), cod.clone()))
          },
          None => {
            let term = match self.synth(scope, a) {
              Ok((a, _)) => core_term::Term::app(f, a),
              Err(_) => f,
            };
            Err(TcError::NotAFunction { term, ty: fun_ty }.into())
          },
        }
      },
      Term::Abs(name, Some(ty), body) => {
        let ty = self.check_type(scope, ty, &Kind::Star)?;
        let inner = scope.push_type(name, ty.clone());
        let (body, body_ty) = self.synth(&inner, body)?;
        Ok((
          core_term::Term::abs(ty.clone(), body),
          core_typ::Type::fun(ty, body_ty),
        ))
      },
      Term::Abs(_, None, _) => {
        Err(ElabError::CannotSynth { term: term.clone() })
      },
      Term::AppT(f, arg) => {
        let (f, f_ty) = self.synth(scope, f)?;
        match f_ty {
          core_typ::Type::Forall(kind, body) => {
            let arg = self.check_type(scope, arg, &kind)?;
            let ty = body.subst_in(&arg);
            Ok((core_term::Term::app_t(f, arg), ty))
          },
          ty => {
            let term = match self.synth_type(scope, arg) {
              Ok((arg, _)) => core_term::Term::app_t(f, arg),
              Err(_) => f,
            };
            Err(TcError::NotAForall { term, ty }.into())
          },
        }
      },
      Term::AbsT(name, kind, body) => {
        let inner = scope.push_kind(name, kind.clone());
        let (body, body_ty) = self.synth(&inner, body)?;
        Ok((
          core_term::Term::abs_t(kind.clone(), body),
          core_typ::Type::forall(kind.clone(), body_ty),
        ))
      },
      Term::Pack(h) => {
        Ok((core_term::Term::Pack(*h), self.core().pack_type(h)?))
      },
      Term::Unpack(h) => {
        Ok((core_term::Term::Unpack(*h), self.core().unpack_type(h)?))
      },
      Term::Ann(t, ty) => {
        let ty = self.check_type(scope, ty, &Kind::Star)?;
        let t = self.check(scope, t, &ty)?;
        Ok((t, ty))
      },
    }
  }

  pub fn check(
    &self,
    scope: &Scope,
    term: &Term,
    expected: &core_typ::Type,
  ) -> ElabResult<core_term::Term> {
    match (term, expected) {
      (Term::Abs(name, None, body), _) => match expected.as_fun() {
        Some((dom, cod)) => {
          let inner = scope.push_type(name, dom.clone());
          let body = self.check(&inner, body, cod)?;
          Ok(core_term::Term::abs(dom.clone(), body))
        },
        None => Err(ElabError::UnexpectedLambda {
          term: term.clone(),
          expected: expected.clone(),
        }),
      },
      (Term::AbsT(name, kind, body), core_typ::Type::Forall(k, expected_body))
        if kind == k =>
      {
        let inner = scope.push_kind(name, kind.clone());
        let body = self.check(&inner, body, expected_body)?;
        Ok(core_term::Term::abs_t(kind.clone(), body))
      },
      _ => {
        let (term, found) = self.synth(scope, term)?;
        if &found == expected {
          Ok(term)
        } else {
          Err(
            TcError::TypeMismatch { term, expected: expected.clone(), found }
              .into(),
          )
        }
      },
    }
  }

  // ==========================================================================
  // Closed entry points
  // ==========================================================================

  pub fn elaborate_type(&self, ty: &Type) -> ElabResult<(core_typ::Type, Kind)> {
    self.synth_type(&Scope::new(), ty)
  }

  pub fn elaborate_tdef(&self, tdef: &TDef) -> ElabResult<(core_typ::TDef, Kind)> {
    self.elab_tdef(tdef)
  }

  pub fn elaborate_term(
    &self,
    term: &Term,
  ) -> ElabResult<(core_term::Term, core_typ::Type)> {
    self.synth(&Scope::new(), term)
  }

  /// Elaborates a closed term against a closed core type.
  pub fn elaborate_term_against(
    &self,
    term: &Term,
    expected: &core_typ::Type,
  ) -> ElabResult<core_term::Term> {
    self.check(&Scope::new(), term, expected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::address::Address;
  use crate::core::tc::tests::{id_term, nat_tdef, true_term};
  use crate::core::tc::{kindcheck_tdef, typecheck};

  fn star() -> Kind {
    Kind::star()
  }

  fn v(name: &str) -> Type {
    Type::var(name)
  }

  fn cv(i: u64) -> core_typ::Type {
    core_typ::Type::var(i)
  }

  fn id(tvar: &str, var: &str) -> Term {
    Term::abs_t(tvar, star(), Term::abs(var, v(tvar), Term::var(var)))
  }

  #[test]
  fn identity_elaborates_to_core_identity() {
    let env = Env::new();
    let (term, ty) = Elaborator::new(&env).elaborate_term(&id("T", "x")).unwrap();
    assert_eq!(term, id_term());
    assert_eq!(ty, core_typ::Type::forall(star(), core_typ::Type::fun(cv(0), cv(0))));
    assert_eq!(typecheck(&env, &term).unwrap(), ty);
  }

  #[test]
  fn alpha_equivalent_terms_agree() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    let a = elab.elaborate_term(&id("A", "x")).unwrap();
    let b = elab.elaborate_term(&id("B", "y")).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn unannotated_lambdas_take_expected_types() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    // (Λ(T : *). λa. λb. a : ∀(T : *). T -> T -> T)
    let t = v("T");
    let ty = Type::forall(
      "T",
      star(),
      Type::fun(t.clone(), Type::fun(t.clone(), t)),
    );
    let term = Term::ann(
      Term::abs_t("T", star(), Term::lam("a", Term::lam("b", Term::var("a")))),
      ty,
    );
    let (core, core_ty) = elab.elaborate_term(&term).unwrap();
    assert_eq!(core, true_term());
    assert_eq!(typecheck(&env, &core).unwrap(), core_ty);
    // in synthesis position the annotation is required
    assert!(matches!(
      elab.elaborate_term(&Term::lam("x", Term::var("x"))),
      Err(ElabError::CannotSynth { .. })
    ));
    assert!(matches!(
      elab.elaborate_term(&Term::ann(Term::lam("x", Term::var("x")), Type::byte())),
      Err(ElabError::UnexpectedLambda { .. })
    ));
  }

  #[test]
  fn names_resolve_to_innermost_binder() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    let bb = Type::fun(Type::byte(), Type::byte());
    // λ(x : Byte). λ(x : Byte -> Byte). x
    let term = Term::abs(
      "x",
      Type::byte(),
      Term::abs("x", bb.clone(), Term::var("x")),
    );
    let (core, _) = elab.elaborate_term(&term).unwrap();
    assert_eq!(
      core,
      core_term::Term::abs(
        core_typ::Type::byte(),
        core_term::Term::abs(
          core_typ::Type::fun(core_typ::Type::byte(), core_typ::Type::byte()),
          core_term::Term::var(0)
        )
      )
    );
    // λ(x : Byte). λ(y : Byte -> Byte). x
    let term = Term::abs("x", Type::byte(), Term::abs("y", bb, Term::var("x")));
    let (core, _) = elab.elaborate_term(&term).unwrap();
    assert_eq!(
      core,
      core_term::Term::abs(
        core_typ::Type::byte(),
        core_term::Term::abs(
          core_typ::Type::fun(core_typ::Type::byte(), core_typ::Type::byte()),
          core_term::Term::var(1)
        )
      )
    );
  }

  #[test]
  fn term_variables_shift_under_type_binders() {
    // Λ(T : *). λ(x : T). Λ(U : *). x  :  ∀T. T -> ∀U. T
    let env = Env::new();
    let term = Term::abs_t(
      "T",
      star(),
      Term::abs("x", v("T"), Term::abs_t("U", star(), Term::var("x"))),
    );
    let (core, ty) = Elaborator::new(&env).elaborate_term(&term).unwrap();
    assert_eq!(
      ty,
      core_typ::Type::forall(
        star(),
        core_typ::Type::fun(cv(0), core_typ::Type::forall(star(), cv(1)))
      )
    );
    assert_eq!(typecheck(&env, &core).unwrap(), ty);
  }

  #[test]
  fn type_definitions() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    // type (F : * -> *) (A : *) = F A
    let fk = Kind::fun(star(), star());
    let def = TDef::new(
      vec![("F".into(), fk.clone()), ("A".into(), star())],
      Type::app(v("F"), v("A")),
    );
    let (core, kind) = elab.elaborate_tdef(&def).unwrap();
    assert_eq!(core.body, core_typ::Type::app(cv(1), cv(0)));
    assert_eq!(kind, Kind::fun_from(&[fk.clone(), star(), star()]));
    assert_eq!(kindcheck_tdef(&env, &core).unwrap(), kind);
    // type (F : * -> *) (A : *) = A F
    let bad = TDef::new(def.params.clone(), Type::app(v("A"), v("F")));
    assert!(matches!(
      elab.elaborate_tdef(&bad),
      Err(ElabError::Tc(TcError::NotAKindFunction { .. }))
    ));
    let unbound = TDef::new(vec![], v("Z"));
    assert_eq!(
      elab.elaborate_tdef(&unbound),
      Err(ElabError::UndefinedTypeVar { name: "Z".into() })
    );
  }

  #[test]
  fn errors() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    assert_eq!(
      elab.elaborate_term(&Term::var("x")),
      Err(ElabError::UndefinedVar { name: "x".into() })
    );
    let h = Address::hash(b"missing");
    assert_eq!(
      elab.elaborate_term(&Term::Hash(h)),
      Err(ElabError::Tc(TcError::UndefinedHash { hash: h }))
    );
    // a partially applied arrow is not a parameter type
    let partial = Type::app(Type::Con(core_typ::TCon::Fun), Type::byte());
    assert!(matches!(
      elab.elaborate_term(&Term::abs("x", partial, Term::var("x"))),
      Err(ElabError::Tc(TcError::KindMismatch { .. }))
    ));
    // id @Byte applied to the identity
    let bad = Term::app(Term::app_t(id("T", "x"), Type::byte()), id("U", "y"));
    assert!(matches!(
      elab.elaborate_term(&bad),
      Err(ElabError::Tc(TcError::TypeMismatch { .. }))
    ));
    let bad = Term::abs("x", Type::byte(), Term::app(Term::var("x"), Term::var("x")));
    assert!(matches!(
      elab.elaborate_term(&bad),
      Err(ElabError::Tc(TcError::NotAFunction { .. }))
    ));
  }

  #[test]
  fn non_function_kinds_fail_before_the_argument() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    let missing = Address::hash(b"missing");
    for arg in [v("Z"), Type::Hash(missing)] {
      let bad = Type::app(Type::byte(), arg);
      assert!(matches!(
        elab.elaborate_type(&bad),
        Err(ElabError::Tc(TcError::NotAKindFunction { kind: Kind::Star, .. }))
      ));
    }
    // a well-formed argument is reported with the application
    let bad = Type::app(Type::byte(), Type::byte());
    let core = core_typ::Type::app(core_typ::Type::byte(), core_typ::Type::byte());
    assert_eq!(
      elab.elaborate_type(&bad),
      Err(ElabError::Tc(TcError::NotAKindFunction { ty: core, kind: Kind::Star }))
    );
  }

  #[test]
  fn application_errors_carry_the_whole_application() {
    let env = Env::new();
    let elab = Elaborator::new(&env);
    let byte = core_typ::Type::byte();
    // λ(x : Byte). x x
    let bad = Term::abs("x", Type::byte(), Term::app(Term::var("x"), Term::var("x")));
    let core = core_term::Term::app(core_term::Term::var(0), core_term::Term::var(0));
    assert_eq!(
      elab.elaborate_term(&bad),
      Err(ElabError::Tc(TcError::NotAFunction { term: core, ty: byte.clone() }))
    );
    let core = core_term::Term::abs(
      byte.clone(),
      core_term::Term::app(core_term::Term::var(0), core_term::Term::var(0)),
    );
    assert!(matches!(
      typecheck(&env, &core),
      Err(TcError::NotAFunction { term, .. })
        if term == core_term::Term::app(core_term::Term::var(0), core_term::Term::var(0))
    ));
    // λ(x : Byte). x @Byte
    let bad = Term::abs("x", Type::byte(), Term::app_t(Term::var("x"), Type::byte()));
    let core = core_term::Term::app_t(core_term::Term::var(0), byte.clone());
    assert_eq!(
      elab.elaborate_term(&bad),
      Err(ElabError::Tc(TcError::NotAForall { term: core, ty: byte }))
    );
  }

  #[test]
  fn hashes_and_opaque_types_follow_the_environment() {
    let env = Env::new();
    let nat_addr = Address::hash(b"nat");
    let nat = nat_tdef();
    let kind = kindcheck_tdef(&env, &nat).unwrap();
    env.insert_type(nat_addr, nat, kind);
    let id_addr = Address::hash(b"id");
    env.insert_term(id_addr, id_term(), typecheck(&env, &id_term()).unwrap());
    let elab = Elaborator::new(&env);

    // λ(n : #nat). #id @#nat n
    let term = Term::abs(
      "n",
      Type::Hash(nat_addr),
      Term::app(Term::app_t(Term::Hash(id_addr), Type::Hash(nat_addr)), Term::var("n")),
    );
    let (core, ty) = elab.elaborate_term(&term).unwrap();
    let nat_ty = core_typ::Type::Hash(nat_addr);
    assert_eq!(ty, core_typ::Type::fun(nat_ty.clone(), nat_ty.clone()));
    assert_eq!(typecheck(&env, &core).unwrap(), ty);

    // Pack (Λ(t : *). λz. λs. z) against the definition body
    let zero = Term::app(
      Term::Pack(nat_addr),
      Term::ann(
        Term::abs_t("t", star(), Term::lam("z", Term::lam("s", Term::var("z")))),
        Type::forall(
          "t",
          star(),
          Type::fun_from(&[v("t"), Type::fun(v("t"), v("t")), v("t")]).unwrap(),
        ),
      ),
    );
    let (core, ty) = elab.elaborate_term(&zero).unwrap();
    assert_eq!(ty, nat_ty);
    assert_eq!(typecheck(&env, &core).unwrap(), nat_ty);
    let (_, unpack_ty) = elab.elaborate_term(&Term::Unpack(nat_addr)).unwrap();
    assert_eq!(unpack_ty, core_typ::Type::fun(nat_ty, nat_tdef().body));
  }
}
