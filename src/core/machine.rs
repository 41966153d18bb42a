//! Type erasure and a CEK-style abstract machine for erased terms.
//!
//! The machine state is a term under evaluation, the environment closing
//! it, and a continuation. Evaluation is call-by-value and runs until no
//! transition applies, or until an optional fuel budget is spent.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cons_list::ConsList;

use super::address::Address;
use super::env::Env;
use super::term::Term;

/// Untyped evaluation terms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ETerm {
  /// The byte constant zero.
  Zero,
  /// The byte successor function.
  Succ,
  Hash(Address),
  Var(u64),
  /// A byte literal, produced by evaluation.
  Byte(u8),
  App(Arc<ETerm>, Arc<ETerm>),
  Abs(Arc<ETerm>),
}

impl ETerm {
  pub fn app(f: ETerm, a: ETerm) -> Self {
    ETerm::App(Arc::new(f), Arc::new(a))
  }

  pub fn abs(body: ETerm) -> Self {
    ETerm::Abs(Arc::new(body))
  }

  pub fn app_from(head: ETerm, args: impl IntoIterator<Item = ETerm>) -> Self {
    args.into_iter().fold(head, ETerm::app)
  }

  /// `λ. 0`
  pub fn id() -> Self {
    ETerm::abs(ETerm::Var(0))
  }
}

impl fmt::Display for ETerm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ETerm::Zero => write!(f, "zeroByte"),
      ETerm::Succ => write!(f, "succByte"),
      ETerm::Hash(h) => write!(f, "#{h}"),
      ETerm::Var(i) => write!(f, "{i}"),
      ETerm::Byte(b) => write!(f, "b{b}"),
      ETerm::Abs(body) => write!(f, "λ{body}"),
      ETerm::App(fun, arg) => {
        match fun.as_ref() {
          ETerm::Abs(_) => write!(f, "({fun})")?,
          _ => write!(f, "{fun}")?,
        }
        match arg.as_ref() {
          ETerm::App(..) | ETerm::Abs(_) => write!(f, " ({arg})"),
          _ => write!(f, " {arg}"),
        }
      },
    }
  }
}

/// Drops all type information from a core term.
pub fn erase(term: &Term) -> ETerm {
  match term {
    Term::Var(i) => ETerm::Var(*i),
    Term::Hash(h) => ETerm::Hash(*h),
    Term::Abs(_, body) => ETerm::abs(erase(body)),
    Term::AbsT(_, body) => erase(body),
    Term::App(f, a) => ETerm::app(erase(f), erase(a)),
    Term::AppT(f, _) => erase(f),
    Term::Pack(_) | Term::Unpack(_) => ETerm::id(),
  }
}

/// Runtime values bound in machine environments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
  Byte(u8),
  /// A lambda body and its captured environment.
  Clos(Arc<ETerm>, Arc<MEnv>),
  Succ,
}

pub type MEnv = ConsList<Value>;

/// What to do with the value currently being computed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cont {
  Done,
  /// Evaluate this argument next, then apply.
  Arg(Arc<ETerm>, MEnv, Arc<Cont>),
  /// Bind the value into this closure body's environment and continue.
  Fn(Arc<ETerm>, MEnv, Arc<Cont>),
  /// Apply the successor to the value about to be produced.
  Succ(Arc<Cont>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct State {
  pub term: Arc<ETerm>,
  pub env: MEnv,
  pub cont: Arc<Cont>,
}

impl State {
  pub fn new(term: ETerm) -> Self {
    State {
      term: Arc::new(term),
      env: ConsList::new(),
      cont: Arc::new(Cont::Done),
    }
  }

  fn with(term: Arc<ETerm>, env: MEnv, cont: Arc<Cont>) -> Self {
    State { term, env, cont }
  }

  /// The byte this state has produced, if it is a finished byte.
  pub fn value(&self) -> Option<u8> {
    match (self.term.as_ref(), self.cont.as_ref()) {
      (ETerm::Byte(b), Cont::Done) => Some(*b),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
  /// A hash reference with no checked definition in the environment.
  UndefinedHash { hash: Address },
}

impl fmt::Display for MachineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MachineError::UndefinedHash { hash } => {
        write!(f, "undefined hash during evaluation: #{hash}")
      },
    }
  }
}

impl std::error::Error for MachineError {}

pub type MachineResult<T> = Result<T, MachineError>;

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
  /// No transition applies.
  Done(State),
  /// The fuel budget ran out first.
  Exhausted(State),
}

impl Outcome {
  pub fn state(&self) -> &State {
    match self {
      Outcome::Done(s) | Outcome::Exhausted(s) => s,
    }
  }

  pub fn is_done(&self) -> bool {
    matches!(self, Outcome::Done(_))
  }
}

/// An evaluator over the definitions of an [`Env`].
pub struct Machine<'env> {
  pub env: &'env Env,
  /// Erased hash definitions, filled on first use.
  pub cache: FxHashMap<Address, Arc<ETerm>>,
  /// Maximum number of transitions per run, unbounded if `None`.
  pub fuel: Option<u64>,
}

impl<'env> Machine<'env> {
  pub fn new(env: &'env Env) -> Self {
    Machine { env, cache: FxHashMap::default(), fuel: None }
  }

  pub fn with_fuel(env: &'env Env, fuel: u64) -> Self {
    Machine { env, cache: FxHashMap::default(), fuel: Some(fuel) }
  }

  fn lookup_hash(&mut self, hash: &Address) -> MachineResult<Arc<ETerm>> {
    if let Some(cached) = self.cache.get(hash) {
      return Ok(cached.clone());
    }
    let entry = self
      .env
      .get_term(hash)
      .ok_or(MachineError::UndefinedHash { hash: *hash })?;
    debug!(hash = %hash.short(), "erasing definition");
    let erased = Arc::new(erase(&entry.term));
    self.cache.insert(*hash, erased.clone());
    Ok(erased)
  }

  /// One transition, or `None` if the state is final or stuck.
  pub fn step(&mut self, state: &State) -> MachineResult<Option<State>> {
    let State { term, env, cont } = state;
    let next = match (term.as_ref(), cont.as_ref()) {
      (ETerm::Var(i), _) => match env.get(*i) {
        None => None,
        Some(Value::Byte(b)) => {
          Some(State::with(Arc::new(ETerm::Byte(*b)), MEnv::new(), cont.clone()))
        },
        Some(Value::Clos(body, cenv)) => Some(State::with(
          Arc::new(ETerm::Abs(body.clone())),
          cenv.as_ref().clone(),
          cont.clone(),
        )),
        Some(Value::Succ) => {
          Some(State::with(Arc::new(ETerm::Succ), MEnv::new(), cont.clone()))
        },
      },
      (ETerm::Hash(h), _) => {
        let erased = self.lookup_hash(h)?;
        Some(State::with(erased, MEnv::new(), cont.clone()))
      },
      (ETerm::Zero, _) => {
        Some(State::with(Arc::new(ETerm::Byte(0)), MEnv::new(), cont.clone()))
      },
      (ETerm::Succ, Cont::Arg(arg, aenv, k)) => Some(State::with(
        arg.clone(),
        aenv.clone(),
        Arc::new(Cont::Succ(k.clone())),
      )),
      (ETerm::Succ, Cont::Fn(body, fenv, k)) => {
        Some(State::with(body.clone(), fenv.cons(Value::Succ), k.clone()))
      },
      (ETerm::App(f, a), _) => Some(State::with(
        f.clone(),
        env.clone(),
        Arc::new(Cont::Arg(a.clone(), env.clone(), cont.clone())),
      )),
      (ETerm::Byte(b), Cont::Fn(body, fenv, k)) => {
        Some(State::with(body.clone(), fenv.cons(Value::Byte(*b)), k.clone()))
      },
      (ETerm::Byte(b), Cont::Succ(k)) => Some(State::with(
        Arc::new(ETerm::Byte(b.wrapping_add(1))),
        MEnv::new(),
        k.clone(),
      )),
      (ETerm::Abs(body), Cont::Arg(arg, aenv, k)) => Some(State::with(
        arg.clone(),
        aenv.clone(),
        Arc::new(Cont::Fn(body.clone(), env.clone(), k.clone())),
      )),
      (ETerm::Abs(body), Cont::Fn(fbody, fenv, k)) => {
        let clos = Value::Clos(body.clone(), Arc::new(env.clone()));
        Some(State::with(fbody.clone(), fenv.cons(clos), k.clone()))
      },
      _ => None,
    };
    Ok(next)
  }

  /// Steps until no transition applies or the fuel is spent.
  pub fn run(&mut self, state: State) -> MachineResult<Outcome> {
    let mut curr = state;
    let mut steps: u64 = 0;
    loop {
      if self.fuel.is_some_and(|fuel| steps >= fuel) {
        trace!(steps, "fuel exhausted");
        return Ok(Outcome::Exhausted(curr));
      }
      match self.step(&curr)? {
        Some(next) => {
          curr = next;
          steps += 1;
        },
        None => {
          trace!(steps, "machine halted");
          return Ok(Outcome::Done(curr));
        },
      }
    }
  }

  pub fn run_erased(&mut self, term: ETerm) -> MachineResult<Outcome> {
    self.run(State::new(term))
  }

  /// Erases and evaluates a checked core term.
  pub fn evaluate(&mut self, term: &Term) -> MachineResult<Outcome> {
    self.run_erased(erase(term))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::kind::Kind;
  use crate::core::tc::tests::{id_term, nat_tdef, true_term};
  use crate::core::tc::{kindcheck_tdef, typecheck};
  use crate::core::typ::Type;

  fn eval(env: &Env, term: ETerm) -> State {
    let outcome = Machine::new(env).run_erased(term).unwrap();
    assert!(outcome.is_done());
    outcome.state().clone()
  }

  #[test]
  fn erasure() {
    assert_eq!(erase(&id_term()), ETerm::id());
    let t = Term::app(
      Term::app_t(Term::Unpack(Address::hash(b"t")), Type::byte()),
      Term::var(0),
    );
    assert_eq!(erase(&t), ETerm::app(ETerm::id(), ETerm::Var(0)));
    assert_eq!(erase(&true_term()).to_string(), "λλ1");
  }

  #[test]
  fn identity_at_byte() {
    let env = Env::new();
    let id_byte = Term::app_t(id_term(), Type::byte());
    assert_eq!(
      typecheck(&env, &id_byte).unwrap(),
      Type::fun(Type::byte(), Type::byte())
    );
    let state = eval(&env, ETerm::app(erase(&id_byte), ETerm::Byte(5)));
    assert_eq!(state.value(), Some(5));
  }

  #[test]
  fn church_true_selects_first() {
    let env = Env::new();
    let t = ETerm::app_from(erase(&true_term()), [ETerm::Byte(7), ETerm::Byte(9)]);
    assert_eq!(eval(&env, t).value(), Some(7));
  }

  #[test]
  fn successor_and_zero() {
    let env = Env::new();
    let t = ETerm::app(ETerm::Succ, ETerm::app(ETerm::Succ, ETerm::Zero));
    assert_eq!(eval(&env, t).value(), Some(2));
    // succ passed as an argument and applied inside a closure
    let twice = ETerm::abs(ETerm::abs(ETerm::app(
      ETerm::Var(1),
      ETerm::app(ETerm::Var(1), ETerm::Var(0)),
    )));
    let t = ETerm::app_from(twice, [ETerm::Succ, ETerm::Byte(40)]);
    assert_eq!(eval(&env, t).value(), Some(42));
  }

  #[test]
  fn closures_keep_their_captured_environment() {
    let env = Env::new();
    // (λf. f 3) ((λx. λy. x) 7)
    let konst = ETerm::abs(ETerm::abs(ETerm::Var(1)));
    let apply3 = ETerm::abs(ETerm::app(ETerm::Var(0), ETerm::Byte(3)));
    let t = ETerm::app(apply3, ETerm::app(konst, ETerm::Byte(7)));
    assert_eq!(eval(&env, t).value(), Some(7));
    let captured = MEnv::new().cons(Value::Byte(7));
    let clos = Value::Clos(Arc::new(ETerm::Var(1)), Arc::new(captured.clone()));
    let state = Machine::new(&env)
      .step(&State::with(
        Arc::new(ETerm::Var(0)),
        MEnv::new().cons(clos),
        Arc::new(Cont::Done),
      ))
      .unwrap()
      .unwrap();
    assert_eq!(state.env, captured);
  }

  /// Church numerals hidden behind an opaque `Nat` definition.
  fn peano(env: &Env) -> (Address, Term, Term) {
    let nat = nat_tdef();
    let nat_addr = Address::hash(b"nat");
    let kind = kindcheck_tdef(env, &nat).unwrap();
    env.insert_type(nat_addr, nat, kind);
    let t = Type::var(0);
    let tt = Type::fun(t.clone(), t.clone());
    // Pack (Λt. λ(z : t) (s : t -> t). z)
    let zero = Term::app(
      Term::Pack(nat_addr),
      Term::abs_t(
        Kind::star(),
        Term::abs_from(&[t.clone(), tt.clone()], Term::var(1)),
      ),
    );
    // λ(n : Nat). Pack (Λt. λ(z : t) (s : t -> t). s (Unpack n @t z s))
    let inner = Term::app_from(
      Term::app_t(Term::app(Term::Unpack(nat_addr), Term::var(2)), t.clone()),
      [Term::var(1), Term::var(0)],
    );
    let succ = Term::abs(
      Type::Hash(nat_addr),
      Term::app(
        Term::Pack(nat_addr),
        Term::abs_t(
          Kind::star(),
          Term::abs_from(&[t, tt], Term::app(Term::var(0), inner)),
        ),
      ),
    );
    (nat_addr, zero, succ)
  }

  #[test]
  fn peano_three_evaluates_to_byte_three() {
    let env = Env::new();
    let (nat_addr, zero, succ) = peano(&env);
    assert_eq!(typecheck(&env, &zero).unwrap(), Type::Hash(nat_addr));
    assert_eq!(
      typecheck(&env, &succ).unwrap(),
      Type::fun(Type::Hash(nat_addr), Type::Hash(nat_addr))
    );
    let three = (0..3).fold(zero, |n, _| Term::app(succ.clone(), n));
    let to_byte = Term::app_t(Term::app(Term::Unpack(nat_addr), three), Type::byte());
    assert_eq!(
      typecheck(&env, &to_byte).unwrap(),
      Type::fun_from(&[
        Type::byte(),
        Type::fun(Type::byte(), Type::byte()),
        Type::byte()
      ])
      .unwrap()
    );
    let t = ETerm::app_from(erase(&to_byte), [ETerm::Zero, ETerm::Succ]);
    assert_eq!(eval(&env, t).value(), Some(3));
  }

  #[test]
  fn hash_references_are_erased_once() {
    let env = Env::new();
    let h = Address::hash(b"id");
    env.insert_term(h, id_term(), typecheck(&env, &id_term()).unwrap());
    let mut machine = Machine::new(&env);
    let t = ETerm::app(
      ETerm::Hash(h),
      ETerm::app(ETerm::Hash(h), ETerm::Byte(1)),
    );
    let outcome = machine.run_erased(t).unwrap();
    assert_eq!(outcome.state().value(), Some(1));
    assert_eq!(machine.cache.len(), 1);
    assert_eq!(machine.cache.get(&h).map(|e| e.as_ref()), Some(&ETerm::id()));
  }

  #[test]
  fn undefined_hash_is_an_error() {
    let env = Env::new();
    let h = Address::hash(b"nothing");
    assert_eq!(
      Machine::new(&env).run_erased(ETerm::Hash(h)),
      Err(MachineError::UndefinedHash { hash: h })
    );
  }

  #[test]
  fn stuck_states_halt() {
    let env = Env::new();
    // a byte in function position
    let t = ETerm::app(ETerm::Byte(1), ETerm::Byte(2));
    let state = eval(&env, t);
    assert_eq!(state.term.as_ref(), &ETerm::Byte(1));
    assert!(state.value().is_none());
    // a free variable
    assert_eq!(eval(&env, ETerm::Var(3)).term.as_ref(), &ETerm::Var(3));
  }

  #[test]
  fn fuel_bounds_divergence() {
    let env = Env::new();
    let delta = ETerm::abs(ETerm::app(ETerm::Var(0), ETerm::Var(0)));
    let omega = ETerm::app(delta.clone(), delta);
    let outcome = Machine::with_fuel(&env, 1000).run_erased(omega).unwrap();
    assert!(matches!(outcome, Outcome::Exhausted(_)));
    // fuel large enough for a terminating term does not interfere
    let t = ETerm::app(ETerm::Succ, ETerm::Zero);
    let outcome = Machine::with_fuel(&env, 1000).run_erased(t).unwrap();
    assert_eq!(outcome.state().value(), Some(1));
  }

  #[test]
  fn evaluation_is_deterministic() {
    let env = Env::new();
    let (nat_addr, zero, succ) = peano(&env);
    let two = Term::app(succ.clone(), Term::app(succ, zero));
    let to_byte = Term::app_t(Term::app(Term::Unpack(nat_addr), two), Type::byte());
    let t = ETerm::app_from(erase(&to_byte), [ETerm::Zero, ETerm::Succ]);
    let a = eval(&env, t.clone());
    let b = eval(&env, t);
    assert_eq!(a, b);
    assert_eq!(a.value(), Some(2));
  }
}
