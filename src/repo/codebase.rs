//! Checked access to a repository.
//!
//! A [`Codebase`] pairs a storage backend with the environment of checked
//! definitions. Nothing enters the environment, and nothing is written to
//! storage, before all of its dependencies have been fetched, verified
//! against their addresses and checked.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::core::address::{Address, HashMismatch, check_hash};
use crate::core::env::{Env, TermEntry, TypeEntry};
use crate::core::error::{SerializeError, TcError};
use crate::core::kind::Kind;
use crate::core::machine::{Machine, MachineError, Outcome};
use crate::core::serialize::{
  deserialize_tdef, deserialize_term, serialize_tdef, serialize_term,
};
use crate::core::tc::{kindcheck_tdef, typecheck};
use crate::core::term::Term;
use crate::core::typ::{TDef, Type};

use super::store::{NameRepo, Repo, Space, StoreError};

#[derive(Debug)]
pub enum Error {
  Store(StoreError),
  Serialize(SerializeError),
  Tc(TcError),
  Machine(MachineError),
  HashMismatch(HashMismatch),
  NameConflict { space: Space, name: String, existing: Address },
  /// The requested object is not in storage.
  NotFound { space: Space, hash: Address },
  /// The requested name is not bound.
  UnknownName { space: Space, name: String },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::Store(e) => write!(f, "store error: {e}"),
      Error::Serialize(e) => write!(f, "serialization error: {e}"),
      Error::Tc(e) => write!(f, "{e}"),
      Error::Machine(e) => write!(f, "{e}"),
      Error::HashMismatch(e) => write!(f, "{e}"),
      Error::NameConflict { space, name, existing } => {
        write!(f, "{space} name {name} is already bound to #{existing}")
      },
      Error::NotFound { space, hash } => write!(f, "{space} #{hash} not found"),
      Error::UnknownName { space, name } => {
        write!(f, "no {space} named {name}")
      },
    }
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Error::Store(e) => Some(e),
      Error::Serialize(e) => Some(e),
      Error::Tc(e) => Some(e),
      Error::Machine(e) => Some(e),
      Error::HashMismatch(e) => Some(e),
      _ => None,
    }
  }
}

impl From<StoreError> for Error {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::NameConflict { space, name, existing } => {
        Error::NameConflict { space, name, existing }
      },
      e => Error::Store(e),
    }
  }
}

impl From<SerializeError> for Error {
  fn from(e: SerializeError) -> Self {
    Error::Serialize(e)
  }
}

impl From<TcError> for Error {
  fn from(e: TcError) -> Self {
    Error::Tc(e)
  }
}

impl From<MachineError> for Error {
  fn from(e: MachineError) -> Self {
    Error::Machine(e)
  }
}

impl From<HashMismatch> for Error {
  fn from(e: HashMismatch) -> Self {
    Error::HashMismatch(e)
  }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of adding an object: its address, its type or kind, and
/// whether the bytes were newly written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Added<S> {
  pub hash: Address,
  pub sig: S,
  pub written: bool,
}

pub struct Codebase<R> {
  pub repo: R,
  pub env: Env,
}

impl<R: Repo> Codebase<R> {
  pub fn new(repo: R) -> Self {
    Codebase { repo, env: Env::new() }
  }

  /// Fetches a blob and verifies it against its address.
  fn fetch(&self, space: Space, hash: &Address) -> Result<Option<Vec<u8>>> {
    debug!(%space, hash = %hash.short(), "fetching");
    let Some(bytes) = self.repo.get(space, hash)? else {
      return Ok(None);
    };
    if let Err(e) = check_hash(hash, &bytes) {
      warn!(%space, hash = %hash.short(), "stored bytes do not match address");
      return Err(e.into());
    }
    Ok(Some(bytes))
  }

  /// Resolves and checks a stored term, `None` if storage lacks it.
  fn load_term(&self, hash: &Address) -> Result<Option<TermEntry>> {
    if let Some(entry) = self.env.get_term(hash) {
      return Ok(Some(entry));
    }
    let Some(bytes) = self.fetch(Space::Term, hash)? else {
      return Ok(None);
    };
    let term = deserialize_term(&bytes)?;
    let typ = self.check_term(&term)?;
    self.env.insert_term(*hash, term, typ);
    Ok(self.env.get_term(hash))
  }

  fn load_tdef(&self, hash: &Address) -> Result<Option<TypeEntry>> {
    if let Some(entry) = self.env.get_type(hash) {
      return Ok(Some(entry));
    }
    let Some(bytes) = self.fetch(Space::Type, hash)? else {
      return Ok(None);
    };
    let tdef = deserialize_tdef(&bytes)?;
    let kind = self.check_tdef_body(&tdef)?;
    self.env.insert_type(*hash, tdef, kind);
    Ok(self.env.get_type(hash))
  }

  /// Loads every referenced hash into the environment, siblings in
  /// parallel. A reference missing from storage is an undefined hash.
  fn resolve(
    &self,
    terms: FxHashSet<Address>,
    types: FxHashSet<Address>,
  ) -> Result<()> {
    let terms: Vec<Address> = terms.into_iter().collect();
    let types: Vec<Address> = types.into_iter().collect();
    let (types_res, terms_res) = rayon::join(
      || {
        types.par_iter().try_for_each(|h| -> Result<()> {
          match self.load_tdef(h)? {
            Some(_) => Ok(()),
            None => Err(TcError::UndefinedTypeHash { hash: *h }.into()),
          }
        })
      },
      || {
        terms.par_iter().try_for_each(|h| -> Result<()> {
          match self.load_term(h)? {
            Some(_) => Ok(()),
            None => Err(TcError::UndefinedHash { hash: *h }.into()),
          }
        })
      },
    );
    types_res?;
    terms_res
  }

  fn check_term(&self, term: &Term) -> Result<Type> {
    let mut terms = FxHashSet::default();
    let mut types = FxHashSet::default();
    term.references(&mut terms, &mut types);
    self.resolve(terms, types)?;
    Ok(typecheck(&self.env, term)?)
  }

  fn check_tdef_body(&self, tdef: &TDef) -> Result<Kind> {
    let mut types = FxHashSet::default();
    tdef.references(&mut types);
    self.resolve(FxHashSet::default(), types)?;
    Ok(kindcheck_tdef(&self.env, tdef)?)
  }

  /// Fetches, resolves and checks the term stored at `hash`.
  pub fn get_def(&self, hash: &Address) -> Result<(Term, Type)> {
    match self.load_term(hash)? {
      Some(TermEntry { term, typ }) => Ok((term, typ)),
      None => Err(Error::NotFound { space: Space::Term, hash: *hash }),
    }
  }

  /// Fetches, resolves and kind-checks the type definition at `hash`.
  pub fn get_tdef(&self, hash: &Address) -> Result<(TDef, Kind)> {
    match self.load_tdef(hash)? {
      Some(TypeEntry { tdef, kind }) => Ok((tdef, kind)),
      None => Err(Error::NotFound { space: Space::Type, hash: *hash }),
    }
  }

  /// Resolves and checks `term` without storing it. Returns the address it
  /// would be stored under and its type.
  pub fn check_def(&self, term: &Term) -> Result<(Address, Type)> {
    let typ = self.check_term(term)?;
    let bytes = serialize_term(term)?;
    Ok((Address::hash(&bytes), typ))
  }

  pub fn check_tdef(&self, tdef: &TDef) -> Result<(Address, Kind)> {
    let kind = self.check_tdef_body(tdef)?;
    let bytes = serialize_tdef(tdef)?;
    Ok((Address::hash(&bytes), kind))
  }

  /// Checks and stores `term`. Adding identical content again is a no-op
  /// reported through `written`.
  pub fn add_def(&self, term: &Term) -> Result<Added<Type>> {
    let typ = self.check_term(term)?;
    let bytes = serialize_term(term)?;
    let hash = Address::hash(&bytes);
    self.env.insert_term(hash, term.clone(), typ.clone());
    let written = self.repo.put(Space::Term, &hash, &bytes)?;
    info!(hash = %hash.short(), written, "added term");
    Ok(Added { hash, sig: typ, written })
  }

  pub fn add_tdef(&self, tdef: &TDef) -> Result<Added<Kind>> {
    let kind = self.check_tdef_body(tdef)?;
    let bytes = serialize_tdef(tdef)?;
    let hash = Address::hash(&bytes);
    self.env.insert_type(hash, tdef.clone(), kind.clone());
    let written = self.repo.put(Space::Type, &hash, &bytes)?;
    info!(hash = %hash.short(), written, "added type definition");
    Ok(Added { hash, sig: kind, written })
  }

  /// Checks `term`, then runs it on the machine with an optional
  /// transition budget.
  pub fn evaluate(&self, term: &Term, fuel: Option<u64>) -> Result<Outcome> {
    self.check_term(term)?;
    let mut machine = match fuel {
      Some(fuel) => Machine::with_fuel(&self.env, fuel),
      None => Machine::new(&self.env),
    };
    Ok(machine.evaluate(term)?)
  }
}

impl<R: NameRepo> Codebase<R> {
  fn ensure_bindable(
    &self,
    space: Space,
    name: &str,
    hash: &Address,
    update: bool,
  ) -> Result<()> {
    match self.repo.get_name(space, name)? {
      Some(existing) if existing != *hash && !update => {
        Err(Error::NameConflict { space, name: name.to_string(), existing })
      },
      _ => Ok(()),
    }
  }

  /// Adds `term` and binds `name` to it. Returns whether the name was
  /// newly bound. A conflicting name is reported before anything is
  /// written.
  pub fn add_def_named(
    &self,
    name: &str,
    term: &Term,
    update: bool,
  ) -> Result<(Added<Type>, bool)> {
    let (hash, _) = self.check_def(term)?;
    self.ensure_bindable(Space::Term, name, &hash, update)?;
    let added = self.add_def(term)?;
    let bound = self.repo.add_hash_by_name(name, &added.hash, update)?;
    info!(label = name, hash = %added.hash.short(), bound, "named term");
    Ok((added, bound))
  }

  pub fn add_tdef_named(
    &self,
    name: &str,
    tdef: &TDef,
    update: bool,
  ) -> Result<(Added<Kind>, bool)> {
    let (hash, _) = self.check_tdef(tdef)?;
    self.ensure_bindable(Space::Type, name, &hash, update)?;
    let added = self.add_tdef(tdef)?;
    let bound = self.repo.add_thash_by_name(name, &added.hash, update)?;
    info!(label = name, hash = %added.hash.short(), bound, "named type definition");
    Ok((added, bound))
  }

  pub fn get_def_by_name(&self, name: &str) -> Result<(Address, Term, Type)> {
    let hash = self.repo.get_hash_by_name(name)?.ok_or_else(|| {
      Error::UnknownName { space: Space::Term, name: name.to_string() }
    })?;
    let (term, typ) = self.get_def(&hash)?;
    Ok((hash, term, typ))
  }

  pub fn get_tdef_by_name(&self, name: &str) -> Result<(Address, TDef, Kind)> {
    let hash = self.repo.get_thash_by_name(name)?.ok_or_else(|| {
      Error::UnknownName { space: Space::Type, name: name.to_string() }
    })?;
    let (tdef, kind) = self.get_tdef(&hash)?;
    Ok((hash, tdef, kind))
  }

  pub fn remove_def_name(&self, name: &str) -> Result<bool> {
    Ok(self.repo.remove_hash_by_name(name)?)
  }

  pub fn remove_tdef_name(&self, name: &str) -> Result<bool> {
    Ok(self.repo.remove_thash_by_name(name)?)
  }
}
