//! The hash environment: checked definitions known to this session.

use dashmap::DashMap;

use super::address::Address;
use super::kind::Kind;
use super::term::Term;
use super::typ::{TDef, Type};

/// A kind-checked type definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeEntry {
  pub tdef: TDef,
  pub kind: Kind,
}

/// A type-checked term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermEntry {
  pub term: Term,
  pub typ: Type,
}

/// Checked definitions indexed by content address.
///
/// Entries are inserted only after checking succeeds and are never replaced:
/// an address determines its content, so two writers racing on the same key
/// always carry equal entries and the first one wins.
#[derive(Debug, Default)]
pub struct Env {
  /// Type definitions: Address -> (definition, kind)
  pub types: DashMap<Address, TypeEntry>,
  /// Terms: Address -> (term, type)
  pub terms: DashMap<Address, TermEntry>,
}

impl Env {
  pub fn new() -> Self {
    Env { types: DashMap::new(), terms: DashMap::new() }
  }

  /// Record a checked type definition unless already present.
  pub fn insert_type(&self, addr: Address, tdef: TDef, kind: Kind) {
    self.types.entry(addr).or_insert(TypeEntry { tdef, kind });
  }

  /// Record a checked term unless already present.
  pub fn insert_term(&self, addr: Address, term: Term, typ: Type) {
    self.terms.entry(addr).or_insert(TermEntry { term, typ });
  }

  pub fn get_type(&self, addr: &Address) -> Option<TypeEntry> {
    self.types.get(addr).map(|r| r.clone())
  }

  pub fn get_term(&self, addr: &Address) -> Option<TermEntry> {
    self.terms.get(addr).map(|r| r.clone())
  }

  /// Kind of a stored type definition.
  pub fn type_kind(&self, addr: &Address) -> Option<Kind> {
    self.types.get(addr).map(|r| r.kind.clone())
  }

  /// Type of a stored term.
  pub fn term_type(&self, addr: &Address) -> Option<Type> {
    self.terms.get(addr).map(|r| r.typ.clone())
  }

  pub fn has_type(&self, addr: &Address) -> bool {
    self.types.contains_key(addr)
  }

  pub fn has_term(&self, addr: &Address) -> bool {
    self.terms.contains_key(addr)
  }

  pub fn type_count(&self) -> usize {
    self.types.len()
  }

  pub fn term_count(&self) -> usize {
    self.terms.len()
  }
}
