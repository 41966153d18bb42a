//! Storage capabilities and the in-memory backend.
//!
//! A [`Repo`] maps content addresses to serialized bytes, with separate
//! spaces for terms and type definitions. A [`NameRepo`] additionally binds
//! human-readable names to addresses.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::io;

use crate::core::address::Address;
use crate::core::error::SerializeError;

/// Which kind of object a blob or name refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Space {
  Term,
  Type,
}

impl Space {
  pub fn dir_name(&self) -> &'static str {
    match self {
      Space::Term => "terms",
      Space::Type => "types",
    }
  }
}

impl fmt::Display for Space {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Space::Term => write!(f, "term"),
      Space::Type => write!(f, "type"),
    }
  }
}

#[derive(Debug)]
pub enum StoreError {
  IoError(io::Error),
  NoHome,
  /// Names must be non-empty and free of path separators and NUL.
  InvalidName(String),
  /// A name file that does not hold a valid address.
  BadAddress(SerializeError),
  /// The name is bound to another address and no update was requested.
  NameConflict { space: Space, name: String, existing: Address },
}

impl fmt::Display for StoreError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StoreError::IoError(e) => write!(f, "IO error: {e}"),
      StoreError::NoHome => write!(f, "no HOME environment variable"),
      StoreError::InvalidName(n) => write!(f, "invalid name {n:?}"),
      StoreError::BadAddress(e) => write!(f, "bad stored address: {e}"),
      StoreError::NameConflict { space, name, existing } => {
        write!(f, "{space} name {name} is already bound to #{existing}")
      },
    }
  }
}

impl std::error::Error for StoreError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      StoreError::IoError(e) => Some(e),
      StoreError::BadAddress(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for StoreError {
  fn from(error: io::Error) -> Self {
    StoreError::IoError(error)
  }
}

impl From<SerializeError> for StoreError {
  fn from(error: SerializeError) -> Self {
    StoreError::BadAddress(error)
  }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn validate_name(name: &str) -> StoreResult<()> {
  let bad = name.is_empty()
    || name == "."
    || name == ".."
    || name.contains(['/', '\\', '\0']);
  if bad { Err(StoreError::InvalidName(name.to_string())) } else { Ok(()) }
}

/// Content-addressed blob storage.
pub trait Repo: Send + Sync {
  /// The bytes stored under `hash`, `None` if absent.
  fn get(&self, space: Space, hash: &Address) -> StoreResult<Option<Vec<u8>>>;

  /// Stores `bytes` under `hash`. Returns `false` without writing if the
  /// address is already present.
  fn put(&self, space: Space, hash: &Address, bytes: &[u8]) -> StoreResult<bool>;

  fn get_def(&self, hash: &Address) -> StoreResult<Option<Vec<u8>>> {
    self.get(Space::Term, hash)
  }

  fn get_tdef(&self, hash: &Address) -> StoreResult<Option<Vec<u8>>> {
    self.get(Space::Type, hash)
  }

  fn add_def(&self, hash: &Address, bytes: &[u8]) -> StoreResult<bool> {
    self.put(Space::Term, hash, bytes)
  }

  fn add_tdef(&self, hash: &Address, bytes: &[u8]) -> StoreResult<bool> {
    self.put(Space::Type, hash, bytes)
  }
}

/// Name bindings on top of a [`Repo`].
pub trait NameRepo: Repo {
  fn get_name(&self, space: Space, name: &str) -> StoreResult<Option<Address>>;

  /// Binds `name` to `hash`. Returns `true` if the name was unbound.
  /// Rebinding to the same address is a no-op; rebinding to a different
  /// one needs `update` and otherwise fails with `NameConflict`.
  fn bind_name(
    &self,
    space: Space,
    name: &str,
    hash: &Address,
    update: bool,
  ) -> StoreResult<bool>;

  /// Returns `true` if a binding was removed.
  fn remove_name(&self, space: Space, name: &str) -> StoreResult<bool>;

  fn get_hash_by_name(&self, name: &str) -> StoreResult<Option<Address>> {
    self.get_name(Space::Term, name)
  }

  fn get_thash_by_name(&self, name: &str) -> StoreResult<Option<Address>> {
    self.get_name(Space::Type, name)
  }

  fn add_hash_by_name(
    &self,
    name: &str,
    hash: &Address,
    update: bool,
  ) -> StoreResult<bool> {
    self.bind_name(Space::Term, name, hash, update)
  }

  fn add_thash_by_name(
    &self,
    name: &str,
    hash: &Address,
    update: bool,
  ) -> StoreResult<bool> {
    self.bind_name(Space::Type, name, hash, update)
  }

  fn remove_hash_by_name(&self, name: &str) -> StoreResult<bool> {
    self.remove_name(Space::Term, name)
  }

  fn remove_thash_by_name(&self, name: &str) -> StoreResult<bool> {
    self.remove_name(Space::Type, name)
  }
}

/// A repository held entirely in memory.
#[derive(Debug, Default)]
pub struct MemRepo {
  pub blobs: DashMap<(Space, Address), Vec<u8>>,
  pub names: DashMap<(Space, String), Address>,
}

impl MemRepo {
  pub fn new() -> Self {
    MemRepo::default()
  }

  pub fn blob_count(&self) -> usize {
    self.blobs.len()
  }
}

impl Repo for MemRepo {
  fn get(&self, space: Space, hash: &Address) -> StoreResult<Option<Vec<u8>>> {
    Ok(self.blobs.get(&(space, *hash)).map(|b| b.clone()))
  }

  fn put(&self, space: Space, hash: &Address, bytes: &[u8]) -> StoreResult<bool> {
    match self.blobs.entry((space, *hash)) {
      Entry::Occupied(_) => Ok(false),
      Entry::Vacant(e) => {
        e.insert(bytes.to_vec());
        Ok(true)
      },
    }
  }
}

impl NameRepo for MemRepo {
  fn get_name(&self, space: Space, name: &str) -> StoreResult<Option<Address>> {
    validate_name(name)?;
    Ok(self.names.get(&(space, name.to_string())).map(|a| *a))
  }

  fn bind_name(
    &self,
    space: Space,
    name: &str,
    hash: &Address,
    update: bool,
  ) -> StoreResult<bool> {
    validate_name(name)?;
    match self.names.entry((space, name.to_string())) {
      Entry::Vacant(e) => {
        e.insert(*hash);
        Ok(true)
      },
      Entry::Occupied(mut e) => {
        let existing = *e.get();
        if existing == *hash {
          Ok(false)
        } else if update {
          e.insert(*hash);
          Ok(false)
        } else {
          Err(StoreError::NameConflict {
            space,
            name: name.to_string(),
            existing,
          })
        }
      },
    }
  }

  fn remove_name(&self, space: Space, name: &str) -> StoreResult<bool> {
    validate_name(name)?;
    Ok(self.names.remove(&(space, name.to_string())).is_some())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn put_is_idempotent_per_space() {
    let repo = MemRepo::new();
    let h = Address::hash(b"bytes");
    assert!(repo.add_def(&h, b"bytes").unwrap());
    assert!(!repo.add_def(&h, b"bytes").unwrap());
    assert_eq!(repo.get_def(&h).unwrap(), Some(b"bytes".to_vec()));
    assert_eq!(repo.get_tdef(&h).unwrap(), None);
    assert!(repo.add_tdef(&h, b"bytes").unwrap());
    assert_eq!(repo.blob_count(), 2);
  }

  #[test]
  fn name_bindings() {
    let repo = MemRepo::new();
    let a = Address::hash(b"a");
    let b = Address::hash(b"b");
    assert!(repo.add_hash_by_name("id", &a, false).unwrap());
    assert!(!repo.add_hash_by_name("id", &a, false).unwrap());
    assert!(matches!(
      repo.add_hash_by_name("id", &b, false),
      Err(StoreError::NameConflict { existing, .. }) if existing == a
    ));
    assert_eq!(repo.get_hash_by_name("id").unwrap(), Some(a));
    assert!(!repo.add_hash_by_name("id", &b, true).unwrap());
    assert_eq!(repo.get_hash_by_name("id").unwrap(), Some(b));
    // term and type names live apart
    assert_eq!(repo.get_thash_by_name("id").unwrap(), None);
    assert!(repo.remove_hash_by_name("id").unwrap());
    assert!(!repo.remove_hash_by_name("id").unwrap());
    assert_eq!(repo.get_hash_by_name("id").unwrap(), None);
  }

  #[test]
  fn invalid_names() {
    let repo = MemRepo::new();
    let a = Address::hash(b"a");
    for name in ["", ".", "..", "a/b", "a\\b", "a\0b"] {
      assert!(matches!(
        repo.add_thash_by_name(name, &a, false),
        Err(StoreError::InvalidName(_))
      ));
    }
    assert!(repo.add_thash_by_name("Nat", &a, false).unwrap());
  }
}
