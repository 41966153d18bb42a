//! Content addresses based on Blake3 hashing.
//!
//! Every stored kind-checked type definition and type-checked term is named
//! by the [`Address`] of its canonical serialization.

use blake3::Hash;
use std::cmp::{Ordering, PartialOrd};
use std::fmt;
use std::hash::{Hash as StdHash, Hasher};

use super::error::SerializeError;

/// Number of bytes in a content address.
pub const HASH_SIZE: usize = 32;

/// A 32-byte Blake3 content address.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Address {
  hash: Hash,
}

impl Address {
  /// Constructs an address from a 32-byte slice.
  pub fn from_slice(input: &[u8]) -> Result<Self, SerializeError> {
    let bytes: [u8; HASH_SIZE] = input
      .try_into()
      .map_err(|_| SerializeError::InvalidHash { len: input.len() })?;
    Ok(Address { hash: Hash::from_bytes(bytes) })
  }

  /// Constructs an address from its raw digest.
  pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
    Address { hash: Hash::from_bytes(bytes) }
  }

  /// Parses exactly 64 hexadecimal characters.
  pub fn from_hex(hex: &str) -> Result<Self, SerializeError> {
    if hex.len() != HASH_SIZE * 2 {
      return Err(SerializeError::InvalidHash { len: hex.len() / 2 });
    }
    let hash = Hash::from_hex(hex)
      .map_err(|_| SerializeError::InvalidHex { hex: hex.to_owned() })?;
    Ok(Address { hash })
  }

  /// Hashes arbitrary bytes with Blake3 and returns the resulting address.
  pub fn hash(input: &[u8]) -> Self {
    Address { hash: blake3::hash(input) }
  }

  /// Returns the address as a lowercase hexadecimal string.
  pub fn hex(&self) -> String {
    self.hash.to_hex().as_str().to_owned()
  }

  /// Returns the raw 32-byte digest.
  pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
    self.hash.as_bytes()
  }

  /// First eight hex characters, for log lines.
  pub fn short(&self) -> String {
    self.hex()[..8].to_owned()
  }
}

/// A recomputed digest disagreed with the address it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMismatch {
  pub expected: Address,
  pub found: Address,
}

impl fmt::Display for HashMismatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "hash does not match: expected {}, found {}", self.expected, self.found)
  }
}

impl std::error::Error for HashMismatch {}

/// Recomputes the digest of `bytes` and requires it to equal `expected`.
pub fn check_hash(expected: &Address, bytes: &[u8]) -> Result<(), HashMismatch> {
  let found = Address::hash(bytes);
  if &found == expected {
    Ok(())
  } else {
    Err(HashMismatch { expected: *expected, found })
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.hash.to_hex())
  }
}

impl fmt::Debug for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Address({})", self.short())
  }
}

impl Ord for Address {
  fn cmp(&self, other: &Address) -> Ordering {
    self.as_bytes().cmp(other.as_bytes())
  }
}

impl PartialOrd for Address {
  fn partial_cmp(&self, other: &Address) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl StdHash for Address {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.as_bytes().hash(state);
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;
  use quickcheck::{Arbitrary, Gen};

  impl Arbitrary for Address {
    fn arbitrary(g: &mut Gen) -> Self {
      let mut bytes = [0u8; HASH_SIZE];
      for b in &mut bytes {
        *b = u8::arbitrary(g);
      }
      Address::from_bytes(bytes)
    }
  }

  #[quickcheck]
  fn prop_hex_roundtrip(addr: Address) -> bool {
    let hex = addr.hex();
    hex.len() == 64 && Address::from_hex(&hex) == Ok(addr)
  }

  #[test]
  fn rejects_bad_hex() {
    assert!(Address::from_hex("abcd").is_err());
    let long = "0".repeat(66);
    assert!(Address::from_hex(&long).is_err());
    let mut bad = "0".repeat(63);
    bad.push('g');
    assert!(matches!(
      Address::from_hex(&bad),
      Err(SerializeError::InvalidHex { .. })
    ));
  }

  #[test]
  fn check_hash_detects_mismatch() {
    let addr = Address::hash(b"abc");
    assert!(check_hash(&addr, b"abc").is_ok());
    let err = check_hash(&addr, b"abd").unwrap_err();
    assert_eq!(err.expected, addr);
    assert_eq!(err.found, Address::hash(b"abd"));
  }
}
