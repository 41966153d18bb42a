//! Error types for the codec and the checker.

use super::address::Address;
use super::kind::Kind;
use super::term::Term;
use super::typ::Type;

/// Errors during serialization/deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
  /// Unexpected end of buffer
  UnexpectedEof { expected: &'static str },
  /// Invalid tag byte
  InvalidTag { tag: u8, context: &'static str },
  /// Constant byte out of range
  InvalidConst { byte: u8, context: &'static str },
  /// Variable index above what one byte can carry
  IndexTooLarge { idx: u64, max: u64, context: &'static str },
  /// Type definition with more than 255 parameters
  TooManyParams { count: usize },
  /// Bytes left over after a complete value
  TrailingBytes { count: usize, context: &'static str },
  /// Hash field of the wrong length
  InvalidHash { len: usize },
  /// Hash string with a non-hex character
  InvalidHex { hex: String },
}

impl std::fmt::Display for SerializeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::UnexpectedEof { expected } => {
        write!(f, "unexpected EOF, expected {expected}")
      },
      Self::InvalidTag { tag, context } => {
        write!(f, "invalid tag 0x{tag:02X} in {context}")
      },
      Self::InvalidConst { byte, context } => {
        write!(f, "invalid constant byte {byte} in {context}")
      },
      Self::IndexTooLarge { idx, max, context } => {
        write!(f, "cannot serialize {context} {idx}, too big ({max})")
      },
      Self::TooManyParams { count } => {
        write!(f, "type definition has too many parameters: {count}")
      },
      Self::TrailingBytes { count, context } => {
        write!(f, "deserialization failure ({count} trailing bytes) in {context}")
      },
      Self::InvalidHash { len } => {
        write!(f, "invalid hash: {len} bytes, expected 32")
      },
      Self::InvalidHex { hex } => write!(f, "invalid hex in hash: {hex}"),
    }
  }
}

impl std::error::Error for SerializeError {}

/// Kind- and type-checking failures. The first failure aborts the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcError {
  KindMismatch { ty: Type, expected: Kind, found: Kind },
  TypeMismatch { term: Term, expected: Type, found: Type },
  UndefinedVar { idx: u64 },
  UndefinedTypeVar { idx: u64 },
  UndefinedHash { hash: Address },
  UndefinedTypeHash { hash: Address },
  NotAKindFunction { ty: Type, kind: Kind },
  NotAFunction { term: Term, ty: Type },
  NotAForall { term: Term, ty: Type },
}

impl std::fmt::Display for TcError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TcError::KindMismatch { ty, expected, found } => {
        write!(f, "kindcheck failed in {ty}: {found} ~ {expected}")
      },
      TcError::TypeMismatch { term, expected, found } => {
        write!(f, "typecheck failed in {term}: {found} ~ {expected}")
      },
      TcError::UndefinedVar { idx } => write!(f, "undefined var {idx}"),
      TcError::UndefinedTypeVar { idx } => write!(f, "undefined tvar {idx}"),
      TcError::UndefinedHash { hash } => write!(f, "undefined hash #{hash}"),
      TcError::UndefinedTypeHash { hash } => {
        write!(f, "undefined type hash #{hash}")
      },
      TcError::NotAKindFunction { ty, kind } => {
        write!(f, "not a kind function in {ty}, got {kind}")
      },
      TcError::NotAFunction { term, ty } => {
        write!(f, "not a function in {term}, got {ty}")
      },
      TcError::NotAForall { term, ty } => {
        write!(f, "not a forall in {term}, got {ty}")
      },
    }
  }
}

impl std::error::Error for TcError {}
