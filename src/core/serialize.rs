//! Canonical byte encoding of kinds, types, type definitions and terms.
//!
//! Every non-leaf constructor is introduced by a tag byte. Variables are
//! encoded inline as `index + offset` in a single byte, so each grammar
//! reserves the bytes below its offset for tags. Decoding must consume the
//! whole buffer; the encoding of a value is unique, which is what makes it
//! suitable for content addressing.

#![allow(clippy::cast_possible_truncation)]

use super::address::{Address, HASH_SIZE};
use super::error::SerializeError;
use super::kind::Kind;
use super::term::Term;
use super::typ::{TCon, TDef, Type};

type SResult<T> = Result<T, SerializeError>;

// Kind tags
pub const KIND_CON: u8 = 0;
pub const KIND_FUN: u8 = 1;
// Kind constants
pub const KCON_TYPE: u8 = 0;

// Type tags
pub const TYPE_CON: u8 = 0;
pub const TYPE_HASH: u8 = 1;
pub const TYPE_APP: u8 = 2;
pub const TYPE_FORALL: u8 = 3;
// Type constants
pub const TCON_FUN: u8 = 0;
pub const TCON_BYTE: u8 = 1;
/// Type variable `i` is the byte `i + TVAR_BYTE`.
pub const TVAR_BYTE: u8 = 4;
pub const MAX_TVAR: u64 = (u8::MAX - TVAR_BYTE) as u64;

// Term tags
pub const TERM_CON: u8 = 0;
pub const TERM_HASH: u8 = 1;
pub const TERM_ABS: u8 = 2;
pub const TERM_APP: u8 = 3;
pub const TERM_ABST: u8 = 4;
pub const TERM_APPT: u8 = 5;
pub const TERM_PACK: u8 = 6;
pub const TERM_UNPACK: u8 = 7;
/// Term variable `i` is the byte `i + VAR_BYTE`.
pub const VAR_BYTE: u8 = 8;
pub const MAX_VAR: u64 = (u8::MAX - VAR_BYTE) as u64;

// ============================================================================
// Primitive helpers
// ============================================================================

fn get_u8(buf: &mut &[u8], expected: &'static str) -> SResult<u8> {
  match buf.split_first() {
    Some((&x, rest)) => {
      *buf = rest;
      Ok(x)
    },
    None => Err(SerializeError::UnexpectedEof { expected }),
  }
}

fn put_address(a: &Address, buf: &mut Vec<u8>) {
  buf.extend_from_slice(a.as_bytes());
}

fn get_address(buf: &mut &[u8]) -> SResult<Address> {
  match buf.split_at_checked(HASH_SIZE) {
    Some((head, rest)) => {
      *buf = rest;
      Address::from_slice(head)
    },
    None => Err(SerializeError::UnexpectedEof { expected: "32 hash bytes" }),
  }
}

fn finish<T>(value: T, rest: &[u8], context: &'static str) -> SResult<T> {
  if rest.is_empty() {
    Ok(value)
  } else {
    Err(SerializeError::TrailingBytes { count: rest.len(), context })
  }
}

// ============================================================================
// Kinds
// ============================================================================

pub fn put_kind(k: &Kind, buf: &mut Vec<u8>) {
  match k {
    Kind::Star => {
      buf.push(KIND_CON);
      buf.push(KCON_TYPE);
    },
    Kind::Fun(l, r) => {
      buf.push(KIND_FUN);
      put_kind(l, buf);
      put_kind(r, buf);
    },
  }
}

pub fn get_kind(buf: &mut &[u8]) -> SResult<Kind> {
  match get_u8(buf, "kind tag")? {
    KIND_CON => match get_u8(buf, "kind constant")? {
      KCON_TYPE => Ok(Kind::Star),
      byte => Err(SerializeError::InvalidConst { byte, context: "kind" }),
    },
    KIND_FUN => {
      let l = get_kind(buf)?;
      let r = get_kind(buf)?;
      Ok(Kind::fun(l, r))
    },
    tag => Err(SerializeError::InvalidTag { tag, context: "kind" }),
  }
}

// ============================================================================
// Types
// ============================================================================

pub fn put_type(t: &Type, buf: &mut Vec<u8>) -> SResult<()> {
  match t {
    Type::Var(idx) => {
      if *idx > MAX_TVAR {
        return Err(SerializeError::IndexTooLarge {
          idx: *idx,
          max: MAX_TVAR,
          context: "tvar",
        });
      }
      buf.push(*idx as u8 + TVAR_BYTE);
    },
    Type::Con(c) => {
      buf.push(TYPE_CON);
      buf.push(match c {
        TCon::Fun => TCON_FUN,
        TCon::Byte => TCON_BYTE,
      });
    },
    Type::Hash(h) => {
      buf.push(TYPE_HASH);
      put_address(h, buf);
    },
    Type::App(f, a) => {
      buf.push(TYPE_APP);
      put_type(f, buf)?;
      put_type(a, buf)?;
    },
    Type::Forall(k, b) => {
      buf.push(TYPE_FORALL);
      put_kind(k, buf);
      put_type(b, buf)?;
    },
  }
  Ok(())
}

pub fn get_type(buf: &mut &[u8]) -> SResult<Type> {
  match get_u8(buf, "type tag")? {
    TYPE_CON => match get_u8(buf, "type constant")? {
      TCON_FUN => Ok(Type::Con(TCon::Fun)),
      TCON_BYTE => Ok(Type::Con(TCon::Byte)),
      byte => Err(SerializeError::InvalidConst { byte, context: "type" }),
    },
    TYPE_HASH => Ok(Type::Hash(get_address(buf)?)),
    TYPE_APP => {
      let f = get_type(buf)?;
      let a = get_type(buf)?;
      Ok(Type::app(f, a))
    },
    TYPE_FORALL => {
      let k = get_kind(buf)?;
      let b = get_type(buf)?;
      Ok(Type::forall(k, b))
    },
    byte => Ok(Type::Var(u64::from(byte - TVAR_BYTE))),
  }
}

// ============================================================================
// Type definitions
// ============================================================================

pub fn put_tdef(def: &TDef, buf: &mut Vec<u8>) -> SResult<()> {
  let count = def.kinds.len();
  let len = u8::try_from(count)
    .map_err(|_| SerializeError::TooManyParams { count })?;
  buf.push(len);
  for k in &def.kinds {
    put_kind(k, buf);
  }
  put_type(&def.body, buf)
}

pub fn get_tdef(buf: &mut &[u8]) -> SResult<TDef> {
  let len = get_u8(buf, "type definition arity")?;
  let kinds =
    (0..len).map(|_| get_kind(buf)).collect::<SResult<Vec<_>>>()?;
  let body = get_type(buf)?;
  Ok(TDef { kinds, body })
}

// ============================================================================
// Terms
// ============================================================================

pub fn put_term(t: &Term, buf: &mut Vec<u8>) -> SResult<()> {
  match t {
    Term::Var(idx) => {
      if *idx > MAX_VAR {
        return Err(SerializeError::IndexTooLarge {
          idx: *idx,
          max: MAX_VAR,
          context: "var",
        });
      }
      buf.push(*idx as u8 + VAR_BYTE);
    },
    Term::Hash(h) => {
      buf.push(TERM_HASH);
      put_address(h, buf);
    },
    Term::Abs(ty, b) => {
      buf.push(TERM_ABS);
      put_type(ty, buf)?;
      put_term(b, buf)?;
    },
    Term::App(f, a) => {
      buf.push(TERM_APP);
      put_term(f, buf)?;
      put_term(a, buf)?;
    },
    Term::AbsT(k, b) => {
      buf.push(TERM_ABST);
      put_kind(k, buf);
      put_term(b, buf)?;
    },
    Term::AppT(f, ty) => {
      buf.push(TERM_APPT);
      put_term(f, buf)?;
      put_type(ty, buf)?;
    },
    Term::Pack(h) => {
      buf.push(TERM_PACK);
      put_address(h, buf);
    },
    Term::Unpack(h) => {
      buf.push(TERM_UNPACK);
      put_address(h, buf);
    },
  }
  Ok(())
}

pub fn get_term(buf: &mut &[u8]) -> SResult<Term> {
  match get_u8(buf, "term tag")? {
    TERM_CON => {
      let byte = buf.first().copied().unwrap_or(0);
      Err(SerializeError::InvalidConst { byte, context: "term" })
    },
    TERM_HASH => Ok(Term::Hash(get_address(buf)?)),
    TERM_ABS => {
      let ty = get_type(buf)?;
      let b = get_term(buf)?;
      Ok(Term::abs(ty, b))
    },
    TERM_APP => {
      let f = get_term(buf)?;
      let a = get_term(buf)?;
      Ok(Term::app(f, a))
    },
    TERM_ABST => {
      let k = get_kind(buf)?;
      let b = get_term(buf)?;
      Ok(Term::abs_t(k, b))
    },
    TERM_APPT => {
      let f = get_term(buf)?;
      let ty = get_type(buf)?;
      Ok(Term::app_t(f, ty))
    },
    TERM_PACK => Ok(Term::Pack(get_address(buf)?)),
    TERM_UNPACK => Ok(Term::Unpack(get_address(buf)?)),
    byte => Ok(Term::Var(u64::from(byte - VAR_BYTE))),
  }
}

// ============================================================================
// Whole-buffer entry points
// ============================================================================

pub fn serialize_kind(k: &Kind) -> Vec<u8> {
  let mut buf = vec![];
  put_kind(k, &mut buf);
  buf
}

pub fn deserialize_kind(bytes: &[u8]) -> SResult<Kind> {
  let mut buf = bytes;
  let k = get_kind(&mut buf)?;
  finish(k, buf, "kind")
}

pub fn serialize_type(t: &Type) -> SResult<Vec<u8>> {
  let mut buf = vec![];
  put_type(t, &mut buf)?;
  Ok(buf)
}

pub fn deserialize_type(bytes: &[u8]) -> SResult<Type> {
  let mut buf = bytes;
  let t = get_type(&mut buf)?;
  finish(t, buf, "type")
}

pub fn serialize_tdef(def: &TDef) -> SResult<Vec<u8>> {
  let mut buf = vec![];
  put_tdef(def, &mut buf)?;
  Ok(buf)
}

pub fn deserialize_tdef(bytes: &[u8]) -> SResult<TDef> {
  let mut buf = bytes;
  let def = get_tdef(&mut buf)?;
  finish(def, buf, "type definition")
}

pub fn serialize_term(t: &Term) -> SResult<Vec<u8>> {
  let mut buf = vec![];
  put_term(t, &mut buf)?;
  Ok(buf)
}

pub fn deserialize_term(bytes: &[u8]) -> SResult<Term> {
  let mut buf = bytes;
  let t = get_term(&mut buf)?;
  finish(t, buf, "term")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[quickcheck]
  fn prop_kind_roundtrip(k: Kind) -> bool {
    deserialize_kind(&serialize_kind(&k)) == Ok(k)
  }

  #[quickcheck]
  fn prop_type_roundtrip(t: Type) -> bool {
    match serialize_type(&t) {
      Ok(bytes) => deserialize_type(&bytes) == Ok(t),
      Err(_) => false,
    }
  }

  #[quickcheck]
  fn prop_tdef_roundtrip(def: TDef) -> bool {
    match serialize_tdef(&def) {
      Ok(bytes) => deserialize_tdef(&bytes) == Ok(def),
      Err(_) => false,
    }
  }

  #[quickcheck]
  fn prop_term_roundtrip(t: Term) -> bool {
    match serialize_term(&t) {
      Ok(bytes) => deserialize_term(&bytes) == Ok(t),
      Err(_) => false,
    }
  }

  #[quickcheck]
  fn prop_truncated_term_rejected(t: Term) -> bool {
    let Ok(bytes) = serialize_term(&t) else { return false };
    (0..bytes.len()).all(|n| deserialize_term(&bytes[..n]).is_err())
  }

  #[quickcheck]
  fn prop_trailing_bytes_rejected(t: Type, extra: u8) -> bool {
    let Ok(mut bytes) = serialize_type(&t) else { return false };
    bytes.push(extra);
    matches!(
      deserialize_type(&bytes),
      Err(SerializeError::TrailingBytes { count: 1, .. })
    )
  }

  #[test]
  fn polymorphic_identity_type_bytes() {
    let t = Type::forall(Kind::star(), Type::fun(Type::var(0), Type::var(0)));
    let bytes = serialize_type(&t).unwrap();
    assert_eq!(bytes, vec![
      TYPE_FORALL,
      KIND_CON,
      KCON_TYPE,
      TYPE_APP,
      TYPE_APP,
      TYPE_CON,
      TCON_FUN,
      TVAR_BYTE,
      TVAR_BYTE,
    ]);
    assert_eq!(bytes, vec![3, 0, 0, 2, 2, 0, 0, 4, 4]);
    assert_eq!(deserialize_type(&bytes).unwrap(), t);
  }

  #[test]
  fn index_caps() {
    assert!(serialize_type(&Type::var(MAX_TVAR)).is_ok());
    assert!(matches!(
      serialize_type(&Type::var(MAX_TVAR + 1)),
      Err(SerializeError::IndexTooLarge { idx: 252, max: 251, .. })
    ));
    assert_eq!(serialize_term(&Term::var(MAX_VAR)).unwrap(), vec![255]);
    assert!(matches!(
      serialize_term(&Term::var(MAX_VAR + 1)),
      Err(SerializeError::IndexTooLarge { idx: 248, max: 247, .. })
    ));
    // nested too-large index fails the whole encoding
    let t = Term::abs(Type::byte(), Term::var(1000));
    assert!(serialize_term(&t).is_err());
  }

  #[test]
  fn term_con_tag_is_rejected() {
    assert!(matches!(
      deserialize_term(&[TERM_CON, 0]),
      Err(SerializeError::InvalidConst { context: "term", .. })
    ));
  }

  #[test]
  fn invalid_constants_rejected() {
    assert!(deserialize_kind(&[KIND_CON, 1]).is_err());
    assert!(deserialize_kind(&[2]).is_err());
    assert!(deserialize_type(&[TYPE_CON, 2]).is_err());
  }

  #[test]
  fn short_hash_rejected() {
    let mut bytes = vec![TERM_HASH];
    bytes.extend_from_slice(&[7u8; 31]);
    assert!(matches!(
      deserialize_term(&bytes),
      Err(SerializeError::UnexpectedEof { .. })
    ));
    bytes.push(7);
    let addr = Address::from_bytes([7u8; 32]);
    assert_eq!(deserialize_term(&bytes).unwrap(), Term::Hash(addr));
  }

  #[test]
  fn tdef_layout() {
    let def = TDef::new(
      vec![Kind::star(), Kind::fun(Kind::star(), Kind::star())],
      Type::app(Type::var(0), Type::var(1)),
    );
    let bytes = serialize_tdef(&def).unwrap();
    assert_eq!(bytes, vec![2, 0, 0, 1, 0, 0, 0, 0, 2, 4, 5]);
    assert_eq!(deserialize_tdef(&bytes).unwrap(), def);
    let too_many = TDef::new(vec![Kind::star(); 256], Type::byte());
    assert!(matches!(
      serialize_tdef(&too_many),
      Err(SerializeError::TooManyParams { count: 256 })
    ));
  }
}
