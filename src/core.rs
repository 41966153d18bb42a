//! The nameless core calculus: kinds, types and terms over de Bruijn
//! indices, their canonical encoding, the checker and the evaluator.

pub mod address;
pub mod env;
pub mod error;
pub mod kind;
pub mod machine;
pub mod serialize;
pub mod tc;
pub mod term;
pub mod typ;

pub use address::{Address, HashMismatch, check_hash};
pub use env::Env;
pub use error::{SerializeError, TcError};
pub use kind::Kind;
pub use machine::{ETerm, Machine, MachineError, Outcome, erase};
pub use tc::{TypeChecker, kindcheck, kindcheck_tdef, typecheck};
pub use term::Term;
pub use typ::{TCon, TDef, Type};
