//! The named surface calculus and its elaboration into the core.

pub mod elab;
pub mod term;
pub mod typ;

pub use elab::{ElabError, ElabResult, Elaborator, Scope};
pub use term::Term;
pub use typ::{TDef, Type};
