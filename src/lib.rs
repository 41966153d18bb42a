//! A content-addressed code database for a System F calculus with opaque
//! type definitions.
//!
//! Definitions are stored under the blake3 digest of their canonical
//! encoding, checked against their recursively resolved dependencies before
//! use, and can be evaluated on a CEK-style machine after type erasure.

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod cons_list;
pub mod core;
pub mod repo;
pub mod surface;
