//! Content-addressed storage of checked definitions.

pub mod codebase;
pub mod file;
pub mod store;

pub use codebase::{Added, Codebase, Error, Result};
pub use file::FileRepo;
pub use store::{MemRepo, NameRepo, Repo, Space, StoreError, StoreResult};
