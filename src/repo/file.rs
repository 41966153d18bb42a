//! A repository on the local filesystem.
//!
//! Layout under the store root:
//! `terms/<hex>` and `types/<hex>` hold serialized objects,
//! `names/terms/<name>` and `names/types/<name>` hold the hex address a name
//! is bound to.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::core::address::Address;

use super::store::{
  NameRepo, Repo, Space, StoreError, StoreResult, validate_name,
};

/// Overrides the default store location.
pub const STORE_ENV: &str = "TYHASH_STORE";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FileRepo {
  root: PathBuf,
}

impl FileRepo {
  /// Opens the store at `root`, creating its directories if needed.
  pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
    let root = root.into();
    for space in [Space::Term, Space::Type] {
      fs::create_dir_all(root.join(space.dir_name()))?;
      fs::create_dir_all(root.join("names").join(space.dir_name()))?;
    }
    debug!(root = %root.display(), "opened file repo");
    Ok(FileRepo { root })
  }

  /// Opens the store at `$TYHASH_STORE`, or `~/.tyhash/store`.
  pub fn open_default() -> StoreResult<Self> {
    Self::open(Self::default_root()?)
  }

  pub fn default_root() -> StoreResult<PathBuf> {
    if let Ok(path) = env::var(STORE_ENV) {
      return Ok(PathBuf::from(path));
    }
    let home = env::var("HOME").map(PathBuf::from).map_err(|_| StoreError::NoHome)?;
    Ok(home.join(".tyhash").join("store"))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn blob_path(&self, space: Space, hash: &Address) -> PathBuf {
    self.root.join(space.dir_name()).join(hash.hex())
  }

  fn name_path(&self, space: Space, name: &str) -> StoreResult<PathBuf> {
    validate_name(name)?;
    Ok(self.root.join("names").join(space.dir_name()).join(name))
  }

  /// Writes through a temporary file so readers never see partial content.
  fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tmp.{}.{n}", std::process::id()));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
  }

  fn read_opt(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

impl Repo for FileRepo {
  fn get(&self, space: Space, hash: &Address) -> StoreResult<Option<Vec<u8>>> {
    Self::read_opt(&self.blob_path(space, hash))
  }

  fn put(&self, space: Space, hash: &Address, bytes: &[u8]) -> StoreResult<bool> {
    let path = self.blob_path(space, hash);
    if path.exists() {
      return Ok(false);
    }
    Self::write_atomic(&path, bytes)?;
    Ok(true)
  }
}

impl NameRepo for FileRepo {
  fn get_name(&self, space: Space, name: &str) -> StoreResult<Option<Address>> {
    let path = self.name_path(space, name)?;
    match Self::read_opt(&path)? {
      None => Ok(None),
      Some(bytes) => {
        let hex = String::from_utf8_lossy(&bytes);
        Ok(Some(Address::from_hex(hex.trim())?))
      },
    }
  }

  fn bind_name(
    &self,
    space: Space,
    name: &str,
    hash: &Address,
    update: bool,
  ) -> StoreResult<bool> {
    let existing = self.get_name(space, name)?;
    match existing {
      Some(existing) if existing == *hash => return Ok(false),
      Some(existing) if !update => {
        return Err(StoreError::NameConflict {
          space,
          name: name.to_string(),
          existing,
        });
      },
      _ => (),
    }
    Self::write_atomic(&self.name_path(space, name)?, hash.hex().as_bytes())?;
    Ok(existing.is_none())
  }

  fn remove_name(&self, space: Space, name: &str) -> StoreResult<bool> {
    match fs::remove_file(self.name_path(space, name)?) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e.into()),
    }
  }
}
