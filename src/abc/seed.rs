//! Persisted seed counter.
//!
//! A run reads the stored seed, seeds its generator with it and then commits
//! the successor, so consecutive runs draw from consecutive seeds.
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;
use crate::error::SisError;

pub trait SeedStore {
  fn read(&self) -> Result<u64>;

  fn write(&self, seed: u64) -> Result<()>;

  /// Current seed plus a pending commit of its successor.
  fn next_seed(&self) -> Result<(u64, SeedCommit<'_, Self>)> {
    let seed = self.read()?;
    let next = seed
      .checked_add(1)
      .ok_or_else(|| SisError::Domain(format!("seed {seed} cannot be advanced")))?;
    Ok((seed, SeedCommit { store: self, next }))
  }
}

/// Writes the successor seed back when committed. Dropping it leaves the
/// store untouched.
#[must_use = "the seed is only advanced by `commit`"]
pub struct SeedCommit<'a, S: SeedStore + ?Sized> {
  store: &'a S,
  next: u64,
}

impl<S: SeedStore + ?Sized> SeedCommit<'_, S> {
  pub fn next(&self) -> u64 {
    self.next
  }

  pub fn commit(self) -> Result<()> {
    debug!(next = self.next, "committing seed");
    self.store.write(self.next)
  }
}

/// Runs `run` with a generator seeded from `store`, committing the successor
/// seed only if `run` succeeds.
pub fn with_seeded_rng<S, T, E>(store: &S, run: impl FnOnce(&mut StdRng) -> std::result::Result<T, E>) -> std::result::Result<T, E>
where
  S: SeedStore + ?Sized,
  E: From<SisError>,
{
  let (seed, commit) = store.next_seed()?;
  debug!(seed, "seeding generator");
  let out = run(&mut StdRng::seed_from_u64(seed))?;
  commit.commit()?;
  Ok(out)
}

fn parse_seed(text: &str, origin: &str) -> Result<u64> {
  text
    .trim()
    .parse::<u64>()
    .map_err(|e| SisError::InputFormat(format!("invalid seed {:?} in {origin}: {e}", text.trim())))
}

/// Seed stored as a single plain-text integer.
///
/// Writes go through a temporary file in the same directory followed by a
/// rename. Concurrent invocations sharing one file are not serialized.
#[derive(Clone, Debug)]
pub struct FileSeedStore {
  path: PathBuf,
}

impl FileSeedStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl SeedStore for FileSeedStore {
  fn read(&self) -> Result<u64> {
    let text = fs::read_to_string(&self.path).map_err(|e| SisError::io(&self.path, e))?;
    parse_seed(&text, &self.path.display().to_string())
  }

  fn write(&self, seed: u64) -> Result<()> {
    let dir = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SisError::io(dir, e))?;
    write!(tmp, "{seed}").map_err(|e| SisError::io(tmp.path(), e))?;
    tmp
      .persist(&self.path)
      .map_err(|e| SisError::io(&self.path, e.error))?;
    Ok(())
  }
}

#[derive(Debug, Default)]
pub struct MemorySeedStore {
  seed: Mutex<u64>,
}

impl MemorySeedStore {
  pub fn new(seed: u64) -> Self {
    Self {
      seed: Mutex::new(seed),
    }
  }
}

impl SeedStore for MemorySeedStore {
  fn read(&self) -> Result<u64> {
    Ok(*self.seed.lock().unwrap_or_else(|e| e.into_inner()))
  }

  fn write(&self, seed: u64) -> Result<()> {
    *self.seed.lock().unwrap_or_else(|e| e.into_inner()) = seed;
    Ok(())
  }
}
