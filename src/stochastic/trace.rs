use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Result;
use crate::error::SisError;

/// Receives every recorded `(t, S)` pair of a trajectory, in order.
pub trait TraceSink {
  fn record_state(&mut self, t: f64, s: usize);
}

impl TraceSink for Vec<(f64, usize)> {
  fn record_state(&mut self, t: f64, s: usize) {
    self.push((t, s));
  }
}

/// Writes one `t S` line per recorded state.
///
/// The first write failure is latched and reported by [`TraceWriter::finish`].
pub struct TraceWriter<W: Write> {
  writer: W,
  target: PathBuf,
  error: Option<std::io::Error>,
}

impl TraceWriter<BufWriter<File>> {
  pub fn create(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SisError::io(path, e))?;
    Ok(Self::new(BufWriter::new(file), path))
  }
}

impl<W: Write> TraceWriter<W> {
  pub fn new(writer: W, target: impl Into<PathBuf>) -> Self {
    Self {
      writer,
      target: target.into(),
      error: None,
    }
  }

  pub fn finish(mut self) -> Result<W> {
    if let Some(e) = self.error.take() {
      return Err(SisError::io(self.target, e));
    }
    self
      .writer
      .flush()
      .map_err(|e| SisError::io(&self.target, e))?;
    Ok(self.writer)
  }
}

impl<W: Write> TraceSink for TraceWriter<W> {
  fn record_state(&mut self, t: f64, s: usize) {
    if self.error.is_some() {
      return;
    }
    if let Err(e) = writeln!(self.writer, "{t} {s}") {
      self.error = Some(e);
    }
  }
}
