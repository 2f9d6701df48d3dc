//! # Errors
//!
//! Every fallible operation in the crate returns [`Result`], which carries a
//! [`SisError`]. Operations either succeed as a whole or fail as a whole.
//!
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SisError {
  /// Malformed or missing numeric tokens in line-oriented input.
  #[error("input format error: {0}")]
  InputFormat(String),

  /// Invalid parameters, bounds, grids or incompatible array shapes.
  #[error("domain error: {0}")]
  Domain(String),

  /// A numerical routine could not deliver a trustworthy answer.
  ///
  /// `estimate` and `error_estimate` hold the best available values, if any.
  #[error("numerical error: {message}")]
  Numerical {
    message: String,
    estimate: Option<f64>,
    error_estimate: Option<f64>,
  },

  #[error("I/O error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl SisError {
  pub fn numerical(message: impl Into<String>) -> Self {
    SisError::Numerical {
      message: message.into(),
      estimate: None,
      error_estimate: None,
    }
  }

  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    SisError::Io {
      path: path.into(),
      source,
    }
  }
}

pub type Result<T> = std::result::Result<T, SisError>;

#[cfg(test)]
mod tests {
  use super::SisError;

  #[test]
  fn io_error_mentions_path() {
    let err = SisError::io(
      "seed.txt",
      std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
    );

    assert_eq!(err.to_string(), "I/O error on seed.txt: missing");
  }

  #[test]
  fn numerical_error_has_no_estimate_by_default() {
    match SisError::numerical("expm overflow") {
      SisError::Numerical {
        estimate,
        error_estimate,
        ..
      } => {
        assert!(estimate.is_none());
        assert!(error_estimate.is_none());
      }
      other => panic!("unexpected variant {other:?}"),
    }
  }
}
