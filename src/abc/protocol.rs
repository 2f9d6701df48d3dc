//! Line-oriented drivers for an ABC outer loop.
//!
//! Every driver reads whitespace-separated numbers from an input stream and
//! writes one answer per line. Blank lines are skipped.
use std::fs;
use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use rand::Rng;
use tracing::debug;

use crate::error::Result;
use crate::error::SisError;
use crate::stats::density::GaussianKernel;
use crate::stats::density::UniformPrior;
use crate::stochastic::trace::TraceSink;
use crate::traits::SimulatorExt;

const STDIN: &str = "<stdin>";
const STDOUT: &str = "<stdout>";

/// Reads numeric lines and reports malformed input with its line number.
pub struct LineReader<R: BufRead> {
  inner: R,
  line: usize,
}

impl<R: BufRead> LineReader<R> {
  pub fn new(inner: R) -> Self {
    Self { inner, line: 0 }
  }

  /// Next non-blank line, or `None` at end of input.
  pub fn next_line(&mut self) -> Result<Option<String>> {
    loop {
      let mut buf = String::new();
      let n = self
        .inner
        .read_line(&mut buf)
        .map_err(|e| SisError::io(STDIN, e))?;
      if n == 0 {
        return Ok(None);
      }
      self.line += 1;
      if !buf.trim().is_empty() {
        return Ok(Some(buf));
      }
    }
  }

  /// Parses all tokens of the next line, which must be present.
  pub fn read_values<T>(&mut self, what: &str) -> Result<Vec<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display,
  {
    match self.next_line()? {
      Some(line) => self.parse_line(&line, what),
      None => Err(SisError::InputFormat(format!("missing {what}"))),
    }
  }

  /// Parses the next line as exactly `count` values.
  pub fn read_exact<T>(&mut self, count: usize, what: &str) -> Result<Vec<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display,
  {
    let values = self.read_values(what)?;
    self.check_count(count, values.len(), what)?;
    Ok(values)
  }

  pub fn read_one<T>(&mut self, what: &str) -> Result<T>
  where
    T: FromStr,
    T::Err: std::fmt::Display,
  {
    let mut values = self.read_exact(1, what)?;
    values
      .pop()
      .ok_or_else(|| SisError::InputFormat(format!("missing {what}")))
  }

  fn parse_line<T>(&self, line: &str, what: &str) -> Result<Vec<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display,
  {
    line
      .split_whitespace()
      .map(|token| {
        token.parse::<T>().map_err(|e| {
          SisError::InputFormat(format!(
            "line {}: could not read {what} from {token:?}: {e}",
            self.line
          ))
        })
      })
      .collect()
  }

  fn check_count(&self, expected: usize, got: usize, what: &str) -> Result<()> {
    if expected != got {
      return Err(SisError::InputFormat(format!(
        "line {}: expected {expected} values for {what}, found {got}",
        self.line
      )));
    }
    Ok(())
  }
}

/// Reads and parses the observed data file of `simulator`.
pub fn read_observed<S: SimulatorExt>(simulator: &S, path: impl AsRef<Path>) -> Result<S::Data> {
  let path = path.as_ref();
  let text = fs::read_to_string(path).map_err(|e| SisError::io(path, e))?;
  simulator.parse_observed(&text)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimulatorMode {
  /// Reads a tolerance first and answers `accept` or `reject`.
  #[default]
  AcceptReject,
  /// Answers with the raw distance.
  Distance,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationOutcome {
  pub distance: f64,
  /// `None` in distance mode.
  pub accepted: Option<bool>,
}

fn write_line<W: Write + ?Sized>(output: &mut W, line: std::fmt::Arguments<'_>) -> Result<()> {
  writeln!(output, "{line}").map_err(|e| SisError::io(STDOUT, e))
}

fn join(values: &[f64]) -> String {
  values
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join(" ")
}

/// One simulator invocation: tolerance (accept/reject mode), then one
/// parameter line.
pub fn run_simulator<S, R, I, W>(
  simulator: &S,
  observed: &S::Data,
  mode: SimulatorMode,
  input: I,
  output: &mut W,
  rng: &mut R,
  sink: Option<&mut dyn TraceSink>,
) -> Result<SimulationOutcome>
where
  S: SimulatorExt,
  R: Rng + ?Sized,
  I: BufRead,
  W: Write + ?Sized,
{
  let mut reader = LineReader::new(input);
  let epsilon = match mode {
    SimulatorMode::AcceptReject => Some(reader.read_one::<f64>("epsilon")?),
    SimulatorMode::Distance => None,
  };
  let theta = reader.read_exact::<f64>(simulator.dimension(), "parameters")?;

  let simulated = simulator.simulate(&theta, rng, sink)?;
  let distance = simulator.distance(observed, &simulated)?;

  let outcome = match epsilon {
    Some(epsilon) => {
      let accepted = distance <= epsilon;
      debug!(?theta, distance, epsilon, accepted, "simulator decision");
      write_line(output, format_args!("{}", if accepted { "accept" } else { "reject" }))?;
      SimulationOutcome {
        distance,
        accepted: Some(accepted),
      }
    }
    None => {
      debug!(?theta, distance, "simulator distance");
      write_line(output, format_args!("{distance}"))?;
      SimulationOutcome {
        distance,
        accepted: None,
      }
    }
  };

  Ok(outcome)
}

/// Reads a generation index and a parameter; writes its perturbation.
pub fn run_perturber<R, I, W>(kernel: &GaussianKernel, input: I, output: &mut W, rng: &mut R) -> Result<Vec<f64>>
where
  R: Rng + ?Sized,
  I: BufRead,
  W: Write + ?Sized,
{
  let mut reader = LineReader::new(input);
  let generation = reader.read_one::<usize>("generation")?;
  let theta = reader.read_exact::<f64>(kernel.dimension(), "parameters")?;

  let perturbed = kernel.perturb(&theta, rng)?;
  debug!(generation, ?theta, ?perturbed, "perturbed parameter");
  write_line(output, format_args!("{}", join(&perturbed)))?;

  Ok(perturbed)
}

pub fn run_prior_sampler<R, W>(prior: &UniformPrior, output: &mut W, rng: &mut R) -> Result<Vec<f64>>
where
  R: Rng + ?Sized,
  W: Write + ?Sized,
{
  let theta = prior.sample(rng);
  write_line(output, format_args!("{}", join(&theta)))?;
  Ok(theta)
}

/// Reads one parameter; writes its prior density.
pub fn run_prior_density<I, W>(prior: &UniformPrior, input: I, output: &mut W) -> Result<f64>
where
  I: BufRead,
  W: Write + ?Sized,
{
  let mut reader = LineReader::new(input);
  let theta = reader.read_exact::<f64>(prior.dimension(), "parameters")?;

  let density = prior.pdf(&theta)?;
  write_line(output, format_args!("{density}"))?;
  Ok(density)
}

/// Reads a generation index, a perturbed parameter and then candidate
/// parameters until end of input; writes one kernel density per candidate.
///
/// All candidates are parsed before anything is written.
pub fn run_perturbation_density<I, W>(kernel: &GaussianKernel, input: I, output: &mut W) -> Result<Vec<f64>>
where
  I: BufRead,
  W: Write + ?Sized,
{
  let mut reader = LineReader::new(input);
  let generation = reader.read_one::<usize>("generation")?;
  let perturbed = reader.read_exact::<f64>(kernel.dimension(), "perturbed parameter")?;

  let mut candidates = Vec::new();
  while let Some(line) = reader.next_line()? {
    let theta = reader.parse_line::<f64>(&line, "candidate parameter")?;
    reader.check_count(kernel.dimension(), theta.len(), "candidate parameter")?;
    candidates.push(theta);
  }
  debug!(generation, candidates = candidates.len(), "perturbation densities");

  let densities = candidates
    .iter()
    .map(|theta| kernel.pdf(&perturbed, theta))
    .collect::<Result<Vec<f64>>>()?;
  for density in &densities {
    write_line(output, format_args!("{density}"))?;
  }

  Ok(densities)
}
