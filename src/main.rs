use std::io;
use std::io::Write;
use std::process::ExitCode;

use anyhow::bail;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sis_abc::abc::protocol;
use sis_abc::abc::protocol::SimulatorMode;
use sis_abc::abc::seed::with_seeded_rng;
use sis_abc::abc::seed::FileSeedStore;
use sis_abc::abc::simulator::CoinFlipSimulator;
use sis_abc::abc::simulator::SimulatorConfig;
use sis_abc::abc::simulator::SisSimulator;
use sis_abc::stats::density::GaussianKernel;
use sis_abc::stats::density::UniformPrior;
use sis_abc::stochastic::trace::TraceSink;
use sis_abc::stochastic::trace::TraceWriter;
use sis_abc::SimulatorExt;

const USAGE: &str = "\
usage: sis-abc <command> [args]

  simulate S0 I0 TEND NOBS DATAFILE [SEED_FILE] [TRACE_FILE]
      stdin: epsilon, then 'beta gamma'; prints accept or reject
  distance S0 I0 TEND NOBS DATAFILE [SEED_FILE] [TRACE_FILE]
      stdin: 'beta gamma'; prints the distance
  coin DATAFILE [SEED_FILE]
      stdin: epsilon, then q; prints accept or reject
  coin-distance DATAFILE [SEED_FILE]
      stdin: q; prints the distance
  perturb STDEV... [SEED_FILE]
      stdin: generation, then a parameter; prints the perturbed parameter
  perturbation-pdf STDEV...
      stdin: generation, perturbed parameter, candidates until EOF
  prior-sample LOW HIGH [LOW HIGH]... [SEED_FILE]
  prior-pdf LOW HIGH [LOW HIGH]...
      stdin: a parameter; prints its prior density

A trailing argument that is not a number names the SEED_FILE.";

fn number<T>(arg: &str, name: &str) -> anyhow::Result<T>
where
  T: std::str::FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  arg
    .parse::<T>()
    .with_context(|| format!("invalid {name}: {arg:?}"))
}

fn numbers(args: &[String], name: &str) -> anyhow::Result<Vec<f64>> {
  if args.is_empty() {
    bail!("missing {name}\n{USAGE}");
  }
  args.iter().map(|a| number(a, name)).collect()
}

fn bounds(args: &[String]) -> anyhow::Result<Vec<(f64, f64)>> {
  let values = numbers(args, "bounds")?;
  if values.len() % 2 != 0 {
    bail!("bounds come in LOW HIGH pairs\n{USAGE}");
  }
  Ok(values.chunks(2).map(|c| (c[0], c[1])).collect())
}

/// Splits off a trailing seed file from numeric arguments.
fn split_seed_file(args: &[String]) -> (&[String], Option<&String>) {
  match args.split_last() {
    Some((last, head)) if last.parse::<f64>().is_err() => (head, Some(last)),
    _ => (args, None),
  }
}

/// Seeds from the counter file when one is given, otherwise from the OS.
fn with_rng<T>(seed_file: Option<&String>, run: impl FnOnce(&mut StdRng) -> anyhow::Result<T>) -> anyhow::Result<T> {
  match seed_file {
    Some(path) => with_seeded_rng(&FileSeedStore::new(path), run),
    None => run(&mut StdRng::from_os_rng()),
  }
}

fn simulate<S: SimulatorExt>(
  simulator: &S,
  mode: SimulatorMode,
  data: &str,
  seed_file: Option<&String>,
  trace_file: Option<&String>,
) -> anyhow::Result<()> {
  let observed = protocol::read_observed(simulator, data)?;
  let stdin = io::stdin().lock();
  let mut stdout = io::stdout().lock();

  with_rng(seed_file, |rng| {
    match trace_file {
      Some(path) => {
        let mut writer = TraceWriter::create(path)?;
        protocol::run_simulator(
          simulator,
          &observed,
          mode,
          stdin,
          &mut stdout,
          rng,
          Some(&mut writer as &mut dyn TraceSink),
        )?;
        writer.finish()?;
      }
      None => {
        protocol::run_simulator(simulator, &observed, mode, stdin, &mut stdout, rng, None)?;
      }
    }
    Ok(())
  })?;

  stdout.flush().context("flushing stdout")?;
  Ok(())
}

fn sis_simulator(args: &[String]) -> anyhow::Result<SisSimulator> {
  let config = SimulatorConfig {
    s0: number(&args[0], "S0")?,
    i0: number(&args[1], "I0")?,
    t_end: number(&args[2], "TEND")?,
    n_obs: number(&args[3], "NOBS")?,
  };
  Ok(SisSimulator::new(config)?)
}

fn run(args: &[String]) -> anyhow::Result<()> {
  let Some((command, rest)) = args.split_first() else {
    bail!("{USAGE}");
  };

  match command.as_str() {
    "simulate" | "distance" => {
      if rest.len() < 5 {
        bail!("{command}: expected S0 I0 TEND NOBS DATAFILE\n{USAGE}");
      }
      let simulator = sis_simulator(rest)?;
      let mode = if command == "simulate" {
        SimulatorMode::AcceptReject
      } else {
        SimulatorMode::Distance
      };
      simulate(&simulator, mode, &rest[4], rest.get(5), rest.get(6))
    }
    "coin" | "coin-distance" => {
      let Some(data) = rest.first() else {
        bail!("{command}: expected DATAFILE\n{USAGE}");
      };
      let mode = if command == "coin" {
        SimulatorMode::AcceptReject
      } else {
        SimulatorMode::Distance
      };
      simulate(&CoinFlipSimulator::default(), mode, data, rest.get(1), None)
    }
    "perturb" => {
      let (stdevs, seed_file) = split_seed_file(rest);
      let kernel = GaussianKernel::new(numbers(stdevs, "standard deviations")?)?;
      let mut stdout = io::stdout().lock();
      with_rng(seed_file, |rng| {
        protocol::run_perturber(&kernel, io::stdin().lock(), &mut stdout, rng)?;
        Ok(())
      })?;
      stdout.flush().context("flushing stdout")?;
      Ok(())
    }
    "perturbation-pdf" => {
      let kernel = GaussianKernel::new(numbers(rest, "standard deviations")?)?;
      let mut stdout = io::stdout().lock();
      protocol::run_perturbation_density(&kernel, io::stdin().lock(), &mut stdout)?;
      Ok(())
    }
    "prior-sample" => {
      let (limits, seed_file) = split_seed_file(rest);
      let prior = UniformPrior::new(bounds(limits)?)?;
      let mut stdout = io::stdout().lock();
      with_rng(seed_file, |rng| {
        protocol::run_prior_sampler(&prior, &mut stdout, rng)?;
        Ok(())
      })?;
      stdout.flush().context("flushing stdout")?;
      Ok(())
    }
    "prior-pdf" => {
      let prior = UniformPrior::new(bounds(rest)?)?;
      let mut stdout = io::stdout().lock();
      protocol::run_prior_density(&prior, io::stdin().lock(), &mut stdout)?;
      Ok(())
    }
    other => bail!("unknown command {other:?}\n{USAGE}"),
  }
}

fn main() -> ExitCode {
  let args: Vec<String> = std::env::args().skip(1).collect();
  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("Error: {e:#}");
      ExitCode::FAILURE
    }
  }
}
