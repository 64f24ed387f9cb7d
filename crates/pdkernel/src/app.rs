//! The operations behind the `pdkernel` binary.

use crate::Error;
use crate::config::RunOptions;
use crate::diagram::{DiphaSource, Interval, read_file_list, write_dipha};
use crate::host::HostPlatform;
use crate::scheduler::{Scheduler, SchedulerConfig};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::Path;

/// A short account of a successful run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub shape: [usize; 2],
    pub computed_cells: usize,
    pub n_units: usize,
}

/// Computes the kernel matrix described by `opts` on host execution units
/// and writes it to the output target.
///
/// Nothing is written unless every worker succeeded.
pub fn execute(opts: &RunOptions) -> Result<RunSummary, Error> {
    opts.validate()?;

    let platform = match opts.n_units {
        Some(n) => HostPlatform::new(n),
        None => HostPlatform::detect(),
    };
    let units = platform.units(&opts.selection)?;
    tracing::debug!(
        platform = platform.name(),
        available = platform.n_units(),
        selected = units.len(),
        "selected execution units"
    );

    let symmetric = opts.symmetric();
    let left = read_list(&opts.file_lists[0])?;
    let right = if symmetric {
        left.clone()
    } else {
        read_list(&opts.file_lists[1])?
    };

    let config = SchedulerConfig {
        kernel: opts.kernel,
        precision: opts.precision,
        tile: opts.tile,
        degree: opts.degree,
        finitization: opts.finitization,
        symmetric,
        cache_operands: opts.cache_operands,
    };
    let mut scheduler = Scheduler::new(config, [left, right], units, DiphaSource)?;
    let report = scheduler.run();
    let computed_cells = report.computed_cells();
    let matrix = report.into_matrix()?;

    opts.output.write(&matrix)?;
    Ok(RunSummary {
        shape: scheduler.shape(),
        computed_cells,
        n_units: scheduler.n_workers(),
    })
}

fn read_list(path: &Path) -> Result<Vec<std::path::PathBuf>, Error> {
    let files = read_file_list(path)
        .map_err(|err| Error::io(format!("failed to read file list {}", path.display()), err))?;
    if files.is_empty() {
        Err(Error::config(format!(
            "the file list {} is empty",
            path.display()
        )))
    } else {
        Ok(files)
    }
}

/// Writes a random persistence diagram with `n` intervals in degree
/// `degree`.
///
/// Births are uniform in `[0, 1)` and every interval lives for a uniform
/// duration in `[0, 1)`, except that it is essential with probability
/// `p_infinite`.
pub fn generate(
    path: &Path,
    n: usize,
    degree: u32,
    p_infinite: f64,
    seed: u64,
) -> Result<(), Error> {
    if n == 0 {
        return Err(Error::config("a generated diagram needs at least 1 interval"));
    } else if !(0.0..=1.0).contains(&p_infinite) {
        return Err(Error::config("the probability of essential intervals must lie in [0, 1]"));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let intervals: Vec<Interval> = (0..n)
        .map(|_| {
            let birth: f64 = rng.random();
            let death = if rng.random::<f64>() < p_infinite {
                f64::INFINITY
            } else {
                birth + rng.random::<f64>()
            };
            Interval {
                dim: degree,
                birth,
                death,
            }
        })
        .collect();

    write_dipha(path, &intervals)
        .map_err(|err| Error::io(format!("failed to write {}", path.display()), err))?;
    tracing::debug!(path = %path.display(), n, degree, "generated diagram");
    Ok(())
}
